mod common;

use common::{TestContext, error_code};
use serde_json::json;

const REPORT: &str = r#"
    query Report($filter: OvertimeFilterInput) {
        overtimeReport(filter: $filter) {
            rows { employeeId employeeName overtimeDate }
            summary { records totalHours uniqueEmployees }
        }
    }
"#;

#[tokio::test]
async fn reports_are_admin_only() {
    let ctx = TestContext::new().await;

    let anonymous = ctx.run(REPORT, json!({}), None).await;
    assert_eq!(error_code(&anonymous).as_deref(), Some("UNAUTHENTICATED"));

    let user = ctx.run(REPORT, json!({}), Some(ctx.user())).await;
    assert_eq!(error_code(&user).as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn search_matches_employee_id_case_insensitively() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(REPORT, json!({ "filter": { "search": "mti240264" } }), Some(ctx.admin()))
        .await;
    let rows = data["overtimeReport"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["employeeId"], "MTI240264");
    assert_eq!(rows[0]["employeeName"], "Budi Santoso");
}

#[tokio::test]
async fn search_covers_employee_name_and_reason() {
    let ctx = TestContext::new().await;
    let by_name = ctx
        .ok(REPORT, json!({ "filter": { "search": "RAHMA" } }), Some(ctx.admin()))
        .await;
    assert_eq!(by_name["overtimeReport"]["summary"]["records"], 1);

    let by_reason = ctx
        .ok(REPORT, json!({ "filter": { "search": "conveyor" } }), Some(ctx.admin()))
        .await;
    assert_eq!(
        by_reason["overtimeReport"]["rows"][0]["employeeId"],
        "OPS-007"
    );
}

#[tokio::test]
async fn single_day_range_and_summary() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(
            REPORT,
            json!({ "filter": { "startDate": "2025-08-19", "endDate": "2025-08-19" } }),
            Some(ctx.admin()),
        )
        .await;
    let report = &data["overtimeReport"];
    let rows = report["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row["overtimeDate"] == "2025-08-19"));
    assert_eq!(report["summary"]["totalHours"], 5.5);
    assert_eq!(report["summary"]["uniqueEmployees"], 2);
}

#[tokio::test]
async fn csv_export_uses_semicolons_and_flags() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(
            r#"{ overtimeCsv(startDate: "2025-08-19", endDate: "2025-08-20") { filename content rows } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    let export = &data["overtimeCsv"];
    assert_eq!(export["rows"], 3);
    let filename = export["filename"].as_str().unwrap();
    assert!(filename.starts_with("overtime_report_") && filename.ends_with(".csv"));

    let content = export["content"].as_str().unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(
        lines[0],
        "EmployeeID;OvertimeDate(dd.MM.yyyy);CalculationBasedOnTime;PlanOvertimeHour;DateIn(dd.MM.yyyy);FromTime;DateOut(dd.MM.yyyy);ToTime;BreakFromTime;BreakToTime;Reason"
    );
    assert!(lines.contains(
        &"MTI240264;19.08.2025;N;3;19.08.2025;15:00;19.08.2025;18:00;;;Preventive maintenance of network panel"
    ));
    assert!(lines.contains(
        &"MTI240311;19.08.2025;Y;2.5;19.08.2025;17:30;19.08.2025;20:00;;;Cable trimming at the north plant"
    ));
    assert!(lines.contains(
        &"OPS-007;20.08.2025;N;4;20.08.2025;22:00;21.08.2025;02:00;;;Night shift cover for conveyor repair"
    ));
}

#[tokio::test]
async fn records_listing_filters_by_date() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(
            r#"{ overtimeRecords(filter: { startDate: "2025-08-20" }) { employeeId dateOut toTime } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    let rows = data["overtimeRecords"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["dateOut"], "2025-08-21");
    assert_eq!(rows[0]["toTime"], "02:00");
}
