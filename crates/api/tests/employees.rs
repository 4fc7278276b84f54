mod common;

use common::{TestContext, error_code, error_fields};
use entity::overtime_record;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

const REGISTER: &str = r#"
    mutation Register($input: EmployeeInput!) {
        registerEmployee(input: $input) { employeeId name email section }
    }
"#;

#[tokio::test]
async fn guests_can_register_employees() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(
            REGISTER,
            json!({ "input": {
                "employeeId": " EMP-001 ",
                "name": "Zoë O'Brien",
                "email": "Zoe@Example.COM",
                "section": "Logistics"
            }}),
            None,
        )
        .await;
    let employee = &data["registerEmployee"];
    assert_eq!(employee["employeeId"], "EMP-001");
    assert_eq!(employee["email"], "zoe@example.com");
}

#[tokio::test]
async fn duplicate_employee_id_conflicts() {
    let ctx = TestContext::new().await;
    let response = ctx
        .run(
            REGISTER,
            json!({ "input": { "employeeId": "MTI240264", "name": "Someone Else" } }),
            None,
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn registration_validates_every_field() {
    let ctx = TestContext::new().await;
    let response = ctx
        .run(
            REGISTER,
            json!({ "input": {
                "employeeId": "EMP 001",
                "name": "R2D2",
                "email": "not-an-email",
                "section": "x".repeat(101)
            }}),
            None,
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("VALIDATION"));
    assert_eq!(
        error_fields(&response),
        vec!["employeeId", "name", "email", "section"]
    );
}

#[tokio::test]
async fn admin_lists_and_searches_employees() {
    let ctx = TestContext::new().await;
    let all = ctx
        .ok("{ employees { employeeId } }", json!({}), Some(ctx.admin()))
        .await;
    assert_eq!(all["employees"].as_array().unwrap().len(), 3);

    let hits = ctx
        .ok(
            r#"{ employees(q: "network") { employeeId name } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    assert_eq!(hits["employees"][0]["employeeId"], "MTI240311");

    let one = ctx
        .ok(
            r#"{ employee(employeeId: "OPS-007") { name section } missing: employee(employeeId: "NOPE") { name } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    assert_eq!(one["employee"]["section"], "Operations");
    assert!(one["missing"].is_null());

    let denied = ctx
        .run("{ employees { employeeId } }", json!({}), Some(ctx.user()))
        .await;
    assert_eq!(error_code(&denied).as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn admin_updates_employee_details() {
    let ctx = TestContext::new().await;
    let data = ctx
        .ok(
            r#"mutation { updateEmployee(input: { employeeId: "OPS-007", name: "Agus W", section: "" }) { name section } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    assert_eq!(data["updateEmployee"]["name"], "Agus W");
    assert!(data["updateEmployee"]["section"].is_null());

    let missing = ctx
        .run(
            r#"mutation { updateEmployee(input: { employeeId: "GHOST-1", name: "Nobody Here" }) { name } }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    assert_eq!(error_code(&missing).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn deleting_employee_removes_their_records() {
    let ctx = TestContext::new().await;
    ctx.ok(
        r#"mutation { deleteEmployee(employeeId: "MTI240264") }"#,
        json!({}),
        Some(ctx.admin()),
    )
    .await;
    let records = overtime_record::Entity::find()
        .filter(overtime_record::Column::EmployeeId.eq("MTI240264"))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert!(records.is_empty());

    let again = ctx
        .run(
            r#"mutation { deleteEmployee(employeeId: "MTI240264") }"#,
            json!({}),
            Some(ctx.admin()),
        )
        .await;
    assert_eq!(error_code(&again).as_deref(), Some("NOT_FOUND"));
}
