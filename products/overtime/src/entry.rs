//! Overtime entry form and its derived fields.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::validation::{self, ValidationErrors};

/// Add `hours` to `date`@`from`, carrying into following days.
///
/// Hours are converted to whole minutes (rounded), so `2.5` adds 150 minutes.
pub fn derive_checkout(date: NaiveDate, from: NaiveTime, hours: f64) -> (NaiveDate, NaiveTime) {
    let minutes = (hours * 60.0).round() as i64;
    let out = NaiveDateTime::new(date, from) + Duration::minutes(minutes);
    (out.date(), out.time())
}

/// Raw overtime form values as entered by the user.
#[derive(Clone, Debug, Default)]
pub struct OvertimeForm {
    pub employee_id: String,
    pub overtime_date: String,
    pub calculation_based_on_time: bool,
    pub plan_overtime_hour: f64,
    pub from_time: String,
    pub break_from_time: Option<String>,
    pub break_to_time: Option<String>,
    pub reason: String,
}

/// A form that passed validation, with `date_in`, `date_out` and `to_time` filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedEntry {
    pub employee_id: String,
    pub overtime_date: NaiveDate,
    pub calculation_based_on_time: bool,
    pub plan_overtime_hour: f64,
    pub date_in: NaiveDate,
    pub from_time: NaiveTime,
    pub date_out: NaiveDate,
    pub to_time: NaiveTime,
    pub break_from_time: Option<NaiveTime>,
    pub break_to_time: Option<NaiveTime>,
    pub reason: String,
}

impl OvertimeForm {
    pub fn validate(&self) -> Result<ValidatedEntry, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let employee_id = errors.check("employeeId", validation::employee_id(&self.employee_id));
        let overtime_date =
            errors.check("overtimeDate", validation::overtime_date(&self.overtime_date));
        let hours = errors.check(
            "planOvertimeHour",
            validation::plan_hours(self.plan_overtime_hour),
        );
        let from_time = errors.check("fromTime", validation::time_of_day(&self.from_time));
        let break_from = errors.check(
            "breakFromTime",
            validation::optional_time(self.break_from_time.as_deref()),
        );
        let break_to = errors.check(
            "breakToTime",
            validation::optional_time(self.break_to_time.as_deref()),
        );
        let reason = errors.check("reason", validation::reason(&self.reason));

        let (
            Some(employee_id),
            Some(overtime_date),
            Some(hours),
            Some(from_time),
            Some(break_from_time),
            Some(break_to_time),
            Some(reason),
        ) = (
            employee_id,
            overtime_date,
            hours,
            from_time,
            break_from,
            break_to,
            reason,
        )
        else {
            return Err(errors);
        };

        let (date_out, to_time) = derive_checkout(overtime_date, from_time, hours);
        Ok(ValidatedEntry {
            employee_id,
            overtime_date,
            calculation_based_on_time: self.calculation_based_on_time,
            plan_overtime_hour: hours,
            date_in: overtime_date,
            from_time,
            date_out,
            to_time,
            break_from_time,
            break_to_time,
            reason,
        })
    }
}
