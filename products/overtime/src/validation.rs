//! Field-level input rules. Every failed field yields exactly one message.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{DATE_FORMAT, TIME_FORMAT};

pub const EMPLOYEE_ID_LEN: (usize, usize) = (3, 20);
pub const EMPLOYEE_NAME_LEN: (usize, usize) = (2, 100);
pub const REASON_LEN: (usize, usize) = (10, 1000);
pub const PASSWORD_LEN: (usize, usize) = (8, 100);
pub const MIN_HOURS: f64 = 0.5;
pub const MAX_HOURS: f64 = 24.0;
const MAX_GRAPH_ID_LEN: usize = 100;
const MAX_SECTION_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 320;
const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Letters of any script (general category L), whitespace, `-` and `'`.
static EMPLOYEE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\s'-]+$").expect("employee name pattern compiles"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collected failures for one form submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Record a failure; later failures for an already failed field are dropped.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        if self.errors.iter().any(|err| err.field == field) {
            return;
        }
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Keep the value on success, remember the message on failure.
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.push(field, message);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|err| format!("{}: {}", err.field, err.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {joined}")
    }
}

impl std::error::Error for ValidationErrors {}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_length(label: &str, value: &str, (min, max): (usize, usize)) -> Result<(), String> {
    let len = char_len(value);
    if len < min {
        return Err(format!("{label} must be at least {min} characters"));
    }
    if len > max {
        return Err(format!("{label} must be at most {max} characters"));
    }
    Ok(())
}

pub fn employee_id(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    check_length("Employee ID", trimmed, EMPLOYEE_ID_LEN)?;
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Employee ID can only contain letters, numbers, hyphens and underscores".into(),
        );
    }
    Ok(trimmed.to_string())
}

pub fn employee_name(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    check_length("Name", trimmed, EMPLOYEE_NAME_LEN)?;
    if !EMPLOYEE_NAME_CHARS.is_match(trimmed) {
        return Err("Name can only contain letters, spaces, hyphens and apostrophes".into());
    }
    Ok(trimmed.to_string())
}

/// Name supplied alongside an overtime entry; blank means "keep what is on file".
pub fn optional_employee_name(value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => employee_name(raw).map(Some),
    }
}

fn matches_shape(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value.bytes().zip(shape.bytes()).all(|(c, s)| match s {
            b'9' => c.is_ascii_digit(),
            other => c == other,
        })
}

/// Parse a `DD.MM.YYYY` date.
pub fn overtime_date(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Overtime date is required".into());
    }
    if !matches_shape(trimmed, "99.99.9999") {
        return Err("Date must be in format DD.MM.YYYY".into());
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| "Date is not a valid calendar date".to_string())
}

pub fn plan_hours(value: f64) -> Result<f64, String> {
    if !value.is_finite() {
        return Err("Overtime hours must be a number".into());
    }
    if value < MIN_HOURS {
        return Err(format!("Minimum overtime is {MIN_HOURS} hours"));
    }
    if value > MAX_HOURS {
        return Err(format!("Maximum overtime is {MAX_HOURS} hours"));
    }
    if (value * 2.0).fract() != 0.0 {
        return Err("Overtime hours must be in steps of 0.5".into());
    }
    Ok(value)
}

/// Parse a required `HH:MM` time of day.
pub fn time_of_day(value: &str) -> Result<NaiveTime, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Start time is required".into());
    }
    parse_time(trimmed)
}

/// Parse an optional `HH:MM` time; blank input means "not set".
pub fn optional_time(value: Option<&str>) -> Result<Option<NaiveTime>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => parse_time(trimmed).map(Some),
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    if !matches_shape(value, "99:99") {
        return Err("Time must be in format HH:MM".into());
    }
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| "Time is not a valid time of day".to_string())
}

pub fn reason(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    check_length("Reason", trimmed, REASON_LEN)?;
    Ok(trimmed.to_string())
}

pub fn password(value: &str) -> Result<(), String> {
    check_length("Password", value, PASSWORD_LEN)?;
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".into());
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".into());
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".into());
    }
    Ok(())
}

/// Identifier for the Microsoft Graph integration (tenant or client ID).
pub fn graph_identifier(label: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{label} is required"));
    }
    if char_len(trimmed) > MAX_GRAPH_ID_LEN {
        return Err(format!("{label} too long"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!("Invalid {label} format"));
    }
    Ok(trimmed.to_string())
}

pub fn email(value: &str) -> Result<String, String> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') || char_len(&normalized) > MAX_EMAIL_LEN
    {
        return Err("Invalid email address".into());
    }
    Ok(normalized)
}

pub fn optional_email(value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => email(raw).map(Some),
    }
}

pub fn optional_section(value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) if char_len(raw) > MAX_SECTION_LEN => {
            Err(format!("Section must be at most {MAX_SECTION_LEN} characters"))
        }
        Some(raw) => Ok(Some(raw.to_string())),
    }
}

pub fn display_name(value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) if char_len(raw) > MAX_DISPLAY_NAME_LEN => Err(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )),
        Some(raw) => Ok(Some(raw.to_string())),
    }
}

#[derive(Clone, Debug, Default)]
pub struct EmployeeForm {
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub section: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidEmployee {
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub section: Option<String>,
}

impl EmployeeForm {
    pub fn validate(&self) -> Result<ValidEmployee, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let employee_id = errors.check("employeeId", employee_id(&self.employee_id));
        let name = errors.check("name", employee_name(&self.name));
        let email = errors.check("email", optional_email(self.email.as_deref()));
        let section = errors.check("section", optional_section(self.section.as_deref()));
        match (employee_id, name, email, section) {
            (Some(employee_id), Some(name), Some(email), Some(section)) if errors.is_empty() => {
                Ok(ValidEmployee {
                    employee_id,
                    name,
                    email,
                    section,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PasswordChange {
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<&str, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check("newPassword", password(&self.new_password));
        if self.new_password != self.confirm_password {
            errors.push("confirmPassword", "Passwords do not match");
        }
        errors.into_result().map(|()| self.new_password.as_str())
    }
}

/// Integration settings as typed into the settings page.
#[derive(Clone, Debug, Default)]
pub struct GraphSettingsForm {
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphSettings {
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

impl GraphSettingsForm {
    /// IDs are only mandatory while the integration is switched on; when it is
    /// off, whatever was typed is kept if well-formed and dropped if blank.
    pub fn validate(&self) -> Result<GraphSettings, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let tenant = self.tenant_id.as_deref().unwrap_or_default();
        let client = self.client_id.as_deref().unwrap_or_default();
        let mut field = |name: &str, label: &str, raw: &str| -> Option<String> {
            if !self.enabled && raw.trim().is_empty() {
                return None;
            }
            errors.check(name, graph_identifier(label, raw))
        };
        let tenant_id = field("tenantId", "Tenant ID", tenant);
        let client_id = field("clientId", "Client ID", client);
        errors.into_result().map(|()| GraphSettings {
            enabled: self.enabled,
            tenant_id,
            client_id,
        })
    }
}
