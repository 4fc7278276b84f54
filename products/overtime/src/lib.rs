//! Overtime module.
//!
//! Everything in here is free of I/O: the GraphQL layer and the HTTP server
//! feed it plain values and persist whatever comes back.

pub mod access;
pub mod entry;
pub mod inactivity;
pub mod report;
pub mod validation;

pub use access::{Access, Decision, Page, Role};
pub use entry::{OvertimeForm, ValidatedEntry, derive_checkout};
pub use inactivity::{ActivitySource, InactivityTimer};
pub use report::{ReportFilter, ReportRow, ReportSummary, export_filename, write_csv};
pub use validation::{FieldError, ValidationErrors};

/// Display format for calendar dates (`DD.MM.YYYY`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";
/// Display format for times of day (`HH:MM`).
pub const TIME_FORMAT: &str = "%H:%M";
