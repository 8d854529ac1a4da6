//! Input validation for API requests.
//!
//! Each `parse_*` function turns a raw request body into a validated value or
//! an [`ApiError`] carrying per-field detail. Only the generic
//! `Invalid payload` message reaches the client.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{
    format_date, parse_date, AppointmentChanges, CreateAppointmentRequest, CreateJobOrderRequest,
    CreateUserRequest, JobOrderChanges, JobStatus, LoginRequest, NewAppointment, NewJobOrder,
    Role, SourceType, TimeRange, TimeRangeInput, UpdateAppointmentRequest, UpdateJobOrderRequest,
};

/// Minimum password length accepted at login and account creation.
pub const MIN_PASSWORD_LENGTH: usize = 6;

lazy_static! {
    /// Pragmatic email check: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Plate numbers: letters, digits, spaces and dashes
    static ref PLATE_REGEX: Regex = Regex::new(
        r"^[A-Z0-9][A-Z0-9 -]{0,14}[A-Z0-9]$"
    ).unwrap();

    /// Job numbers: alphanumeric with dashes, slashes or dots
    static ref JOB_NUMBER_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9./-]{0,31}$"
    ).unwrap();
}

/// Validated login payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Validated user creation payload (password still in clear).
#[derive(Debug, Clone)]
pub struct NewUserPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub level: Option<String>,
    pub picture_url: Option<String>,
    pub break_times: Vec<crate::db::BreakTime>,
}

/// Validate and normalize an email address (trimmed, lowercased).
pub fn validate_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(&email) {
        return Err("Invalid email format".to_string());
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

/// Validate and normalize a plate number (trimmed, uppercased).
pub fn validate_plate_number(plate: &str) -> Result<String, String> {
    let plate = plate.trim().to_uppercase();
    if plate.is_empty() {
        return Err("Plate number is required".to_string());
    }
    if !PLATE_REGEX.is_match(&plate) {
        return Err("Invalid plate number format".to_string());
    }
    Ok(plate)
}

pub fn validate_job_number(job_number: &str) -> Result<String, String> {
    let job_number = job_number.trim();
    if job_number.is_empty() {
        return Err("Job number is required".to_string());
    }
    if !JOB_NUMBER_REGEX.is_match(job_number) {
        return Err("Invalid job number format".to_string());
    }
    Ok(job_number.to_string())
}

/// Validate a `YYYY-MM-DD` date and return it in canonical form.
pub fn validate_date(date: &str) -> Result<String, String> {
    parse_date(date).map(format_date)
}

pub fn validate_id(id: &str) -> Result<String, String> {
    let id = id.trim();
    if id.is_empty() {
        return Err("Id must not be empty".to_string());
    }
    if id.len() > 64 {
        return Err("Id is too long".to_string());
    }
    Ok(id.to_string())
}

fn validate_time_range(range: &TimeRangeInput) -> Result<TimeRange, String> {
    match (range.start.as_deref(), range.end.as_deref()) {
        (Some(start), Some(end)) => TimeRange::parse(start, end),
        _ => Err("Time range needs both start and end".to_string()),
    }
}

fn required<'a>(
    errors: &mut ValidationErrorBuilder,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        Some(v) => Some(v),
        None => {
            errors.add(field, "is required");
            None
        }
    }
}

/// Shape check for `POST /login`. Runs before any database access.
pub fn parse_login(raw: LoginRequest) -> Result<LoginPayload, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let email = required(&mut errors, "email", raw.email.as_deref())
        .and_then(|e| errors.check("email", validate_email(e)));
    let password = required(&mut errors, "password", raw.password.as_deref())
        .and_then(|p| errors.check("password", validate_password(p)).map(|_| p.to_string()));

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(LoginPayload { email, password }),
        _ => Err(errors.build().unwrap_or_else(|| ApiError::invalid_payload(Default::default()))),
    }
}

pub fn parse_new_user(raw: CreateUserRequest) -> Result<NewUserPayload, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let name = required(&mut errors, "name", raw.name.as_deref())
        .map(str::trim)
        .and_then(|n| {
            if n.is_empty() {
                errors.add("name", "Name is required");
                None
            } else {
                Some(n.to_string())
            }
        });
    let email = required(&mut errors, "email", raw.email.as_deref())
        .and_then(|e| errors.check("email", validate_email(e)));
    let password = required(&mut errors, "password", raw.password.as_deref())
        .and_then(|p| errors.check("password", validate_password(p)).map(|_| p.to_string()));
    let role = required(&mut errors, "role", raw.role.as_deref())
        .and_then(|r| errors.check("role", r.parse::<Role>()));

    for (i, b) in raw.break_times.iter().enumerate() {
        if b.name.trim().is_empty() {
            errors.add(format!("breakTimes[{}].name", i), "Name is required");
        }
        if let Err(e) = TimeRange::parse(&b.start, &b.end) {
            errors.add(format!("breakTimes[{}]", i), e);
        }
    }

    match (name, email, password, role) {
        (Some(name), Some(email), Some(password), Some(role)) if errors.is_empty() => {
            Ok(NewUserPayload {
                name,
                email,
                password,
                role,
                level: raw.level.filter(|l| !l.trim().is_empty()),
                picture_url: raw.picture_url.filter(|p| !p.trim().is_empty()),
                break_times: raw.break_times,
            })
        }
        _ => Err(errors.build().unwrap_or_else(|| ApiError::invalid_payload(Default::default()))),
    }
}

pub fn parse_new_appointment(raw: CreateAppointmentRequest) -> Result<NewAppointment, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let plate_number = required(&mut errors, "plateNumber", raw.plate_number.as_deref())
        .and_then(|p| errors.check("plateNumber", validate_plate_number(p)));
    let date = required(&mut errors, "date", raw.date.as_deref())
        .and_then(|d| errors.check("date", validate_date(d)));
    let time_range = match &raw.time_range {
        Some(range) => errors.check("timeRange", validate_time_range(range)),
        None => {
            errors.add("timeRange", "is required");
            None
        }
    };
    let technician_id = required(&mut errors, "technicianId", raw.technician_id.as_deref())
        .and_then(|id| errors.check("technicianId", validate_id(id)));
    let service_advisor_id = match raw.service_advisor_id.as_deref() {
        Some(id) => errors.check("serviceAdvisorId", validate_id(id)),
        None => None,
    };

    match (plate_number, date, time_range, technician_id) {
        (Some(plate_number), Some(date), Some(time_range), Some(technician_id))
            if errors.is_empty() =>
        {
            Ok(NewAppointment {
                plate_number,
                date,
                time_range,
                technician_id,
                service_advisor_id,
            })
        }
        _ => Err(errors.build().unwrap_or_else(|| ApiError::invalid_payload(Default::default()))),
    }
}

pub fn parse_appointment_changes(
    raw: UpdateAppointmentRequest,
) -> Result<AppointmentChanges, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    // A blank advisor id unassigns the advisor
    let (service_advisor_id, clear_service_advisor) =
        match raw.service_advisor_id.as_deref().map(str::trim) {
            Some("") => (None, true),
            Some(id) => (errors.check("serviceAdvisorId", validate_id(id)), false),
            None => (None, false),
        };

    let changes = AppointmentChanges {
        plate_number: raw
            .plate_number
            .as_deref()
            .and_then(|p| errors.check("plateNumber", validate_plate_number(p))),
        date: raw
            .date
            .as_deref()
            .and_then(|d| errors.check("date", validate_date(d))),
        time_range: raw
            .time_range
            .as_ref()
            .and_then(|r| errors.check("timeRange", validate_time_range(r))),
        technician_id: raw
            .technician_id
            .as_deref()
            .and_then(|id| errors.check("technicianId", validate_id(id))),
        service_advisor_id,
        clear_service_advisor,
        no_show: raw.no_show,
    };

    errors.finish()?;
    Ok(changes)
}

pub fn parse_new_job_order(raw: CreateJobOrderRequest) -> Result<NewJobOrder, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let job_number = required(&mut errors, "jobNumber", raw.job_number.as_deref())
        .and_then(|n| errors.check("jobNumber", validate_job_number(n)));
    let date = required(&mut errors, "date", raw.date.as_deref())
        .and_then(|d| errors.check("date", validate_date(d)));
    let status = match raw.status.as_deref() {
        Some(s) => errors.check("status", s.parse::<JobStatus>()),
        None => Some(JobStatus::Pending),
    };
    let source_type = match raw.source_type.as_deref() {
        Some(s) => errors.check("sourceType", s.parse::<SourceType>()),
        None => Some(SourceType::WalkIn),
    };
    if source_type == Some(SourceType::CarryOver) {
        errors.add("sourceType", "carry-over job orders are created by end-of-day only");
    }
    let technician_id = raw
        .technician_id
        .as_deref()
        .and_then(|id| errors.check("technicianId", validate_id(id)));
    let plate_number = raw
        .plate_number
        .as_deref()
        .and_then(|p| errors.check("plateNumber", validate_plate_number(p)));

    match (job_number, date, status, source_type) {
        (Some(job_number), Some(date), Some(status), Some(source_type)) if errors.is_empty() => {
            Ok(NewJobOrder {
                job_number,
                date,
                status,
                source_type,
                carried_from: None,
                technician_id,
                plate_number,
            })
        }
        _ => Err(errors.build().unwrap_or_else(|| ApiError::invalid_payload(Default::default()))),
    }
}

pub fn parse_job_order_changes(raw: UpdateJobOrderRequest) -> Result<JobOrderChanges, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let changes = JobOrderChanges {
        job_number: raw
            .job_number
            .as_deref()
            .and_then(|n| errors.check("jobNumber", validate_job_number(n))),
        date: raw
            .date
            .as_deref()
            .and_then(|d| errors.check("date", validate_date(d))),
        status: raw
            .status
            .as_deref()
            .and_then(|s| errors.check("status", s.parse::<JobStatus>())),
        technician_id: raw
            .technician_id
            .as_deref()
            .and_then(|id| errors.check("technicianId", validate_id(id))),
        plate_number: raw
            .plate_number
            .as_deref()
            .and_then(|p| errors.check("plateNumber", validate_plate_number(p))),
    };

    errors.finish()?;
    Ok(changes)
}

/// Validate an optional `date` query filter.
pub fn parse_date_filter(date: Option<String>) -> Result<Option<String>, ApiError> {
    match date {
        None => Ok(None),
        Some(d) => validate_date(&d).map(Some).map_err(|e| {
            let mut errors = ValidationErrorBuilder::new();
            errors.add("date", e);
            errors.build().unwrap_or_else(|| ApiError::invalid_payload(Default::default()))
        }),
    }
}
