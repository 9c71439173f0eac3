use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Date of birth format used by employee records: dd-mm-yyyy
pub const DATE_OF_BIRTH_FORMAT: &str = "%d-%m-%Y";

pub const MIN_EMPLOYEE_AGE: i32 = 18;
pub const MAX_EMPLOYEE_AGE: i32 = 100;

/// National phone number: a leading 0 followed by nine digits
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[0-9]{9}$").expect("Invalid phone pattern"));

// chrono accepts single-digit days and months, so the shape is checked first
static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}-[0-9]{2}-[0-9]{4}$").expect("Invalid date pattern"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} has an invalid format: {value:?}")]
    InvalidFormat { field: &'static str, value: String },

    #[error("{field} must be in the past, got {date}")]
    FutureDate { field: &'static str, date: NaiveDate },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} is required")]
    Required { field: &'static str },
}

/// Parse a dd-mm-yyyy date of birth and check it lies strictly before today (UTC).
pub fn validate_date_of_birth(value: &str) -> Result<NaiveDate, ValidationError> {
    validate_date_of_birth_on(value, Utc::now().date_naive())
}

pub fn validate_date_of_birth_on(
    value: &str,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidFormat {
        field: "date_of_birth",
        value: value.to_string(),
    };

    if !DATE_SHAPE.is_match(value) {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(value, DATE_OF_BIRTH_FORMAT).map_err(|_| invalid())?;

    validate_past_date("date_of_birth", date, today)
}

pub fn validate_past_date(
    field: &'static str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    if date >= today {
        return Err(ValidationError::FutureDate { field, date });
    }
    Ok(date)
}

pub fn validate_age(value: i32) -> Result<(), ValidationError> {
    if !(MIN_EMPLOYEE_AGE..=MAX_EMPLOYEE_AGE).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "age",
            value: value.into(),
            min: MIN_EMPLOYEE_AGE.into(),
            max: MAX_EMPLOYEE_AGE.into(),
        });
    }
    Ok(())
}

pub fn validate_salary(value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::Negative { field: "salary", value });
    }
    Ok(())
}

pub fn validate_phone_number(value: &str) -> Result<(), ValidationError> {
    if !PHONE_PATTERN.is_match(value) {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number",
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Reject empty or whitespace-only mandatory text
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}
