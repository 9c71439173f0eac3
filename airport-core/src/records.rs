use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::identity::{CodeFormat, RecordCode, EMPLOYEE_CODE, PASSENGER_CODE};
use crate::repository::{CodedRecord, Record};
use crate::validation::{self, require, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    pub airline_id: Option<i64>,
    pub airline_name: String,
}

impl Airline {
    pub fn new(airline_name: impl Into<String>) -> Self {
        Self {
            airline_id: None,
            airline_name: airline_name.into(),
        }
    }
}

impl Record for Airline {
    type Key = i64;
    const ENTITY: &'static str = "Airline";

    fn key(&self) -> Option<&i64> {
        self.airline_id.as_ref()
    }

    fn set_key(&mut self, key: i64) {
        self.airline_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("airline_name", &self.airline_name)
    }
}

/// Owned outside this layer; gates reference it and go away with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub airport_id: Option<i64>,
    pub airport_name: String,
}

impl Airport {
    pub fn new(airport_name: impl Into<String>) -> Self {
        Self {
            airport_id: None,
            airport_name: airport_name.into(),
        }
    }
}

impl Record for Airport {
    type Key = i64;
    const ENTITY: &'static str = "Airport";

    fn key(&self) -> Option<&i64> {
        self.airport_id.as_ref()
    }

    fn set_key(&mut self, key: i64) {
        self.airport_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("airport_name", &self.airport_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(ValidationError::InvalidFormat {
                field: "payment_status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: Option<i64>,
    pub booking_date: NaiveDate,
    pub payment_status: PaymentStatus,
}

impl Booking {
    pub fn new(booking_date: NaiveDate, payment_status: PaymentStatus) -> Self {
        Self {
            booking_id: None,
            booking_date,
            payment_status,
        }
    }
}

impl Record for Booking {
    type Key = i64;
    const ENTITY: &'static str = "Booking";

    fn key(&self) -> Option<&i64> {
        self.booking_id.as_ref()
    }

    fn set_key(&mut self, key: i64) {
        self.booking_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: Option<RecordCode>,
    pub first_name: String,
    pub last_name: String,
    pub gender: char,
    /// dd-mm-yyyy
    pub date_of_birth: String,
    pub age: i32,
    pub role: String,
    pub salary: f64,
    pub address: String,
    pub phone_number: String,
}

impl Record for Employee {
    type Key = RecordCode;
    const ENTITY: &'static str = "Employee";

    fn key(&self) -> Option<&RecordCode> {
        self.employee_id.as_ref()
    }

    fn set_key(&mut self, key: RecordCode) {
        self.employee_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_code()?;
        require("first_name", &self.first_name)?;
        require("last_name", &self.last_name)?;
        if !self.gender.is_alphabetic() {
            return Err(ValidationError::InvalidFormat {
                field: "gender",
                value: self.gender.to_string(),
            });
        }
        validation::validate_date_of_birth(&self.date_of_birth)?;
        validation::validate_age(self.age)?;
        require("role", &self.role)?;
        validation::validate_salary(self.salary)?;
        require("address", &self.address)?;
        validation::validate_phone_number(&self.phone_number)
    }
}

impl CodedRecord for Employee {
    const CODE_FORMAT: CodeFormat = EMPLOYEE_CODE;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightStatus {
    pub status_id: Option<i64>,
    pub status: String,
}

impl FlightStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status_id: None,
            status: status.into(),
        }
    }
}

impl Record for FlightStatus {
    type Key = i64;
    const ENTITY: &'static str = "FlightStatus";

    fn key(&self) -> Option<&i64> {
        self.status_id.as_ref()
    }

    fn set_key(&mut self, key: i64) {
        self.status_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("status", &self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub gate_number: Option<i64>,
    /// Must reference an existing airport
    pub airport_id: i64,
    pub status: String,
}

impl Gate {
    pub fn new(airport_id: i64, status: impl Into<String>) -> Self {
        Self {
            gate_number: None,
            airport_id,
            status: status.into(),
        }
    }
}

impl Record for Gate {
    type Key = i64;
    const ENTITY: &'static str = "Gate";

    fn key(&self) -> Option<&i64> {
        self.gate_number.as_ref()
    }

    fn set_key(&mut self, key: i64) {
        self.gate_number = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("status", &self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub passenger_id: Option<RecordCode>,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
    /// Unique across passengers
    pub passport_number: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

impl Record for Passenger {
    type Key = RecordCode;
    const ENTITY: &'static str = "Passenger";

    fn key(&self) -> Option<&RecordCode> {
        self.passenger_id.as_ref()
    }

    fn set_key(&mut self, key: RecordCode) {
        self.passenger_id = Some(key);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_code()?;
        require("first_name", &self.first_name)?;
        require("last_name", &self.last_name)?;
        if self.age < 0 {
            return Err(ValidationError::Negative {
                field: "age",
                value: self.age.into(),
            });
        }
        let today = Utc::now().date_naive();
        validation::validate_past_date("date_of_birth", self.date_of_birth, today)?;
        require("nationality", &self.nationality)?;
        require("passport_number", &self.passport_number)?;
        require("email", &self.email)?;
        validation::validate_phone_number(&self.phone_number)?;
        require("address", &self.address)
    }
}

impl CodedRecord for Passenger {
    const CODE_FORMAT: CodeFormat = PASSENGER_CODE;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn employee() -> Employee {
        Employee {
            employee_id: None,
            first_name: "Linh".to_string(),
            last_name: "Nguyen".to_string(),
            gender: 'F',
            date_of_birth: "12-03-1990".to_string(),
            age: 34,
            role: "Ground Staff".to_string(),
            salary: 1850.0,
            address: "12 Tran Phu, Da Nang".to_string(),
            phone_number: "0905123456".to_string(),
        }
    }

    pub fn passenger(passport_number: &str) -> Passenger {
        Passenger {
            passenger_id: None,
            first_name: "Minh".to_string(),
            last_name: "Tran".to_string(),
            age: 29,
            date_of_birth: NaiveDate::from_ymd_opt(1995, 7, 21).unwrap(),
            nationality: "Vietnamese".to_string(),
            passport_number: passport_number.to_string(),
            email: "minh.tran@example.com".to_string(),
            phone_number: "0912345678".to_string(),
            address: "5 Le Loi, Hue".to_string(),
        }
    }
}
