use airport_core::repository::{PersistenceError, PersistenceResult, Record};
use airport_core::{
    Airline, Airport, Booking, Employee, FlightStatus, Gate, Passenger, PaymentStatus, RecordCode,
};
use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, Postgres};

pub type PgQueryAs<'q, O> = QueryAs<'q, Postgres, O, PgArguments>;

/// A primary key as it is bound into a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue<'a> {
    Int(i64),
    Code(&'a str),
}

/// Maps a record type onto its table.
pub trait PgTable: Record {
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    /// Non-key columns, in the order `bind_columns` binds them
    const COLUMNS: &'static [&'static str];
    /// Key comes from an identity column and is never written
    const GENERATED_KEY: bool;

    fn key_value(key: &Self::Key) -> KeyValue<'_>;

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O>;

    fn from_row(row: Self::Row) -> PersistenceResult<Self>;
}

fn corrupt(entity: &str, detail: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Storage(format!("unreadable {} row: {}", entity, detail))
}

#[derive(sqlx::FromRow)]
pub struct AirlineRow {
    airlineid: i64,
    airline_name: String,
}

impl PgTable for Airline {
    type Row = AirlineRow;

    const TABLE: &'static str = "airline";
    const KEY_COLUMN: &'static str = "airlineid";
    const COLUMNS: &'static [&'static str] = &["airline_name"];
    const GENERATED_KEY: bool = true;

    fn key_value(key: &i64) -> KeyValue<'_> {
        KeyValue::Int(*key)
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query.bind(&self.airline_name)
    }

    fn from_row(row: AirlineRow) -> PersistenceResult<Self> {
        Ok(Airline {
            airline_id: Some(row.airlineid),
            airline_name: row.airline_name,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct AirportRow {
    airportid: i64,
    airport_name: String,
}

impl PgTable for Airport {
    type Row = AirportRow;

    const TABLE: &'static str = "airport";
    const KEY_COLUMN: &'static str = "airportid";
    const COLUMNS: &'static [&'static str] = &["airport_name"];
    const GENERATED_KEY: bool = true;

    fn key_value(key: &i64) -> KeyValue<'_> {
        KeyValue::Int(*key)
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query.bind(&self.airport_name)
    }

    fn from_row(row: AirportRow) -> PersistenceResult<Self> {
        Ok(Airport {
            airport_id: Some(row.airportid),
            airport_name: row.airport_name,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct BookingRow {
    booking_id: i64,
    booking_date: NaiveDate,
    payment_status: String,
}

impl PgTable for Booking {
    type Row = BookingRow;

    const TABLE: &'static str = "booking";
    const KEY_COLUMN: &'static str = "booking_id";
    const COLUMNS: &'static [&'static str] = &["booking_date", "payment_status"];
    const GENERATED_KEY: bool = true;

    fn key_value(key: &i64) -> KeyValue<'_> {
        KeyValue::Int(*key)
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.booking_date)
            .bind(self.payment_status.as_str())
    }

    fn from_row(row: BookingRow) -> PersistenceResult<Self> {
        let payment_status: PaymentStatus = row
            .payment_status
            .parse()
            .map_err(|e| corrupt(Self::ENTITY, e))?;

        Ok(Booking {
            booking_id: Some(row.booking_id),
            booking_date: row.booking_date,
            payment_status,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct EmployeeRow {
    employeeid: String,
    first_name: String,
    last_name: String,
    gender: String,
    date_of_birth: String,
    age: i32,
    role: String,
    salary: f64,
    address: String,
    phone_number: String,
}

impl PgTable for Employee {
    type Row = EmployeeRow;

    const TABLE: &'static str = "employee";
    const KEY_COLUMN: &'static str = "employeeid";
    const COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "gender",
        "date_of_birth",
        "age",
        "role",
        "salary",
        "address",
        "phone_number",
    ];
    const GENERATED_KEY: bool = false;

    fn key_value(key: &RecordCode) -> KeyValue<'_> {
        KeyValue::Code(key.as_str())
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&self.first_name)
            .bind(&self.last_name)
            .bind(self.gender.to_string())
            .bind(&self.date_of_birth)
            .bind(self.age)
            .bind(&self.role)
            .bind(self.salary)
            .bind(&self.address)
            .bind(&self.phone_number)
    }

    fn from_row(row: EmployeeRow) -> PersistenceResult<Self> {
        let gender = row
            .gender
            .chars()
            .next()
            .ok_or_else(|| corrupt(Self::ENTITY, "empty gender"))?;

        Ok(Employee {
            employee_id: Some(RecordCode::from_stored(row.employeeid)),
            first_name: row.first_name,
            last_name: row.last_name,
            gender,
            date_of_birth: row.date_of_birth,
            age: row.age,
            role: row.role,
            salary: row.salary,
            address: row.address,
            phone_number: row.phone_number,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct FlightStatusRow {
    statusid: i64,
    status: String,
}

impl PgTable for FlightStatus {
    type Row = FlightStatusRow;

    const TABLE: &'static str = "flight_status";
    const KEY_COLUMN: &'static str = "statusid";
    const COLUMNS: &'static [&'static str] = &["status"];
    const GENERATED_KEY: bool = true;

    fn key_value(key: &i64) -> KeyValue<'_> {
        KeyValue::Int(*key)
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query.bind(&self.status)
    }

    fn from_row(row: FlightStatusRow) -> PersistenceResult<Self> {
        Ok(FlightStatus {
            status_id: Some(row.statusid),
            status: row.status,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct GateRow {
    gate_number: i64,
    airportid: i64,
    status: String,
}

impl PgTable for Gate {
    type Row = GateRow;

    const TABLE: &'static str = "gate";
    const KEY_COLUMN: &'static str = "gate_number";
    const COLUMNS: &'static [&'static str] = &["airportid", "status"];
    const GENERATED_KEY: bool = true;

    fn key_value(key: &i64) -> KeyValue<'_> {
        KeyValue::Int(*key)
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query.bind(self.airport_id).bind(&self.status)
    }

    fn from_row(row: GateRow) -> PersistenceResult<Self> {
        Ok(Gate {
            gate_number: Some(row.gate_number),
            airport_id: row.airportid,
            status: row.status,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct PassengerRow {
    passengerid: String,
    first_name: String,
    last_name: String,
    age: i32,
    date_of_birth: NaiveDate,
    nationality: String,
    passport_number: String,
    email: String,
    phone_number: String,
    address: String,
}

impl PgTable for Passenger {
    type Row = PassengerRow;

    const TABLE: &'static str = "passenger";
    const KEY_COLUMN: &'static str = "passengerid";
    const COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "age",
        "date_of_birth",
        "nationality",
        "passport_number",
        "email",
        "phone_number",
        "address",
    ];
    const GENERATED_KEY: bool = false;

    fn key_value(key: &RecordCode) -> KeyValue<'_> {
        KeyValue::Code(key.as_str())
    }

    fn bind_columns<'q, O>(&'q self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&self.first_name)
            .bind(&self.last_name)
            .bind(self.age)
            .bind(self.date_of_birth)
            .bind(&self.nationality)
            .bind(&self.passport_number)
            .bind(&self.email)
            .bind(&self.phone_number)
            .bind(&self.address)
    }

    fn from_row(row: PassengerRow) -> PersistenceResult<Self> {
        Ok(Passenger {
            passenger_id: Some(RecordCode::from_stored(row.passengerid)),
            first_name: row.first_name,
            last_name: row.last_name,
            age: row.age,
            date_of_birth: row.date_of_birth,
            nationality: row.nationality,
            passport_number: row.passport_number,
            email: row.email,
            phone_number: row.phone_number,
            address: row.address,
        })
    }
}
