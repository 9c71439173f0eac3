pub mod records;
pub mod validation;
pub mod identity;
pub mod repository;
pub mod memory;
pub mod service;

pub use identity::{CodeFormat, RecordCode};
pub use records::{
    Airline, Airport, Booking, Employee, FlightStatus, Gate, Passenger, PaymentStatus,
};
pub use repository::{
    CodedRecord, CodedRepository, Constraint, PersistenceError, Record, Repository,
};
pub use memory::{MemoryDatabase, MemoryRepository};
pub use service::RecordService;
pub use validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type CoreResult<T> = Result<T, CoreError>;
