use async_trait::async_trait;
use std::fmt::{Debug, Display};

use crate::identity::{CodeFormat, RecordCode};
use crate::validation::ValidationError;

/// Which storage constraint rejected a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Primary key already taken (usually a stale code derivation)
    DuplicateKey,
    Unique(String),
    ForeignKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("{entity} violates {constraint:?}")]
    ConstraintViolation {
        entity: &'static str,
        constraint: Constraint,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Key space exhausted after {last} (width {width})")]
    KeyOverflow { last: String, width: usize },

    #[error("{entity} must carry a key before it is stored")]
    MissingKey { entity: &'static str },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PersistenceError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            PersistenceError::ConstraintViolation {
                constraint: Constraint::DuplicateKey,
                ..
            }
        )
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// A persisted record type and its key
pub trait Record: Clone + Debug + Send + Sync + 'static {
    type Key: Clone + Debug + Display + Ord + Send + Sync + 'static;

    /// Entity name used in errors and logs
    const ENTITY: &'static str;

    /// `None` until storage (or the identity policy) assigns one
    fn key(&self) -> Option<&Self::Key>;

    fn set_key(&mut self, key: Self::Key);

    fn validate(&self) -> Result<(), ValidationError>;
}

/// Records keyed by a fixed-width code instead of a generated integer
pub trait CodedRecord: Record<Key = RecordCode> {
    const CODE_FORMAT: CodeFormat;

    /// A code, when present, must match `CODE_FORMAT`
    fn validate_code(&self) -> Result<(), ValidationError> {
        match self.key() {
            Some(code) if !Self::CODE_FORMAT.matches(code.as_str()) => {
                Err(ValidationError::InvalidFormat {
                    field: "code",
                    value: code.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// CRUD gateway shared by every record type, implemented once per storage technology.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Store a new record. Generated keys are filled in on the returned copy.
    async fn insert(&self, record: T) -> PersistenceResult<T>;

    async fn find_by_id(&self, key: &T::Key) -> PersistenceResult<Option<T>>;

    /// No ordering is guaranteed.
    async fn find_all(&self) -> PersistenceResult<Vec<T>>;

    /// Replace a stored record; `NotFound` if its key is absent.
    async fn update(&self, record: T) -> PersistenceResult<T>;

    /// Deleting a missing key is a no-op.
    async fn delete_by_id(&self, key: &T::Key) -> PersistenceResult<()>;
}

#[async_trait]
pub trait CodedRepository<T: CodedRecord>: Repository<T> {
    /// Delete by business key. Affects zero rows, without error, when absent.
    async fn delete_by_business_key(&self, code: &str) -> PersistenceResult<()>;

    /// Record with the greatest code of `T::CODE_FORMAT`, if any
    async fn find_most_recent_by_descending_key(&self) -> PersistenceResult<Option<T>>;
}
