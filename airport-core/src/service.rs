use tracing::{debug, info, warn};

use crate::repository::{CodedRecord, CodedRepository, Record, Repository};
use crate::CoreResult;

pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 3;

/// Runs records through validation and key assignment before they reach a repository
pub struct RecordService<R> {
    repository: R,
    max_key_attempts: u32,
}

impl<R> RecordService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }

    /// How many times a derived code is recomputed after losing a race
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts.max(1);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validate and insert a record whose key is generated by storage.
    /// Coded records go through [`create_coded`](Self::create_coded).
    pub async fn create<T>(&self, record: T) -> CoreResult<T>
    where
        T: Record<Key = i64>,
        R: Repository<T>,
    {
        record.validate()?;
        let stored = self.repository.insert(record).await?;
        info!("Created {} {:?}", T::ENTITY, stored.key());
        Ok(stored)
    }

    /// Validate and insert a coded record.
    ///
    /// A supplied code must match the record's format. Without one, the
    /// next code after the current maximum is derived; if another writer takes
    /// it first, the derivation is repeated up to the configured attempt count.
    pub async fn create_coded<T>(&self, record: T) -> CoreResult<T>
    where
        T: CodedRecord,
        R: CodedRepository<T>,
    {
        record.validate()?;

        if record.key().is_some() {
            let stored = self.repository.insert(record).await?;
            info!("Created {} with supplied code", T::ENTITY);
            return Ok(stored);
        }

        let mut attempt = 1;
        loop {
            let latest = self.repository.find_most_recent_by_descending_key().await?;
            let code = T::CODE_FORMAT.next_after(latest.as_ref().and_then(|r| r.key()))?;
            debug!("Derived {} code {} (attempt {})", T::ENTITY, code, attempt);

            let mut candidate = record.clone();
            candidate.set_key(code.clone());

            match self.repository.insert(candidate).await {
                Ok(stored) => {
                    info!("Created {} {}", T::ENTITY, code);
                    return Ok(stored);
                }
                Err(err) if err.is_duplicate_key() && attempt < self.max_key_attempts => {
                    warn!("{} code {} already taken, retrying", T::ENTITY, code);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn update<T>(&self, record: T) -> CoreResult<T>
    where
        T: Record,
        R: Repository<T>,
    {
        record.validate()?;
        Ok(self.repository.update(record).await?)
    }

    pub async fn find<T>(&self, key: &T::Key) -> CoreResult<Option<T>>
    where
        T: Record,
        R: Repository<T>,
    {
        Ok(self.repository.find_by_id(key).await?)
    }

    pub async fn list<T>(&self) -> CoreResult<Vec<T>>
    where
        T: Record,
        R: Repository<T>,
    {
        Ok(self.repository.find_all().await?)
    }

    pub async fn remove<T>(&self, key: &T::Key) -> CoreResult<()>
    where
        T: Record,
        R: Repository<T>,
    {
        self.repository.delete_by_id(key).await?;
        info!("Removed {} {}", T::ENTITY, key);
        Ok(())
    }

    pub async fn remove_by_business_key<T>(&self, code: &str) -> CoreResult<()>
    where
        T: CodedRecord,
        R: CodedRepository<T>,
    {
        self.repository.delete_by_business_key(code).await?;
        info!("Removed {} {} by business key", T::ENTITY, code);
        Ok(())
    }

    pub async fn latest<T>(&self) -> CoreResult<Option<T>>
    where
        T: CodedRecord,
        R: CodedRepository<T>,
    {
        Ok(self.repository.find_most_recent_by_descending_key().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RecordCode, EMPLOYEE_CODE, PASSENGER_CODE};
    use crate::memory::{MemoryDatabase, MemoryRepository};
    use crate::records::fixtures::{employee, passenger};
    use crate::records::{Airline, Employee, Passenger};
    use crate::repository::{PersistenceError, PersistenceResult};
    use crate::validation::ValidationError;
    use crate::CoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_create_validates_first() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Airline>());

        let rejected = service.create(Airline::new("  ")).await;
        assert!(matches!(rejected, Err(CoreError::Validation(ValidationError::Required { .. }))));
        assert!(service.list::<Airline>().await.unwrap().is_empty());

        let created = service.create(Airline::new("Pacific Airlines")).await.unwrap();
        assert_eq!(created.airline_id, Some(1));
    }

    #[tokio::test]
    async fn test_create_coded_derives_codes() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Passenger>());

        let first = service.create_coded(passenger("C0000001")).await.unwrap();
        let second = service.create_coded(passenger("C0000002")).await.unwrap();
        assert_eq!(first.passenger_id.unwrap().as_str(), "P0001");
        assert_eq!(second.passenger_id.unwrap().as_str(), "P0002");

        let latest = service.latest::<Passenger>().await.unwrap().unwrap();
        assert_eq!(latest.passport_number, "C0000002");
    }

    #[tokio::test]
    async fn test_create_coded_continues_after_supplied_code() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Employee>());

        let mut supplied = employee();
        supplied.employee_id = Some(EMPLOYEE_CODE.parse("E0041").unwrap());
        service.create_coded(supplied).await.unwrap();

        let derived = service.create_coded(employee()).await.unwrap();
        assert_eq!(derived.employee_id.unwrap().as_str(), "E0042");
    }

    #[tokio::test]
    async fn test_create_coded_rejects_foreign_code() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Employee>());

        let mut wrong = employee();
        wrong.employee_id = Some(RecordCode::from_stored("P0001".to_string()));
        let result = service.create_coded(wrong).await;
        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn test_malformed_code_never_reaches_storage() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Passenger>());

        let mut bogus = passenger("G1");
        bogus.passenger_id = Some(RecordCode::from_stored("bogus-code".to_string()));
        assert!(matches!(
            service.create_coded(bogus.clone()).await,
            Err(CoreError::Validation(ValidationError::InvalidFormat { field: "code", .. }))
        ));

        let mut stored = service.create_coded(passenger("G2")).await.unwrap();
        stored.passenger_id = bogus.passenger_id.clone();
        assert!(matches!(
            service.update(stored).await,
            Err(CoreError::Validation(ValidationError::InvalidFormat { field: "code", .. }))
        ));

        let codes: Vec<_> = service
            .list::<Passenger>()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.passenger_id)
            .collect();
        assert_eq!(codes, vec![PASSENGER_CODE.parse("P0001").unwrap()]);
    }

    #[tokio::test]
    async fn test_create_coded_overflow() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Passenger>());

        let mut last = passenger("D1");
        last.passenger_id = Some(PASSENGER_CODE.parse("P9999").unwrap());
        service.create_coded(last).await.unwrap();

        let result = service.create_coded(passenger("D2")).await;
        assert!(matches!(
            result,
            Err(CoreError::Persistence(PersistenceError::KeyOverflow { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let db = MemoryDatabase::new();
        let service = RecordService::new(db.repository::<Employee>());

        let mut stored = service.create_coded(employee()).await.unwrap();
        let code = stored.employee_id.clone().unwrap();

        stored.salary = -5.0;
        assert!(matches!(
            service.update(stored.clone()).await,
            Err(CoreError::Validation(ValidationError::Negative { .. }))
        ));

        stored.salary = 2100.0;
        service.update(stored).await.unwrap();
        let found = service.find::<Employee>(&code).await.unwrap().unwrap();
        assert_eq!(found.salary, 2100.0);

        service.remove::<Employee>(&code).await.unwrap();
        assert!(service.find::<Employee>(&code).await.unwrap().is_none());
    }

    /// Reports no passengers on its first lookup, as a writer that read just
    /// before a competing insert would see.
    struct StaleReads {
        inner: MemoryRepository<Passenger>,
        lookups: AtomicU32,
    }

    #[async_trait]
    impl Repository<Passenger> for StaleReads {
        async fn insert(&self, record: Passenger) -> PersistenceResult<Passenger> {
            self.inner.insert(record).await
        }

        async fn find_by_id(&self, key: &RecordCode) -> PersistenceResult<Option<Passenger>> {
            self.inner.find_by_id(key).await
        }

        async fn find_all(&self) -> PersistenceResult<Vec<Passenger>> {
            self.inner.find_all().await
        }

        async fn update(&self, record: Passenger) -> PersistenceResult<Passenger> {
            self.inner.update(record).await
        }

        async fn delete_by_id(&self, key: &RecordCode) -> PersistenceResult<()> {
            self.inner.delete_by_id(key).await
        }
    }

    #[async_trait]
    impl CodedRepository<Passenger> for StaleReads {
        async fn delete_by_business_key(&self, code: &str) -> PersistenceResult<()> {
            self.inner.delete_by_business_key(code).await
        }

        async fn find_most_recent_by_descending_key(&self) -> PersistenceResult<Option<Passenger>> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(None);
            }
            self.inner.find_most_recent_by_descending_key().await
        }
    }

    #[tokio::test]
    async fn test_create_coded_retries_stale_derivation() {
        let db = MemoryDatabase::new();
        let inner = db.repository::<Passenger>();

        let mut existing = passenger("E1");
        existing.passenger_id = Some(PASSENGER_CODE.parse("P0001").unwrap());
        inner.insert(existing).await.unwrap();

        let service = RecordService::new(StaleReads {
            inner,
            lookups: AtomicU32::new(0),
        });

        let created = service.create_coded(passenger("E2")).await.unwrap();
        assert_eq!(created.passenger_id.unwrap().as_str(), "P0002");
        assert_eq!(service.repository().lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_create_coded_gives_up_after_max_attempts() {
        let db = MemoryDatabase::new();
        let inner = db.repository::<Passenger>();

        let mut existing = passenger("F1");
        existing.passenger_id = Some(PASSENGER_CODE.parse("P0001").unwrap());
        inner.insert(existing).await.unwrap();

        let service = RecordService::new(StaleReads {
            inner,
            lookups: AtomicU32::new(0),
        })
        .with_max_key_attempts(1);

        let result = service.create_coded(passenger("F2")).await;
        match result {
            Err(CoreError::Persistence(err)) => assert!(err.is_duplicate_key()),
            other => panic!("expected duplicate key, got {other:?}"),
        }
    }
}
