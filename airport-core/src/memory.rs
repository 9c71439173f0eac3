use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::identity::RecordCode;
use crate::records::{Airline, Airport, Booking, Employee, FlightStatus, Gate, Passenger};
use crate::repository::{
    CodedRecord, CodedRepository, Constraint, PersistenceError, PersistenceResult, Record,
    Repository,
};

/// Every table of the in-memory store. Integer keys come from per-table sequences.
#[derive(Debug, Default)]
pub struct Tables {
    airlines: BTreeMap<i64, Airline>,
    airports: BTreeMap<i64, Airport>,
    bookings: BTreeMap<i64, Booking>,
    employees: BTreeMap<RecordCode, Employee>,
    flight_statuses: BTreeMap<i64, FlightStatus>,
    gates: BTreeMap<i64, Gate>,
    passengers: BTreeMap<RecordCode, Passenger>,
    sequences: BTreeMap<&'static str, i64>,
}

impl Tables {
    fn next_sequence(&mut self, entity: &'static str) -> i64 {
        let seq = self.sequences.entry(entity).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// Storage hooks the generic in-memory repository needs from each record type
pub trait MemoryRecord: Record {
    fn table(tables: &Tables) -> &BTreeMap<Self::Key, Self>;

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Self::Key, Self>;

    /// Fill in the key of a record about to be inserted
    fn assign_key(&mut self, tables: &mut Tables) -> PersistenceResult<()>;

    /// Unique and foreign-key checks other than the primary key
    fn check_constraints(&self, _tables: &Tables) -> PersistenceResult<()> {
        Ok(())
    }

    /// Remove dependants of a deleted record
    fn cascade_delete(_key: &Self::Key, _tables: &mut Tables) {}
}

fn generated_key<T: Record<Key = i64>>(
    record: &mut T,
    tables: &mut Tables,
) -> PersistenceResult<()> {
    record.set_key(tables.next_sequence(T::ENTITY));
    Ok(())
}

fn supplied_key<T: CodedRecord>(record: &T) -> PersistenceResult<()> {
    match record.key() {
        Some(_) => Ok(()),
        None => Err(PersistenceError::MissingKey { entity: T::ENTITY }),
    }
}

macro_rules! generated_table {
    ($record:ty, $field:ident) => {
        impl MemoryRecord for $record {
            fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
                &mut tables.$field
            }

            fn assign_key(&mut self, tables: &mut Tables) -> PersistenceResult<()> {
                generated_key(self, tables)
            }
        }
    };
}

generated_table!(Airline, airlines);
generated_table!(Booking, bookings);
generated_table!(FlightStatus, flight_statuses);

impl MemoryRecord for Airport {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.airports
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.airports
    }

    fn assign_key(&mut self, tables: &mut Tables) -> PersistenceResult<()> {
        generated_key(self, tables)
    }

    fn cascade_delete(key: &i64, tables: &mut Tables) {
        let before = tables.gates.len();
        tables.gates.retain(|_, gate| gate.airport_id != *key);
        debug!("Cascaded airport {} delete to {} gate(s)", key, before - tables.gates.len());
    }
}

impl MemoryRecord for Gate {
    fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
        &tables.gates
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
        &mut tables.gates
    }

    fn assign_key(&mut self, tables: &mut Tables) -> PersistenceResult<()> {
        generated_key(self, tables)
    }

    fn check_constraints(&self, tables: &Tables) -> PersistenceResult<()> {
        if !tables.airports.contains_key(&self.airport_id) {
            return Err(PersistenceError::ConstraintViolation {
                entity: Self::ENTITY,
                constraint: Constraint::ForeignKey("airportid".to_string()),
            });
        }
        Ok(())
    }
}

impl MemoryRecord for Employee {
    fn table(tables: &Tables) -> &BTreeMap<RecordCode, Self> {
        &tables.employees
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<RecordCode, Self> {
        &mut tables.employees
    }

    fn assign_key(&mut self, _tables: &mut Tables) -> PersistenceResult<()> {
        supplied_key(self)
    }
}

impl MemoryRecord for Passenger {
    fn table(tables: &Tables) -> &BTreeMap<RecordCode, Self> {
        &tables.passengers
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<RecordCode, Self> {
        &mut tables.passengers
    }

    fn assign_key(&mut self, _tables: &mut Tables) -> PersistenceResult<()> {
        supplied_key(self)
    }

    fn check_constraints(&self, tables: &Tables) -> PersistenceResult<()> {
        let taken = tables
            .passengers
            .values()
            .any(|other| {
                other.passport_number == self.passport_number
                    && other.passenger_id != self.passenger_id
            });

        if taken {
            return Err(PersistenceError::ConstraintViolation {
                entity: Self::ENTITY,
                constraint: Constraint::Unique("passport_number".to_string()),
            });
        }
        Ok(())
    }
}

/// In-process storage technology, mainly for tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository<T: MemoryRecord>(&self) -> MemoryRepository<T> {
        MemoryRepository {
            tables: self.tables.clone(),
            _record: PhantomData,
        }
    }
}

pub struct MemoryRepository<T> {
    tables: Arc<RwLock<Tables>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<T: MemoryRecord> Repository<T> for MemoryRepository<T> {
    async fn insert(&self, mut record: T) -> PersistenceResult<T> {
        let mut tables = self.tables.write().await;

        record.check_constraints(&tables)?;
        record.assign_key(&mut tables)?;

        let key = record.key().cloned().ok_or(PersistenceError::MissingKey { entity: T::ENTITY })?;
        let table = T::table_mut(&mut tables);
        if table.contains_key(&key) {
            return Err(PersistenceError::ConstraintViolation {
                entity: T::ENTITY,
                constraint: Constraint::DuplicateKey,
            });
        }
        table.insert(key.clone(), record.clone());

        debug!("Inserted {} {}", T::ENTITY, key);
        Ok(record)
    }

    async fn find_by_id(&self, key: &T::Key) -> PersistenceResult<Option<T>> {
        let tables = self.tables.read().await;
        Ok(T::table(&tables).get(key).cloned())
    }

    async fn find_all(&self) -> PersistenceResult<Vec<T>> {
        let tables = self.tables.read().await;
        Ok(T::table(&tables).values().cloned().collect())
    }

    async fn update(&self, record: T) -> PersistenceResult<T> {
        let mut tables = self.tables.write().await;

        let key = match record.key() {
            Some(key) if T::table(&tables).contains_key(key) => key.clone(),
            other => {
                return Err(PersistenceError::NotFound {
                    entity: T::ENTITY,
                    key: other.map(|k| k.to_string()).unwrap_or_default(),
                })
            }
        };
        record.check_constraints(&tables)?;

        T::table_mut(&mut tables).insert(key.clone(), record.clone());
        debug!("Updated {} {}", T::ENTITY, key);
        Ok(record)
    }

    async fn delete_by_id(&self, key: &T::Key) -> PersistenceResult<()> {
        let mut tables = self.tables.write().await;

        if T::table_mut(&mut tables).remove(key).is_some() {
            T::cascade_delete(key, &mut tables);
            debug!("Deleted {} {}", T::ENTITY, key);
        }
        Ok(())
    }
}

#[async_trait]
impl<T: MemoryRecord + CodedRecord> CodedRepository<T> for MemoryRepository<T> {
    async fn delete_by_business_key(&self, code: &str) -> PersistenceResult<()> {
        let mut tables = self.tables.write().await;

        if T::table_mut(&mut tables).remove(code).is_some() {
            debug!("Deleted {} {} by business key", T::ENTITY, code);
        }
        Ok(())
    }

    async fn find_most_recent_by_descending_key(&self) -> PersistenceResult<Option<T>> {
        let tables = self.tables.read().await;

        Ok(T::table(&tables)
            .iter()
            .rev()
            .find(|(code, _)| T::CODE_FORMAT.matches(code.as_str()))
            .map(|(_, record)| record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PASSENGER_CODE;
    use crate::records::fixtures::passenger;

    fn coded(code: &str, passport: &str) -> Passenger {
        let mut p = passenger(passport);
        p.passenger_id = Some(PASSENGER_CODE.parse(code).unwrap());
        p
    }

    #[tokio::test]
    async fn test_generated_keys() {
        let db = MemoryDatabase::new();
        let airlines = db.repository::<Airline>();

        let first = airlines.insert(Airline::new("Vietnam Airlines")).await.unwrap();
        let second = airlines.insert(Airline::new("VietJet Air")).await.unwrap();
        assert_eq!(first.airline_id, Some(1));
        assert_eq!(second.airline_id, Some(2));

        // Sequences are per table
        let status = db
            .repository::<FlightStatus>()
            .insert(FlightStatus::new("ON_TIME"))
            .await
            .unwrap();
        assert_eq!(status.status_id, Some(1));

        assert_eq!(airlines.find_by_id(&2).await.unwrap().unwrap().airline_name, "VietJet Air");
        assert_eq!(airlines.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = MemoryDatabase::new();
        let statuses = db.repository::<FlightStatus>();

        let mut status = statuses.insert(FlightStatus::new("ON_TIME")).await.unwrap();
        status.status = "DELAYED".to_string();
        statuses.update(status.clone()).await.unwrap();
        assert_eq!(statuses.find_by_id(&1).await.unwrap().unwrap().status, "DELAYED");

        statuses.delete_by_id(&1).await.unwrap();
        assert!(statuses.find_by_id(&1).await.unwrap().is_none());
        // Second delete is a no-op
        statuses.delete_by_id(&1).await.unwrap();

        let missing = statuses.update(status).await;
        assert!(matches!(missing, Err(PersistenceError::NotFound { entity: "FlightStatus", .. })));

        let keyless = statuses.update(FlightStatus::new("CANCELLED")).await;
        assert!(matches!(keyless, Err(PersistenceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_gate_requires_airport_and_cascades() {
        let db = MemoryDatabase::new();
        let airports = db.repository::<Airport>();
        let gates = db.repository::<Gate>();

        let orphan = gates.insert(Gate::new(99, "OPEN")).await;
        assert!(matches!(
            orphan,
            Err(PersistenceError::ConstraintViolation { constraint: Constraint::ForeignKey(_), .. })
        ));

        let noi_bai = airports.insert(Airport::new("Noi Bai")).await.unwrap();
        let tan_son_nhat = airports.insert(Airport::new("Tan Son Nhat")).await.unwrap();
        let hanoi = noi_bai.airport_id.unwrap();
        let saigon = tan_son_nhat.airport_id.unwrap();

        gates.insert(Gate::new(hanoi, "OPEN")).await.unwrap();
        gates.insert(Gate::new(hanoi, "CLOSED")).await.unwrap();
        gates.insert(Gate::new(saigon, "OPEN")).await.unwrap();

        airports.delete_by_id(&hanoi).await.unwrap();

        let remaining = gates.find_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].airport_id, saigon);
    }

    #[tokio::test]
    async fn test_passenger_constraints() {
        let db = MemoryDatabase::new();
        let passengers = db.repository::<Passenger>();

        let keyless = passengers.insert(passenger("B1000001")).await;
        assert!(matches!(keyless, Err(PersistenceError::MissingKey { entity: "Passenger" })));

        passengers.insert(coded("P0001", "B1000001")).await.unwrap();

        let same_key = passengers.insert(coded("P0001", "B1000002")).await.unwrap_err();
        assert!(same_key.is_duplicate_key());

        let same_passport = passengers.insert(coded("P0002", "B1000001")).await.unwrap_err();
        assert!(matches!(
            same_passport,
            PersistenceError::ConstraintViolation { constraint: Constraint::Unique(_), .. }
        ));

        // Updating a passenger keeps its own passport without tripping the check
        let mut updated = coded("P0001", "B1000001");
        updated.email = "new@example.com".to_string();
        passengers.update(updated).await.unwrap();

        passengers.insert(coded("P0002", "B1000002")).await.unwrap();
        let taken = passengers.update(coded("P0002", "B1000001")).await.unwrap_err();
        match taken {
            PersistenceError::ConstraintViolation {
                entity,
                constraint: Constraint::Unique(column),
            } => {
                assert_eq!(entity, "Passenger");
                assert_eq!(column, "passport_number");
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
        let code = PASSENGER_CODE.parse("P0002").unwrap();
        let unchanged = passengers.find_by_id(&code).await.unwrap().unwrap();
        assert_eq!(unchanged.passport_number, "B1000002");
    }

    #[tokio::test]
    async fn test_find_most_recent_by_descending_key() {
        let db = MemoryDatabase::new();
        let passengers = db.repository::<Passenger>();

        assert!(passengers.find_most_recent_by_descending_key().await.unwrap().is_none());

        passengers.insert(coded("P0001", "A1")).await.unwrap();
        passengers.insert(coded("P0010", "A2")).await.unwrap();
        passengers.insert(coded("P0002", "A3")).await.unwrap();

        let latest = passengers.find_most_recent_by_descending_key().await.unwrap().unwrap();
        assert_eq!(latest.passenger_id.unwrap().as_str(), "P0010");
    }

    #[tokio::test]
    async fn test_delete_by_business_key() {
        let db = MemoryDatabase::new();
        let passengers = db.repository::<Passenger>();

        passengers.insert(coded("P0001", "A1")).await.unwrap();
        passengers.insert(coded("P0002", "A2")).await.unwrap();

        passengers.delete_by_business_key("P0001").await.unwrap();
        let left = passengers.find_all().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].passport_number, "A2");

        // Missing keys affect nothing and are not an error
        passengers.delete_by_business_key("P0001").await.unwrap();
        passengers.delete_by_business_key("not-a-code").await.unwrap();
        assert_eq!(passengers.find_all().await.unwrap().len(), 1);
    }
}
