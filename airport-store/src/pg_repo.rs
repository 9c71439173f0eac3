use airport_core::repository::{
    CodedRecord, CodedRepository, Constraint, PersistenceError, PersistenceResult, Repository,
};
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::{PgPool, Postgres};
use std::marker::PhantomData;
use tracing::debug;

use crate::tables::{KeyValue, PgQueryAs, PgTable};

/// Generic Postgres repository; one instance per record type.
pub struct PgRepository<T> {
    pool: PgPool,
    _record: PhantomData<fn() -> T>,
}

impl<T> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

impl<T> Clone for PgRepository<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

fn bind_key<'q, O>(query: PgQueryAs<'q, O>, key: KeyValue<'q>) -> PgQueryAs<'q, O> {
    match key {
        KeyValue::Int(value) => query.bind(value),
        KeyValue::Code(value) => query.bind(value),
    }
}

fn returning<T: PgTable>() -> String {
    std::iter::once(T::KEY_COLUMN)
        .chain(T::COLUMNS.iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn select_sql<T: PgTable>() -> String {
    format!("SELECT {} FROM {}", returning::<T>(), T::TABLE)
}

pub(crate) fn find_sql<T: PgTable>() -> String {
    format!("{} WHERE {} = $1", select_sql::<T>(), T::KEY_COLUMN)
}

pub(crate) fn insert_sql<T: PgTable>() -> String {
    let columns: Vec<&str> = if T::GENERATED_KEY {
        T::COLUMNS.to_vec()
    } else {
        std::iter::once(T::KEY_COLUMN).chain(T::COLUMNS.iter().copied()).collect()
    };
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        T::TABLE,
        columns.join(", "),
        placeholders.join(", "),
        returning::<T>()
    )
}

pub(crate) fn update_sql<T: PgTable>() -> String {
    let assignments: Vec<String> = T::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", column, i + 1))
        .collect();

    format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        T::TABLE,
        assignments.join(", "),
        T::KEY_COLUMN,
        T::COLUMNS.len() + 1,
        returning::<T>()
    )
}

pub(crate) fn delete_sql<T: PgTable>() -> String {
    format!("DELETE FROM {} WHERE {} = $1", T::TABLE, T::KEY_COLUMN)
}

/// Greatest key of the code format. `COLLATE "C"` keeps the order bytewise.
pub(crate) fn latest_sql<T: PgTable>() -> String {
    format!(
        "{} WHERE {key} ~ $1 ORDER BY {key} COLLATE \"C\" DESC LIMIT 1",
        select_sql::<T>(),
        key = T::KEY_COLUMN
    )
}

/// Name the violated constraint, if the failure was one
pub(crate) fn classify(
    table: &str,
    kind: ErrorKind,
    constraint: Option<&str>,
) -> Option<Constraint> {
    let name = constraint.unwrap_or_default().to_string();
    match kind {
        ErrorKind::UniqueViolation if name == format!("{}_pkey", table) => {
            Some(Constraint::DuplicateKey)
        }
        ErrorKind::UniqueViolation => Some(Constraint::Unique(name)),
        ErrorKind::ForeignKeyViolation => Some(Constraint::ForeignKey(name)),
        _ => None,
    }
}

fn map_error<T: PgTable>(err: sqlx::Error) -> PersistenceError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(constraint) = classify(T::TABLE, db_err.kind(), db_err.constraint()) {
            return PersistenceError::ConstraintViolation {
                entity: T::ENTITY,
                constraint,
            };
        }
    }
    PersistenceError::Storage(err.to_string())
}

#[async_trait]
impl<T: PgTable> Repository<T> for PgRepository<T> {
    async fn insert(&self, record: T) -> PersistenceResult<T> {
        let sql = insert_sql::<T>();
        let mut query = sqlx::query_as::<Postgres, T::Row>(&sql);
        if !T::GENERATED_KEY {
            let key = record.key().ok_or(PersistenceError::MissingKey { entity: T::ENTITY })?;
            query = bind_key(query, T::key_value(key));
        }

        let row = record
            .bind_columns(query)
            .fetch_one(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        let stored = T::from_row(row)?;
        debug!("Inserted into {}: {:?}", T::TABLE, stored.key());
        Ok(stored)
    }

    async fn find_by_id(&self, key: &T::Key) -> PersistenceResult<Option<T>> {
        let sql = find_sql::<T>();
        let row = bind_key(sqlx::query_as::<Postgres, T::Row>(&sql), T::key_value(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        row.map(T::from_row).transpose()
    }

    async fn find_all(&self) -> PersistenceResult<Vec<T>> {
        let sql = select_sql::<T>();
        let rows = sqlx::query_as::<Postgres, T::Row>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        rows.into_iter().map(T::from_row).collect()
    }

    async fn update(&self, record: T) -> PersistenceResult<T> {
        let key = record.key().ok_or_else(|| PersistenceError::NotFound {
            entity: T::ENTITY,
            key: String::new(),
        })?;

        let sql = update_sql::<T>();
        let query = record.bind_columns(sqlx::query_as::<Postgres, T::Row>(&sql));
        let row = bind_key(query, T::key_value(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        match row {
            Some(row) => {
                debug!("Updated {} {}", T::TABLE, key);
                T::from_row(row)
            }
            None => Err(PersistenceError::NotFound {
                entity: T::ENTITY,
                key: key.to_string(),
            }),
        }
    }

    async fn delete_by_id(&self, key: &T::Key) -> PersistenceResult<()> {
        let sql = delete_sql::<T>();
        let query = match T::key_value(key) {
            KeyValue::Int(value) => sqlx::query::<Postgres>(&sql).bind(value),
            KeyValue::Code(value) => sqlx::query::<Postgres>(&sql).bind(value),
        };

        let result = query.execute(&self.pool).await.map_err(map_error::<T>)?;
        debug!("Deleted {} row(s) from {}", result.rows_affected(), T::TABLE);
        Ok(())
    }
}

#[async_trait]
impl<T: PgTable + CodedRecord> CodedRepository<T> for PgRepository<T> {
    async fn delete_by_business_key(&self, code: &str) -> PersistenceResult<()> {
        let sql = delete_sql::<T>();
        let result = sqlx::query::<Postgres>(&sql)
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        debug!(
            "Deleted {} row(s) from {} by business key {}",
            result.rows_affected(),
            T::TABLE,
            code
        );
        Ok(())
    }

    async fn find_most_recent_by_descending_key(&self) -> PersistenceResult<Option<T>> {
        let sql = latest_sql::<T>();
        let row = sqlx::query_as::<Postgres, T::Row>(&sql)
            .bind(T::CODE_FORMAT.sql_pattern())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_error::<T>)?;

        row.map(T::from_row).transpose()
    }
}
