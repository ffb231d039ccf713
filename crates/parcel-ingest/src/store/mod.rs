//! Store boundary
//!
//! [`LoadStore`] is everything the loader asks of the relational store:
//! DDL for provisioning, one transaction at a time, a single recovery
//! savepoint, and row inserts. [`PgLoadStore`] talks to PostgreSQL;
//! `MemoryStore`, built only for tests or with the `test-util` feature,
//! is an in-process double with the same savepoint semantics.

use async_trait::async_trait;
use thiserror::Error;

use crate::encoder::ColumnValue;
use crate::plan::{Identifier, QualifiedTable};

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-util"))]
pub use memory::{ColumnKind, MemoryStore};
pub use postgres::PgLoadStore;

/// Name of the per-record savepoint. Depth never exceeds one, so a single
/// fixed name is enough.
pub const RECOVERY_SAVEPOINT: &str = "recovery";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store refused a row's values: a data exception (SQLSTATE class
    /// 22) or an integrity constraint violation (class 23).
    #[error("{message} (SQLSTATE {code})")]
    Rejected { code: String, message: String },

    #[error("Schema {0} already exists")]
    SchemaExists(String),

    #[error("No transaction is open")]
    NoTransaction,

    #[error("A transaction is already open")]
    TransactionOpen,

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::Rejected { .. })
    }
}

/// SQLSTATE classes that describe the row rather than the connection,
/// statement or transaction
fn is_row_level(code: &str) -> bool {
    code.starts_with("22") || code.starts_with("23")
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let rejected = err.as_database_error().and_then(|db| {
            let code = db.code()?;
            is_row_level(&code).then(|| StoreError::Rejected {
                code: code.into_owned(),
                message: db.message().to_string(),
            })
        });

        rejected.unwrap_or(StoreError::Database(err))
    }
}

/// A destination table and the SQL types of its columns, in order.
///
/// Types carry no length or precision modifier (`character varying`, not
/// `character varying(10)`); the column itself enforces those on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub table: QualifiedTable,
    pub column_types: Vec<String>,
}

impl TableShape {
    /// `INSERT` with one placeholder per value.
    ///
    /// Placeholders are cast to the destination column type, so the store
    /// parses each text value exactly as it would parse a quoted literal.
    /// Values past the last column get no cast; the store rejects the
    /// statement for having more expressions than columns.
    pub fn insert_sql(&self, arity: usize) -> String {
        let placeholders = (1..=arity)
            .map(|n| match self.column_types.get(n - 1) {
                Some(ty) => format!("CAST(${n} AS {ty})"),
                None => format!("${n}"),
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} VALUES ({placeholders})", self.table.quoted())
    }
}

#[async_trait]
pub trait LoadStore: Send {
    /// `CREATE SCHEMA`; an existing schema is [`StoreError::SchemaExists`]
    async fn create_schema(&mut self, schema: &Identifier) -> StoreResult<()>;

    /// Create `destination` with the columns of `template` and return its shape
    async fn create_table_like(
        &mut self,
        destination: &QualifiedTable,
        template: &QualifiedTable,
    ) -> StoreResult<TableShape>;

    async fn begin(&mut self) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn savepoint(&mut self) -> StoreResult<()>;

    async fn release_savepoint(&mut self) -> StoreResult<()>;

    async fn rollback_to_savepoint(&mut self) -> StoreResult<()>;

    /// Insert one row inside the open transaction
    async fn insert(&mut self, shape: &TableShape, values: &[ColumnValue]) -> StoreResult<()>;
}
