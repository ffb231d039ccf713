//! PostgreSQL implementation of [`LoadStore`]

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use super::{LoadStore, StoreError, StoreResult, TableShape, RECOVERY_SAVEPOINT};
use crate::config::DatabaseConfig;
use crate::encoder::ColumnValue;
use crate::plan::{Identifier, QualifiedTable};

/// SQLSTATE `duplicate_schema`
const DUPLICATE_SCHEMA: &str = "42P06";

/// Column types of a table, in column order, as SQL type names.
///
/// The type modifier is left out: an explicit cast to `varchar(n)` truncates,
/// while the assignment to the column raises 22001 for an over-long value.
const COLUMN_TYPES_SQL: &str = r#"
    SELECT format_type(a.atttypid, NULL)
    FROM pg_attribute a
    WHERE a.attrelid = $1::regclass
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// Loader connection to PostgreSQL
///
/// The pool is capped at one connection: a state job owns its connection
/// and its open transaction for the whole run.
pub struct PgLoadStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLoadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(StoreError::Database)?;

        info!(database = %config.display_target(), "Connected to database");

        Ok(Self::new(pool))
    }

    fn tx(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(StoreError::NoTransaction)
    }

    async fn execute_in_tx(&mut self, sql: &str) -> StoreResult<()> {
        let tx = self.tx()?;
        sqlx::query(sql).execute(&mut **tx).await?;
        Ok(())
    }
}

#[async_trait]
impl LoadStore for PgLoadStore {
    async fn create_schema(&mut self, schema: &Identifier) -> StoreResult<()> {
        let sql = format!("CREATE SCHEMA {}", schema.quoted());

        match sqlx::query(&sql).execute(&self.pool).await {
            Ok(_) => {
                debug!(schema = %schema, "Created schema");
                Ok(())
            },
            Err(e)
                if e.as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == DUPLICATE_SCHEMA) =>
            {
                Err(StoreError::SchemaExists(schema.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn create_table_like(
        &mut self,
        destination: &QualifiedTable,
        template: &QualifiedTable,
    ) -> StoreResult<TableShape> {
        let sql = format!("CREATE TABLE {} (LIKE {})", destination.quoted(), template.quoted());
        sqlx::query(&sql).execute(&self.pool).await?;

        let column_types: Vec<String> = sqlx::query_scalar(COLUMN_TYPES_SQL)
            .bind(destination.quoted())
            .fetch_all(&self.pool)
            .await?;

        debug!(
            table = %destination,
            template = %template,
            columns = column_types.len(),
            "Created destination table"
        );

        Ok(TableShape {
            table: destination.clone(),
            column_types,
        })
    }

    async fn begin(&mut self) -> StoreResult<()> {
        if self.tx.is_some() {
            return Err(StoreError::TransactionOpen);
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::NoTransaction)?;
        tx.commit().await?;
        Ok(())
    }

    async fn savepoint(&mut self) -> StoreResult<()> {
        self.execute_in_tx(&format!("SAVEPOINT {RECOVERY_SAVEPOINT}")).await
    }

    async fn release_savepoint(&mut self) -> StoreResult<()> {
        self.execute_in_tx(&format!("RELEASE SAVEPOINT {RECOVERY_SAVEPOINT}")).await
    }

    async fn rollback_to_savepoint(&mut self) -> StoreResult<()> {
        self.execute_in_tx(&format!("ROLLBACK TO SAVEPOINT {RECOVERY_SAVEPOINT}")).await
    }

    async fn insert(&mut self, shape: &TableShape, values: &[ColumnValue]) -> StoreResult<()> {
        let sql = shape.insert_sql(values.len());
        let tx = self.tx()?;

        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value.as_option());
        }
        query.execute(&mut **tx).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_types_drop_length_modifier() {
        assert!(COLUMN_TYPES_SQL.contains("format_type(a.atttypid, NULL)"));
        assert!(!COLUMN_TYPES_SQL.contains("atttypmod"));
    }
}
