//! In-memory [`LoadStore`] for tests
//!
//! Follows PostgreSQL transaction rules closely enough to catch protocol
//! mistakes: a rejected row aborts the transaction until the savepoint is
//! rolled back, only committed rows are visible, and a nested savepoint is
//! an error.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::{LoadStore, StoreError, StoreResult, TableShape};
use crate::encoder::ColumnValue;
use crate::plan::{Identifier, QualifiedTable};

/// Column types the double understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    /// Integer with a unique constraint
    Key,
    Text,
    /// `varchar(n)`: longer values are rejected, not truncated
    VarChar(usize),
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer | ColumnKind::Key => "integer",
            ColumnKind::Text => "text",
            ColumnKind::VarChar(_) => "character varying",
        }
    }

    fn from_sql_type(ty: &str) -> Self {
        if ty == "integer" {
            ColumnKind::Integer
        } else {
            ColumnKind::Text
        }
    }
}

type Row = Vec<Option<String>>;

fn fatal(message: impl Into<String>) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(message.into()))
}

fn rejected(code: &str, message: String) -> StoreError {
    StoreError::Rejected {
        code: code.to_string(),
        message,
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    schemas: HashSet<String>,
    templates: HashMap<String, Vec<ColumnKind>>,
    kinds: HashMap<String, Vec<ColumnKind>>,
    tables: HashMap<String, Vec<Row>>,
    pending: Vec<(String, Row)>,
    in_transaction: bool,
    aborted: bool,
    savepoint_mark: Option<usize>,
    commits: usize,
    inserts: usize,
    fail_insert_at: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template table `schema.table` with the given columns
    pub fn with_template(mut self, schema: &str, table: &str, columns: &[ColumnKind]) -> Self {
        self.templates.insert(format!("{schema}.{table}"), columns.to_vec());
        self
    }

    /// Pretend `schema` already exists
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schemas.insert(schema.to_string());
        self
    }

    /// Make the `n`th insert call (1-based) fail with a connection error
    pub fn fail_insert_at(mut self, n: usize) -> Self {
        self.fail_insert_at = Some(n);
        self
    }

    /// Committed rows of `schema.table`
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.contains(schema)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn ensure_usable(&self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        if self.aborted {
            return Err(fatal(
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }
        Ok(())
    }

    fn check_value(kind: ColumnKind, value: &ColumnValue) -> StoreResult<Option<String>> {
        let Some(text) = value.as_option() else {
            return Ok(None);
        };
        if text.contains('\0') {
            return Err(rejected(
                "22021",
                "invalid byte sequence for encoding \"UTF8\": 0x00".to_string(),
            ));
        }
        if let ColumnKind::VarChar(limit) = kind {
            if text.chars().count() > limit {
                return Err(rejected(
                    "22001",
                    format!("value too long for type character varying({limit})"),
                ));
            }
        }
        if matches!(kind, ColumnKind::Integer | ColumnKind::Key) && text.parse::<i32>().is_err() {
            return Err(rejected(
                "22P02",
                format!("invalid input syntax for type integer: \"{text}\""),
            ));
        }
        Ok(Some(text.to_string()))
    }

    fn check_unique(&self, table: &str, kinds: &[ColumnKind], row: &Row) -> StoreResult<()> {
        let committed = self.tables.get(table).into_iter().flatten();
        let pending = self
            .pending
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, r)| r);
        let existing: Vec<&Row> = committed.chain(pending).collect();

        for (i, kind) in kinds.iter().enumerate() {
            let Some(Some(value)) = row.get(i) else {
                continue;
            };
            if *kind == ColumnKind::Key && existing.iter().any(|r| r.get(i) == Some(&Some(value.clone()))) {
                return Err(rejected(
                    "23505",
                    format!("duplicate key value violates unique constraint: ({value}) already exists"),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LoadStore for MemoryStore {
    async fn create_schema(&mut self, schema: &Identifier) -> StoreResult<()> {
        if !self.schemas.insert(schema.to_string()) {
            return Err(StoreError::SchemaExists(schema.to_string()));
        }
        Ok(())
    }

    async fn create_table_like(
        &mut self,
        destination: &QualifiedTable,
        template: &QualifiedTable,
    ) -> StoreResult<TableShape> {
        if !self.schemas.contains(destination.schema.as_str()) {
            return Err(fatal(format!("schema \"{}\" does not exist", destination.schema)));
        }
        let columns = self
            .templates
            .get(&template.to_string())
            .ok_or_else(|| fatal(format!("relation \"{template}\" does not exist")))?;
        if self.tables.contains_key(&destination.to_string()) {
            return Err(fatal(format!("relation \"{destination}\" already exists")));
        }

        let shape = TableShape {
            table: destination.clone(),
            column_types: columns.iter().map(|c| c.sql_type().to_string()).collect(),
        };
        self.kinds.insert(destination.to_string(), columns.clone());
        self.tables.insert(destination.to_string(), Vec::new());
        Ok(shape)
    }

    async fn begin(&mut self) -> StoreResult<()> {
        if self.in_transaction {
            return Err(StoreError::TransactionOpen);
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_usable()?;
        if self.savepoint_mark.is_some() {
            return Err(fatal("commit with an unreleased savepoint"));
        }
        for (table, row) in self.pending.drain(..) {
            self.tables.entry(table).or_default().push(row);
        }
        self.in_transaction = false;
        self.commits += 1;
        Ok(())
    }

    async fn savepoint(&mut self) -> StoreResult<()> {
        self.ensure_usable()?;
        if self.savepoint_mark.is_some() {
            return Err(fatal("savepoint depth would exceed one"));
        }
        self.savepoint_mark = Some(self.pending.len());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> StoreResult<()> {
        self.ensure_usable()?;
        self.savepoint_mark
            .take()
            .map(|_| ())
            .ok_or_else(|| fatal("savepoint \"recovery\" does not exist"))
    }

    async fn rollback_to_savepoint(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        let mark = self
            .savepoint_mark
            .ok_or_else(|| fatal("savepoint \"recovery\" does not exist"))?;
        self.pending.truncate(mark);
        self.aborted = false;
        Ok(())
    }

    async fn insert(&mut self, shape: &TableShape, values: &[ColumnValue]) -> StoreResult<()> {
        self.ensure_usable()?;
        self.inserts += 1;

        if self.fail_insert_at == Some(self.inserts) {
            return Err(fatal("connection reset by peer"));
        }
        if values.len() > shape.column_types.len() {
            self.aborted = true;
            return Err(fatal("INSERT has more expressions than target columns"));
        }

        let table = shape.table.to_string();
        let kinds = self.kinds.get(&table).cloned().unwrap_or_else(|| {
            shape
                .column_types
                .iter()
                .map(|ty| ColumnKind::from_sql_type(ty))
                .collect()
        });

        let mut row = Vec::with_capacity(kinds.len());
        for (kind, value) in kinds.iter().zip(values) {
            match Self::check_value(*kind, value) {
                Ok(cell) => row.push(cell),
                Err(e) => {
                    self.aborted = true;
                    return Err(e);
                },
            }
        }
        row.resize(kinds.len(), None);

        if let Err(e) = self.check_unique(&table, &kinds, &row) {
            self.aborted = true;
            return Err(e);
        }

        self.pending.push((table, row));
        Ok(())
    }
}
