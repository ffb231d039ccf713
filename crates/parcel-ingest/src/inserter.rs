//! Savepoint-guarded insert of a single record
//!
//! Every record runs inside its own savepoint so a row-level rejection only
//! undoes that row; the enclosing batch transaction stays usable.

use tracing::{debug, warn};

use crate::encoder::{render_values, ColumnValue};
use crate::error::IngestResult;
use crate::error_sink::{ErrorSink, RejectedRecord};
use crate::progress::LoadProgress;
use crate::store::{LoadStore, StoreError, TableShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Rejected,
}

/// Literal form of the insert, as written to the error log
pub fn attempted_statement(shape: &TableShape, values: &[ColumnValue]) -> String {
    format!(
        "INSERT INTO {} VALUES ({})",
        shape.table.quoted(),
        render_values(values)
    )
}

/// Insert one record under the recovery savepoint.
///
/// A rejection is written to `sink` and counted as a failure. Anything else
/// the store reports is returned as an error and ends the load.
pub async fn insert_record<S: LoadStore + ?Sized>(
    store: &mut S,
    shape: &TableShape,
    line_number: u64,
    values: &[ColumnValue],
    sink: &mut ErrorSink,
    progress: &mut LoadProgress,
) -> IngestResult<RecordOutcome> {
    store.savepoint().await?;

    match store.insert(shape, values).await {
        Ok(()) => {
            store.release_savepoint().await?;
            progress.record_success();
            Ok(RecordOutcome::Inserted)
        },
        Err(e @ StoreError::Rejected { .. }) => {
            progress.record_failure();
            store.rollback_to_savepoint().await?;

            warn!(
                table = %shape.table,
                line = line_number,
                error = %e,
                "Record rejected"
            );
            sink.record(&RejectedRecord {
                line_number,
                statement: attempted_statement(shape, values),
                error: e.to_string(),
            })?;

            store.release_savepoint().await?;
            debug!(tracker = progress.tracker, progress = progress.progress, "Recovered");
            Ok(RecordOutcome::Rejected)
        },
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoder::encode_tokens;
    use crate::error::IngestError;
    use crate::parser::parse_line;
    use crate::plan::{Identifier, QualifiedTable};
    use crate::store::{ColumnKind, MemoryStore};

    async fn setup() -> (MemoryStore, TableShape) {
        let mut store = MemoryStore::new().with_template(
            "ztrans",
            "main",
            &[ColumnKind::Integer, ColumnKind::Text, ColumnKind::Text],
        );
        let schema = Identifier::new("newztrans06").unwrap();
        store.create_schema(&schema).await.unwrap();
        let shape = store
            .create_table_like(
                &QualifiedTable::new(schema, Identifier::new("utmain").unwrap()),
                &QualifiedTable::new(
                    Identifier::new("ztrans").unwrap(),
                    Identifier::new("main").unwrap(),
                ),
            )
            .await
            .unwrap();
        store.begin().await.unwrap();
        (store, shape)
    }

    fn values(line: &str) -> Vec<ColumnValue> {
        encode_tokens(parse_line(line))
    }

    #[test]
    fn test_attempted_statement() {
        let shape = TableShape {
            table: QualifiedTable::new(
                Identifier::new("newztrans06").unwrap(),
                Identifier::new("utmain").unwrap(),
            ),
            column_types: vec!["integer".into(), "text".into(), "text".into()],
        };
        assert_eq!(
            attempted_statement(&shape, &values("2|bad|c")),
            "INSERT INTO \"newztrans06\".\"utmain\" VALUES ('2','bad','c')"
        );
    }

    #[tokio::test]
    async fn test_transaction_usable_after_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, shape) = setup().await;
        let mut sink = ErrorSink::new(dir.path().join("failed"));
        let mut progress = LoadProgress::default();

        let lines = ["1|a|b", "x|a|b", "3|c|d"];
        let mut outcomes = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            outcomes.push(
                insert_record(
                    &mut store,
                    &shape,
                    i as u64 + 1,
                    &values(line),
                    &mut sink,
                    &mut progress,
                )
                .await
                .unwrap(),
            );
        }
        store.commit().await.unwrap();

        assert_eq!(
            outcomes,
            vec![RecordOutcome::Inserted, RecordOutcome::Rejected, RecordOutcome::Inserted]
        );
        assert_eq!(progress, LoadProgress { tracker: 3, progress: 2 });
        assert_eq!(store.rows("newztrans06.utmain").len(), 2);
        assert_eq!(sink.entries(), 1);

        let log = std::fs::read_to_string(sink.path()).unwrap();
        assert!(log.contains("line 2"));
        assert!(log.contains("VALUES ('x','a','b')"));
        assert!(log.contains("22P02"));
    }

    #[tokio::test]
    async fn test_clean_insert_leaves_no_log() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, shape) = setup().await;
        let mut sink = ErrorSink::new(dir.path().join("failed"));
        let mut progress = LoadProgress::default();

        insert_record(&mut store, &shape, 1, &values("1||"), &mut sink, &mut progress)
            .await
            .unwrap();
        store.commit().await.unwrap();

        assert!(!sink.path().exists());
        assert_eq!(
            store.rows("newztrans06.utmain"),
            vec![vec![Some("1".to_string()), None, None]]
        );
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, shape) = setup().await;
        let mut sink = ErrorSink::new(dir.path().join("failed"));
        let mut progress = LoadProgress::default();

        let err = insert_record(&mut store, &shape, 1, &values("1|a|b|extra"), &mut sink, &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Store(StoreError::Database(_))));
        assert_eq!(progress.tracker, 0);
        assert!(!sink.path().exists());
    }
}
