//! Parcel Ingest Library
//!
//! Bulk loader for pipe-delimited ZAsmt and ZTrans extracts, one state at a
//! time, into PostgreSQL.
//!
//! Each record is inserted under its own savepoint, so a row the database
//! refuses is logged and skipped while the batch transaction carries on.
//! Batches are committed every `commit_interval` inserted rows and once more
//! at end of file. A completion manifest records every finished file with
//! its success rate.
//!
//! # Example
//!
//! ```no_run
//! use parcel_ingest::{
//!     default_datasets, IngestConfig, LoadOrchestrator, PgLoadStore, StateCode, StateJob,
//! };
//!
//! # async fn run() -> parcel_ingest::IngestResult<()> {
//! let config = IngestConfig::load()?;
//! let state = StateCode::parse("06")?;
//! let job = StateJob::new(state, default_datasets(), &config.paths.data_root)?;
//! let store = PgLoadStore::connect(&config.database).await?;
//!
//! let report = LoadOrchestrator::new(store, job, &config)?.run().await?;
//! println!("{} records inserted", report.total_inserted());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod encoder;
pub mod error;
pub mod error_sink;
pub mod inserter;
pub mod manifest;
pub mod orchestrator;
pub mod parser;
pub mod plan;
pub mod progress;
pub mod store;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use orchestrator::{FileOutcome, LoadOrchestrator, LoadReport};
pub use plan::{default_datasets, select_datasets, Dataset, StateCode, StateJob};
pub use store::{LoadStore, PgLoadStore, StoreError};

#[cfg(any(test, feature = "test-util"))]
pub use store::MemoryStore;
