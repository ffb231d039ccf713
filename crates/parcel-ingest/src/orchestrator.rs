//! Load orchestrator
//!
//! Drives one state job end to end:
//!
//! 1. Provision one destination schema per dataset
//! 2. For each dataset, for each file in dependency order:
//!    create the destination table from its template, stream the file
//!    through parse, encode and insert, commit in batches, then append a
//!    manifest entry
//! 3. Report per-file outcomes
//!
//! Any error other than a per-record rejection stops the run. The file in
//! flight gets no manifest entry.

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{error, info, info_span, Instrument};

use crate::config::IngestConfig;
use crate::encoder::encode_tokens;
use crate::error::{IngestError, IngestResult};
use crate::error_sink::ErrorSink;
use crate::inserter::{insert_record, RecordOutcome};
use crate::manifest::{format_rate, CompletionManifest, ManifestEntry};
use crate::parser::RecordReader;
use crate::plan::{FileTarget, StateJob};
use crate::progress::{BatchCommitter, LoadProgress};
use crate::store::{LoadStore, TableShape};

/// Result of loading one file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Dataset-qualified name, e.g. `ZTrans/Main.txt`
    pub label: String,
    pub destination: String,
    pub progress: LoadProgress,
    /// Set when at least one record was rejected
    pub error_log: Option<PathBuf>,
}

impl FileOutcome {
    pub fn success_rate(&self) -> f64 {
        self.progress.success_rate()
    }
}

/// Summary of a finished state job
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub state: String,
    pub files: Vec<FileOutcome>,
}

impl LoadReport {
    pub fn total_records(&self) -> u64 {
        self.files.iter().map(|f| f.progress.tracker).sum()
    }

    pub fn total_inserted(&self) -> u64 {
        self.files.iter().map(|f| f.progress.progress).sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_records() - self.total_inserted()
    }
}

pub struct LoadOrchestrator<S> {
    store: S,
    job: StateJob,
    manifest: CompletionManifest,
    error_dir: PathBuf,
    committer: BatchCommitter,
    show_progress: bool,
}

impl<S: LoadStore> LoadOrchestrator<S> {
    /// Creates the manifest and error directories if they are missing.
    pub fn new(store: S, job: StateJob, config: &IngestConfig) -> IngestResult<Self> {
        for dir in [&config.paths.manifest_dir, &config.paths.error_dir] {
            std::fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;
        }

        Ok(Self {
            manifest: CompletionManifest::for_state(&config.paths.manifest_dir, &job.state),
            error_dir: config.paths.error_dir.clone(),
            committer: BatchCommitter::new(config.load.commit_interval),
            show_progress: config.load.show_progress,
            store,
            job,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn manifest(&self) -> &CompletionManifest {
        &self.manifest
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub async fn run(&mut self) -> IngestResult<LoadReport> {
        let state = self.job.state.to_string();
        info!(state = %state, "Starting load for state {}", state);

        info!("Phase 1: Provisioning schemas");
        self.provision().await?;

        info!("Phase 2: Loading files");
        let mut report = LoadReport {
            state: state.clone(),
            files: Vec::new(),
        };

        for dataset in self.job.datasets.clone() {
            for target in self.job.targets(&dataset)? {
                let span = info_span!("file", state = %state, dataset = %target.dataset, file = %target.file);
                let outcome = self.load_target(&target).instrument(span).await;

                match outcome {
                    Ok(outcome) => report.files.push(outcome),
                    Err(e) => {
                        error!(
                            state = %state,
                            file = %target.label(),
                            error = %e,
                            "Load failed, stopping"
                        );
                        return Err(e);
                    },
                }
            }
        }

        info!(
            state = %state,
            files = report.files.len(),
            records = report.total_records(),
            inserted = report.total_inserted(),
            rejected = report.total_rejected(),
            "Load finished"
        );
        Ok(report)
    }

    async fn provision(&mut self) -> IngestResult<()> {
        for dataset in &self.job.datasets {
            let schema = self.job.schema_for(dataset)?;
            self.store.create_schema(&schema).await?;
            info!(schema = %schema, dataset = %dataset.name, "Created schema");
        }
        Ok(())
    }

    async fn load_target(&mut self, target: &FileTarget) -> IngestResult<FileOutcome> {
        let shape = self
            .store
            .create_table_like(&target.destination, &target.template)
            .await?;
        info!(
            table = %shape.table,
            template = %target.template,
            columns = shape.column_types.len(),
            "Created table"
        );

        let mut sink = ErrorSink::for_target(&self.error_dir, &self.job.state, target);
        let progress = self.load_file(target, &shape, &mut sink).await?;

        let entry = ManifestEntry {
            file: target.label(),
            state: self.job.state.to_string(),
            success_rate: progress.success_rate(),
        };
        self.manifest.append(&entry)?;

        info!(
            tracker = progress.tracker,
            inserted = progress.progress,
            rejected = progress.failed(),
            success_rate = %format_rate(entry.success_rate),
            "File finished"
        );

        Ok(FileOutcome {
            label: target.label(),
            destination: target.destination.to_string(),
            progress,
            error_log: (sink.entries() > 0).then(|| sink.path().to_path_buf()),
        })
    }

    /// Stream one file into `shape` inside batch transactions.
    pub async fn load_file(
        &mut self,
        target: &FileTarget,
        shape: &TableShape,
        sink: &mut ErrorSink,
    ) -> IngestResult<LoadProgress> {
        let file = File::open(&target.path)
            .await
            .map_err(|e| IngestError::io(&target.path, e))?;
        let mut reader = RecordReader::new(BufReader::new(file));
        let spinner = self.spinner(&target.label());

        let mut progress = LoadProgress::default();
        self.store.begin().await?;

        while let Some(record) = reader
            .next_record()
            .await
            .map_err(|e| IngestError::io(&target.path, e))?
        {
            let values = encode_tokens(record.tokens());
            let outcome = insert_record(
                &mut self.store,
                shape,
                record.line_number,
                &values,
                sink,
                &mut progress,
            )
            .await?;

            if outcome == RecordOutcome::Inserted {
                self.committer.after_success(&mut self.store, &progress).await?;
            }
            spinner.inc(1);
        }

        self.committer.finish(&mut self.store).await?;
        spinner.finish_and_clear();
        Ok(progress)
    }

    fn spinner(&self, label: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} records")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
