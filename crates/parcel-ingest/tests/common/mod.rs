//! Shared fixtures for load tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use parcel_ingest::store::{ColumnKind, MemoryStore};
use parcel_ingest::{
    default_datasets, select_datasets, IngestConfig, LoadOrchestrator, StateCode, StateJob,
};
use tempfile::TempDir;

pub const STATE: &str = "06";

/// A temporary data root plus manifest and error directories
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stores").join(STATE)).unwrap();
        Self { dir }
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("stores")
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.dir.path().join("store_records")
    }

    pub fn error_dir(&self) -> PathBuf {
        self.dir.path().join("error_records")
    }

    /// Write `<root>/<state>/<dataset>/<file>`
    pub fn write_file(&self, dataset: &str, file: &str, content: &[u8]) {
        let dir = self.data_root().join(STATE).join(dataset);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    pub fn config(&self, commit_interval: u64) -> IngestConfig {
        IngestConfig::default()
            .with_data_root(self.data_root())
            .with_manifest_dir(self.manifest_dir())
            .with_error_dir(self.error_dir())
            .with_commit_interval(commit_interval)
            .with_progress(false)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_dir().join(format!("completed_{STATE}.txt"))
    }

    pub fn manifest_lines(&self) -> Vec<String> {
        read_lines(&self.manifest_path())
    }

    pub fn error_log(&self, dataset: &str, file: &str) -> PathBuf {
        self.error_dir()
            .join(format!("failed_{STATE}_{dataset}_{file}"))
    }

    pub fn orchestrator(
        &self,
        store: MemoryStore,
        datasets: &[&str],
        commit_interval: u64,
    ) -> LoadOrchestrator<MemoryStore> {
        let config = self.config(commit_interval);
        let names: Vec<String> = datasets.iter().map(|d| d.to_string()).collect();
        let datasets = select_datasets(default_datasets(), &names).unwrap();
        let job =
            StateJob::new(StateCode::parse(STATE).unwrap(), datasets, &config.paths.data_root)
                .unwrap();
        LoadOrchestrator::new(store, job, &config).unwrap()
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Templates for every ZTrans file: a keyed id plus two text columns
pub fn ztrans_store() -> MemoryStore {
    let columns = [ColumnKind::Key, ColumnKind::Text, ColumnKind::Text];
    MemoryStore::new()
        .with_template("ztrans", "main", &columns)
        .with_template("ztrans", "propertyinfo", &columns)
}

/// ZTrans templates typed `integer, varchar(1), text`
pub fn ztrans_typed_store() -> MemoryStore {
    let columns = [ColumnKind::Integer, ColumnKind::VarChar(1), ColumnKind::Text];
    MemoryStore::new()
        .with_template("ztrans", "main", &columns)
        .with_template("ztrans", "propertyinfo", &columns)
}

/// Templates for every ZAsmt file
pub fn zasmt_store(store: MemoryStore) -> MemoryStore {
    let columns = [ColumnKind::Integer, ColumnKind::Text];
    store
        .with_template("zasmt", "main", &columns)
        .with_template("zasmt", "building", &columns)
        .with_template("zasmt", "buildingareas", &columns)
}
