//! Per-file log of rejected records
//!
//! The file is created on the first rejection only, so a clean load leaves
//! nothing behind. Each entry is a free-text block meant for a person
//! reading it, not for reprocessing.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::plan::{FileTarget, StateCode};

/// A record the store refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub line_number: u64,
    /// The insert as a literal SQL statement
    pub statement: String,
    /// Store error detail, including the SQLSTATE
    pub error: String,
}

#[derive(Debug)]
pub struct ErrorSink {
    path: PathBuf,
    file: Option<File>,
    entries: u64,
}

impl ErrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            entries: 0,
        }
    }

    /// `<error_dir>/failed_<state>_<dataset>_<file>`
    pub fn for_target(error_dir: &Path, state: &StateCode, target: &FileTarget) -> Self {
        Self::new(error_dir.join(format!(
            "failed_{}_{}_{}",
            state, target.dataset, target.file
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rejections written through this sink
    pub fn entries(&self) -> u64 {
        self.entries
    }

    fn handle(&mut self) -> IngestResult<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| IngestError::io(&self.path, e))?;
                debug!(path = %self.path.display(), "Opened error log");
                file
            },
        };
        Ok(self.file.insert(file))
    }

    pub fn record(&mut self, rejected: &RejectedRecord) -> IngestResult<()> {
        let block = format!(
            "FAILED RECORD (line {}): {}\nERROR: {}\n\n",
            rejected.line_number, rejected.statement, rejected.error
        );

        let path = self.path.clone();
        self.handle()?
            .write_all(block.as_bytes())
            .map_err(|e| IngestError::io(path, e))?;
        self.entries += 1;
        Ok(())
    }
}
