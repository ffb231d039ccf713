//! Completion manifest
//!
//! One append-only text file per state, one line per fully processed file.
//! Operators read it to see how far a state got; the loader itself never
//! consults it.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, IngestResult};
use crate::plan::StateCode;

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Dataset-qualified file name, e.g. `ZAsmt/Main.txt`
    pub file: String,
    pub state: String,
    pub success_rate: f64,
}

/// Whole percentages print bare (`100`); anything else to two places, or
/// more when two places would round to `0` or `100`.
pub fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        return format!("{rate:.0}");
    }

    let mut text = format!("{rate:.2}");
    for precision in 3..=12 {
        let shown: f64 = text.parse().unwrap_or(rate);
        if shown != 0.0 && shown != 100.0 {
            break;
        }
        text = format!("{rate:.precision$}");
    }
    text
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File finished: {}\t\tState Code: {}\tSuccess rate:{}%",
            self.file,
            self.state,
            format_rate(self.success_rate)
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompletionManifest {
    path: PathBuf,
}

impl CompletionManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<manifest_dir>/completed_<state>.txt`
    pub fn for_state(manifest_dir: &Path, state: &StateCode) -> Self {
        Self::new(manifest_dir.join(format!("completed_{state}.txt")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. The file is opened and closed per call.
    pub fn append(&self, entry: &ManifestEntry) -> IngestResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IngestError::io(&self.path, e))?;

        writeln!(file, "{entry}").map_err(|e| IngestError::io(&self.path, e))
    }
}
