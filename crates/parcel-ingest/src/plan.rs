//! Load plan: state codes, datasets, and the schema/table names derived
//! from them.
//!
//! Identifiers here end up inside DDL and `INSERT` statements, where bind
//! parameters are not allowed. Every name therefore passes through
//! [`Identifier::new`], which accepts only lowercase SQL-safe names, and is
//! always emitted double-quoted.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{IngestError, IngestResult};

/// Prefix of the per-state destination schemas (`newzasmt06`)
pub const SCHEMA_PREFIX: &str = "new";

/// Prefix of destination tables inside a state schema (`utmain`)
pub const TABLE_PREFIX: &str = "ut";

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1)
const MAX_IDENTIFIER_LEN: usize = 63;

#[allow(clippy::expect_used)]
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern is valid"));

/// A validated, unquoted SQL identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> IngestResult<Self> {
        let name = name.into();
        if name.len() > MAX_IDENTIFIER_LEN || !IDENTIFIER_RE.is_match(&name) {
            return Err(IngestError::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier wrapped in double quotes, ready for SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `schema.table`, both parts validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    pub schema: Identifier,
    pub table: Identifier,
}

impl QualifiedTable {
    pub fn new(schema: Identifier, table: Identifier) -> Self {
        Self { schema, table }
    }

    pub fn quoted(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Two-character state code selecting one subtree of the input data
///
/// Codes are kept exactly as given (they name a directory) and lowercased
/// when used inside a schema name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCode(String);

impl StateCode {
    pub fn parse(raw: &str) -> IngestResult<Self> {
        let raw = raw.trim();
        if raw.len() == 2 && raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(IngestError::InvalidStateCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One source category and its input files in dependency order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Directory name under the state directory, e.g. `ZAsmt`
    pub name: String,
    /// File names, parents first (`Main.txt` before the files keyed on it)
    pub files: Vec<String>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, files: &[&str]) -> Self {
        Self {
            name: name.into(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Schema holding the empty template tables for this dataset (`zasmt`)
    pub fn template_schema(&self) -> IngestResult<Identifier> {
        Identifier::new(self.name.to_lowercase())
    }
}

/// The assessment and transaction datasets, in load order
pub fn default_datasets() -> Vec<Dataset> {
    vec![
        Dataset::new("ZAsmt", &["Main.txt", "Building.txt", "BuildingAreas.txt"]),
        Dataset::new("ZTrans", &["Main.txt", "PropertyInfo.txt"]),
    ]
}

/// Keep only the datasets named in `names` (case-insensitive), preserving
/// the declared order of `datasets`.
pub fn select_datasets(datasets: Vec<Dataset>, names: &[String]) -> IngestResult<Vec<Dataset>> {
    if let Some(unknown) = names
        .iter()
        .find(|n| !datasets.iter().any(|d| d.name.eq_ignore_ascii_case(n)))
    {
        return Err(IngestError::UnknownDataset(unknown.clone()));
    }

    Ok(datasets
        .into_iter()
        .filter(|d| names.iter().any(|n| d.name.eq_ignore_ascii_case(n)))
        .collect())
}

/// Everything one file load needs to know about where rows come from and go
#[derive(Debug, Clone)]
pub struct FileTarget {
    pub dataset: String,
    pub file: String,
    pub path: PathBuf,
    pub template: QualifiedTable,
    pub destination: QualifiedTable,
}

impl FileTarget {
    /// `ZAsmt/Main.txt`
    pub fn label(&self) -> String {
        format!("{}/{}", self.dataset, self.file)
    }
}

/// Table stem of an input file: `BuildingAreas.txt` -> `buildingareas`
fn table_stem(file: &str) -> String {
    let stem = file.strip_suffix(".txt").unwrap_or(file);
    stem.to_lowercase()
}

/// One run: a state code and the datasets to load for it
#[derive(Debug, Clone)]
pub struct StateJob {
    pub state: StateCode,
    pub datasets: Vec<Dataset>,
    pub state_dir: PathBuf,
}

impl StateJob {
    /// Build the job, failing with [`IngestError::UnknownState`] when the
    /// data root has no directory for `state`.
    pub fn new(state: StateCode, datasets: Vec<Dataset>, data_root: &Path) -> IngestResult<Self> {
        let state_dir = data_root.join(state.as_str());
        if !state_dir.is_dir() {
            return Err(IngestError::UnknownState {
                state: state.to_string(),
                path: state_dir,
            });
        }

        Ok(Self {
            state,
            datasets,
            state_dir,
        })
    }

    /// Destination schema for a dataset, e.g. `newzasmt06`
    pub fn schema_for(&self, dataset: &Dataset) -> IngestResult<Identifier> {
        Identifier::new(format!(
            "{}{}{}",
            SCHEMA_PREFIX,
            dataset.name.to_lowercase(),
            self.state.as_str().to_lowercase()
        ))
    }

    /// Resolve every file of `dataset` into a [`FileTarget`], in order
    pub fn targets(&self, dataset: &Dataset) -> IngestResult<Vec<FileTarget>> {
        let schema = self.schema_for(dataset)?;
        let template_schema = dataset.template_schema()?;

        dataset
            .files
            .iter()
            .map(|file| {
                let stem = table_stem(file);
                Ok(FileTarget {
                    dataset: dataset.name.clone(),
                    file: file.clone(),
                    path: self.state_dir.join(&dataset.name).join(file),
                    template: QualifiedTable::new(template_schema.clone(), Identifier::new(&stem)?),
                    destination: QualifiedTable::new(
                        schema.clone(),
                        Identifier::new(format!("{TABLE_PREFIX}{stem}"))?,
                    ),
                })
            })
            .collect()
    }
}
