//! Data validation utilities.
//!
//! Two kinds of RON data file are recognised: a match configuration
//! ([`MatchConfig`]) and a unit roster (a list of [`UnitStats`]). Each file
//! is parsed as either and then checked with the same rules the authority
//! applies before a match starts.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use skirmish_core::config::MatchConfig;
use skirmish_core::data::UnitStats;
use skirmish_core::error::{GameError, Result};

/// What a data file turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// A [`MatchConfig`].
    Match,
    /// A list of [`UnitStats`].
    Units,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Match => "match",
            Self::Units => "units",
        })
    }
}

/// Outcome for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File checked.
    pub path: PathBuf,
    /// Detected contents, if the file parsed as anything.
    pub kind: Option<DataKind>,
    /// First problem found.
    pub error: Option<String>,
}

impl FileReport {
    /// Whether the file passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome for a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// One entry per file, in path order.
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// Whether every file passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.files.iter().all(FileReport::is_valid)
    }

    /// Files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| !report.is_valid())
    }
}

/// Validate a RON source as match or unit data.
///
/// # Errors
///
/// Returns [`GameError::DataParseError`] if the text is neither kind, or
/// [`GameError::InvalidConfig`] if it parses but breaks a rule.
pub fn validate_source(source: &str, origin: &str) -> Result<DataKind> {
    if let Ok(config) = MatchConfig::from_ron_str(source) {
        config.validate()?;
        return Ok(DataKind::Match);
    }

    let units: Vec<UnitStats> = ron::from_str(source).map_err(|e| GameError::DataParseError {
        path: origin.to_string(),
        message: format!("not a match config or unit list: {e}"),
    })?;
    validate_units(&units)?;
    Ok(DataKind::Units)
}

/// Check a unit list: every entry valid, ids unique.
///
/// # Errors
///
/// Returns [`GameError::InvalidConfig`] for the first problem.
pub fn validate_units(units: &[UnitStats]) -> Result<()> {
    let mut seen = HashSet::new();
    for unit in units {
        unit.validate()?;
        if !seen.insert(unit.id.as_str()) {
            return Err(GameError::InvalidConfig(format!(
                "duplicate unit id '{}'",
                unit.id
            )));
        }
    }
    Ok(())
}

/// Validate one file.
#[must_use]
pub fn validate_file(path: &Path) -> FileReport {
    let origin = path.display().to_string();
    let result = std::fs::read_to_string(path)
        .map_err(|e| GameError::DataParseError {
            path: origin.clone(),
            message: e.to_string(),
        })
        .and_then(|source| validate_source(&source, &origin));

    match result {
        Ok(kind) => {
            tracing::debug!(path = %origin, %kind, "Valid");
            FileReport {
                path: path.to_path_buf(),
                kind: Some(kind),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(path = %origin, error = %e, "Invalid");
            FileReport {
                path: path.to_path_buf(),
                kind: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Validate all RON data files under a directory, or a single file.
///
/// # Errors
///
/// Returns an error if the path does not exist or a directory cannot be
/// read.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport> {
    if path.is_file() {
        return Ok(ValidationReport {
            files: vec![validate_file(path)],
        });
    }

    let mut files = Vec::new();
    collect_ron_files(path, &mut files)?;
    files.sort();
    tracing::info!(count = files.len(), path = %path.display(), "Validating data files");

    Ok(ValidationReport {
        files: files.iter().map(|file| validate_file(file)).collect(),
    })
}

fn collect_ron_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| GameError::DataParseError {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_ron_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ron") {
            out.push(path);
        }
    }
    Ok(())
}
