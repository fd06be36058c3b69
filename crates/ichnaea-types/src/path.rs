//! Dataset path validation.
//!
//! A dataset path names one tracked file inside a dataset root. It is always
//! relative and always uses `/` as separator, so it maps onto the working
//! tree and onto history keys the same way on every platform.
//!
//! Valid paths:
//! - Must be non-empty and at most 255 bytes
//! - Must not start or end with `/`
//! - Must not contain `\`, NUL, CR or LF
//! - Components between slashes must be non-empty and must not be `.` or `..`
//! - Components must not start with `.` (reserved for repository internals)

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const MAX_PATH_LEN: usize = 255;

/// Characters that are forbidden anywhere in a dataset path.
const FORBIDDEN_CHARS: &[char] = &['\\', '\0', '\n', '\r'];

/// Validated relative path of a tracked dataset file (e.g. `"climate/t.csv"`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetPath(String);

impl DatasetPath {
    /// Validate and wrap a path.
    ///
    /// ```
    /// use ichnaea_types::DatasetPath;
    ///
    /// assert!(DatasetPath::new("t.csv").is_ok());
    /// assert!(DatasetPath::new("climate/2023.xml").is_ok());
    /// assert!(DatasetPath::new("../escape.csv").is_err());
    /// assert!(DatasetPath::new("/abs.csv").is_err());
    /// ```
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        validate(&path)?;
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final component (file name).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// Platform path relative to some root directory.
    pub fn to_relative_path(&self) -> PathBuf {
        self.0.split('/').collect()
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn validate(path: &str) -> Result<(), TypeError> {
    if path.is_empty() {
        return Err(invalid(path, "path must not be empty"));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(invalid(path, format!("path exceeds {MAX_PATH_LEN} bytes")));
    }
    for ch in FORBIDDEN_CHARS {
        if path.contains(*ch) {
            return Err(invalid(path, format!("contains forbidden character: {ch:?}")));
        }
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(invalid(path, "must not start or end with '/'"));
    }
    for component in path.split('/') {
        if component.is_empty() {
            return Err(invalid(path, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                path,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    Ok(())
}

impl TryFrom<String> for DatasetPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetPath> for String {
    fn from(path: DatasetPath) -> Self {
        path.0
    }
}

impl fmt::Debug for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatasetPath({:?})", self.0)
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
