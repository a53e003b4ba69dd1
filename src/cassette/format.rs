//! Durable cassette document: the on-disk record of one session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::request::Request;

/// A single recorded interaction: one request and the response it
/// produced.
///
/// The response is stored verbatim as produced by the live call; the
/// core never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// The canonical request that produced the response.
    pub request: Request,
    /// The opaque response payload.
    pub response: Value,
}

/// The serialized cassette document, human-diffable YAML on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name, derived from the file stem by default.
    pub name: String,
    /// When this cassette was first recorded.
    pub recorded_at: DateTime<Utc>,
    /// Ordered list of interactions, in recording order.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Creates an empty cassette stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), recorded_at: Utc::now(), interactions: Vec::new() }
    }

    /// Loads a cassette document from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&content)
            .map_err(|source| Error::CassetteFormat { path: path.to_path_buf(), source })
    }

    /// Writes the cassette document as YAML.
    ///
    /// The document is rendered in full before any bytes hit disk, so a
    /// value with no durable representation fails without a partial
    /// write. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|source| Error::CassetteFormat { path: path.to_path_buf(), source })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
            }
        }
        std::fs::write(path, yaml).map_err(|source| Error::Io { path: path.to_path_buf(), source })
    }
}

/// Appends the `.yaml` suffix to paths that do not already carry it.
///
/// Cassette files are named deterministically from a logical test
/// identifier; the suffix is enforced here so callers may pass either
/// form.
#[must_use]
pub fn ensure_suffix(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    if path.extension().is_some_and(|ext| ext == "yaml") {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".yaml");
        PathBuf::from(raw)
    }
}
