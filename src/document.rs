//! Typed model for a dataset's release-metadata document.
//!
//! One YAML file per knowledge graph holds the whole hierarchy
//! (dataset -> artifacts -> versions -> distributions) and is the single
//! source of truth. Saves always rewrite the complete snapshot; field
//! order in these structs is the authored key order, which keeps diffs
//! across automated runs minimal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or interrogating a metadata document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{context}: missing required `{field}`")]
    Missing {
        field: &'static str,
        context: String,
    },
}

/// Reachability status of one distribution.
///
/// `Pending` is only ever an initial state; reconciliation rewrites it to
/// `Active` or `Error` and never produces any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Active,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Error => "error",
        };
        f.write_str(label)
    }
}

/// A release identifier: a calendar date, first-of-month in the sources
/// observed so far.
///
/// Persisted documents carry either a bare YAML scalar (`2025-09-01`) or
/// the quoted string form; both parse to the same date and always
/// serialize back to the canonical `YYYY-MM-DD` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseDate(pub NaiveDate);

impl ReleaseDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(ReleaseDate)
    }

    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        use chrono::Datelike;
        self.0.month()
    }
}

impl fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for ReleaseDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReleaseDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|err| D::Error::custom(format!("invalid release date `{raw}`: {err}")))?;
        Ok(ReleaseDate(date))
    }
}

/// One downloadable file belonging to a version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    /// Source URL. Entries without one are tolerated and skipped by
    /// reconciliation rather than treated as fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// One dated release of an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub version: ReleaseDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub distributions: Vec<Distribution>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// A named family of releases within a dataset.
///
/// The version list is append-only: insertion order is chronological
/// release order, so the last element is always the most recent release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// Root record for one knowledge graph's metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Name of the environment variable holding this account's API key.
    #[serde(
        default,
        rename = "databus-account",
        skip_serializing_if = "Option::is_none"
    )]
    pub databus_account: Option<String>,
    /// Which built-in check procedure the daily driver should run.
    #[serde(
        default,
        rename = "check-new-release",
        skip_serializing_if = "Option::is_none"
    )]
    pub check: Option<String>,
    /// URL template for monthly release discovery, with `{year}` and
    /// `{month}` placeholders.
    #[serde(
        default,
        rename = "release-url-template",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_url_template: Option<String>,
    /// Set when a reconciliation pass activated at least one
    /// distribution; cleared only after a fully successful publish.
    #[serde(default, rename = "publish-requested")]
    pub publish_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Dataset {
    /// Load a document from disk.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| SchemaError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the complete document snapshot atomically.
    ///
    /// The serialized form lands in a sibling temp file first and is
    /// renamed into place, so a crash mid-write never leaves a partial
    /// document behind.
    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let io_err = |source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        };
        let rendered = serde_yaml::to_string(self).map_err(|source| SchemaError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, rendered).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }

    /// Most recent known release of the given artifact (last element of
    /// the append-only version list).
    pub fn latest_version(&self, artifact_index: usize) -> Result<&Version, SchemaError> {
        let artifact =
            self.artifacts
                .get(artifact_index)
                .ok_or_else(|| SchemaError::Missing {
                    field: "artifacts",
                    context: format!("dataset `{}`", self.id),
                })?;
        artifact.versions.last().ok_or_else(|| SchemaError::Missing {
            field: "versions",
            context: format!("artifact `{}`", artifact.id),
        })
    }
}
