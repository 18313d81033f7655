//! Version append policy.
//!
//! Discovery may return a release the document already records, so the
//! append decision is the strict-ordering check here: only a candidate
//! dated after the latest known version produces a new entry, and a
//! given candidate is appended at most once.

use crate::discover::Discovered;
use crate::document::{Dataset, Distribution, SchemaError, Status, Version};

/// Provenance marker carried by every auto-generated version entry.
pub const PROVENANCE_MARKER: &str = "This version and its metadata have been \
**automatically retrieved and published** by an automated update process.";

/// How a new version entry is constructed.
#[derive(Debug, Clone)]
pub struct AppendOptions {
    /// Artifact the policy targets; the first artifact unless a caller
    /// says otherwise.
    pub artifact_index: usize,
    pub title: String,
    pub description: String,
    pub format: Option<String>,
    pub compression: Option<String>,
    /// Pre-computed content hash; hashing is a whole-file download and
    /// is never performed implicitly here.
    pub sha256: Option<String>,
}

impl Default for AppendOptions {
    fn default() -> Self {
        AppendOptions {
            artifact_index: 0,
            title: "Monthly Snapshot".to_string(),
            description: String::new(),
            format: None,
            compression: None,
            sha256: None,
        }
    }
}

fn build_version(dataset: &Dataset, discovered: &Discovered, options: &AppendOptions) -> Version {
    let description = if options.description.is_empty() {
        PROVENANCE_MARKER.to_string()
    } else {
        format!("{}\n\n{}", options.description, PROVENANCE_MARKER)
    };
    Version {
        version: discovered.date,
        title: Some(options.title.clone()),
        description: Some(description),
        license: dataset.license.clone(),
        distributions: vec![Distribution {
            file: Some(discovered.url.clone()),
            format: options.format.clone(),
            compression: options.compression.clone(),
            size: discovered.size,
            sha256: options.sha256.clone(),
            status: Status::Pending,
            last_verified: None,
            extra: serde_yaml::Mapping::new(),
        }],
        extra: serde_yaml::Mapping::new(),
    }
}

/// Append a new version entry if the discovered release is strictly
/// newer than the latest known one. Returns whether an append happened.
pub fn maybe_append(
    dataset: &mut Dataset,
    discovered: &Discovered,
    options: &AppendOptions,
) -> Result<bool, SchemaError> {
    let latest = dataset.latest_version(options.artifact_index)?.version;
    if discovered.date <= latest {
        tracing::debug!(
            candidate = %discovered.date,
            latest = %latest,
            "candidate is not newer; no append"
        );
        return Ok(false);
    }

    let entry = build_version(dataset, discovered, options);
    tracing::info!(version = %discovered.date, url = %discovered.url, "appending new release");
    dataset.artifacts[options.artifact_index].versions.push(entry);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ReleaseDate;

    const DOC: &str = "\
id: dblp
license: https://creativecommons.org/publicdomain/zero/1.0/
artifacts:
- id: rdf
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/dblp-2025-09-01.nt.gz
      status: active
";

    fn discovered(date: ReleaseDate) -> Discovered {
        Discovered {
            date,
            url: format!("https://example.org/dblp-{date}.nt.gz"),
            size: Some(1024),
        }
    }

    #[test]
    fn appends_strictly_newer_candidate() {
        let mut doc: Dataset = serde_yaml::from_str(DOC).unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 10, 1).unwrap());

        let appended = maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap();

        assert!(appended);
        let versions = &doc.artifacts[0].versions;
        assert_eq!(versions.len(), 2);
        let new = versions.last().unwrap();
        assert_eq!(new.version.to_string(), "2025-10-01");
        assert_eq!(new.license, doc.license);
        assert_eq!(new.distributions[0].status, Status::Pending);
        assert_eq!(new.distributions[0].size, Some(1024));
        assert!(new.description.as_deref().unwrap().contains("automatically retrieved"));
    }

    #[test]
    fn equal_candidate_is_a_no_op() {
        let mut doc: Dataset = serde_yaml::from_str(DOC).unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 9, 1).unwrap());

        let appended = maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap();

        assert!(!appended);
        assert_eq!(doc.artifacts[0].versions.len(), 1);
    }

    #[test]
    fn older_candidate_is_a_no_op() {
        let mut doc: Dataset = serde_yaml::from_str(DOC).unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 8, 1).unwrap());

        assert!(!maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap());
    }

    #[test]
    fn same_candidate_appends_at_most_once() {
        let mut doc: Dataset = serde_yaml::from_str(DOC).unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 10, 1).unwrap());

        assert!(maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap());
        assert!(!maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap());
        assert_eq!(doc.artifacts[0].versions.len(), 2);
    }

    #[test]
    fn hash_is_attached_only_when_provided() {
        let mut doc: Dataset = serde_yaml::from_str(DOC).unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 10, 1).unwrap());
        let options = AppendOptions {
            sha256: Some("ab".repeat(32)),
            ..AppendOptions::default()
        };

        maybe_append(&mut doc, &candidate, &options).unwrap();

        let new = doc.artifacts[0].versions.last().unwrap();
        assert_eq!(new.distributions[0].sha256.as_deref(), Some("ab".repeat(32).as_str()));
    }

    #[test]
    fn missing_versions_is_a_schema_error() {
        let mut doc: Dataset = serde_yaml::from_str("id: x\nartifacts:\n- id: a\n").unwrap();
        let candidate = discovered(ReleaseDate::from_ymd(2025, 10, 1).unwrap());

        let err = maybe_append(&mut doc, &candidate, &AppendOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaError::Missing { field: "versions", .. }));
    }
}
