//! Per-document pipelines behind the CLI subcommands.
//!
//! Each pipeline loads one document, runs the relevant core operations,
//! and persists a complete snapshot only when something changed. Probe
//! failures are absorbed into statuses by the core; only schema,
//! credential, and publish errors surface here as fatal.

use crate::append::{maybe_append, AppendOptions};
use crate::discover::{discover_next, ReleaseUrlTemplate};
use crate::document::Dataset;
use crate::probe::{HttpProber, Prober};
use crate::publish::{credentials_for, update_publish_flag, PublishClient};
use crate::reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::Path;

/// What one check pass did.
#[derive(Debug, Clone, Copy)]
pub struct CheckSummary {
    pub outcome: ReconcileOutcome,
    pub saved: bool,
}

/// What one discovery pass did.
#[derive(Debug, Clone)]
pub struct DiscoverSummary {
    pub appended: Option<String>,
    pub saved: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoverConfig {
    /// Overrides the document's `release-url-template` when set.
    pub url_template: Option<String>,
    pub title: String,
    pub today: NaiveDate,
}

/// Reconcile one document and update its publish flag.
pub fn check_dataset(
    path: &Path,
    prober: &dyn Prober,
    options: &ReconcileOptions,
) -> Result<CheckSummary> {
    let mut dataset = Dataset::load(path)?;
    tracing::info!(dataset = %dataset.id, path = %path.display(), "reconciling");

    let outcome = reconcile(&mut dataset, prober, options);
    update_publish_flag(&mut dataset, &outcome);

    let saved = outcome.changed;
    if saved {
        dataset.save(path)?;
        tracing::info!(
            dataset = %dataset.id,
            activated = outcome.activated,
            failed = outcome.failed,
            "document updated"
        );
    } else {
        tracing::info!(dataset = %dataset.id, probed = outcome.probed, "no changes");
    }
    Ok(CheckSummary { outcome, saved })
}

fn infer_file_kind(url: &str) -> (Option<String>, Option<String>) {
    let name = url.rsplit('/').next().unwrap_or(url);
    let mut parts = name.rsplit('.');
    let last = parts.next();
    match last {
        Some(ext @ ("gz" | "bz2" | "xz" | "zst")) => {
            let format = parts.next().map(str::to_string);
            (format, Some(ext.to_string()))
        }
        Some(ext) if !ext.is_empty() && ext != name => (Some(ext.to_string()), None),
        _ => (None, None),
    }
}

/// Discover the newest monthly release for one document and append it
/// when strictly newer than the latest recorded version.
///
/// `hasher` enables the opt-in content hash for the appended
/// distribution; `None` skips hashing entirely.
pub fn discover_dataset(
    path: &Path,
    prober: &dyn Prober,
    hasher: Option<&HttpProber>,
    config: &DiscoverConfig,
) -> Result<DiscoverSummary> {
    let mut dataset = Dataset::load(path)?;
    let template = config
        .url_template
        .as_deref()
        .or(dataset.release_url_template.as_deref())
        .ok_or_else(|| {
            anyhow!(
                "dataset `{}` declares no `release-url-template` and none was given",
                dataset.id
            )
        })?;
    let template = ReleaseUrlTemplate::new(template);

    let Some(found) = discover_next(&template, config.today, prober) else {
        tracing::info!(dataset = %dataset.id, "no release candidate reachable");
        return Ok(DiscoverSummary {
            appended: None,
            saved: false,
        });
    };

    // Compare before paying for a hash; an already-known release must
    // not trigger a download.
    if found.date <= dataset.latest_version(0)?.version {
        tracing::info!(dataset = %dataset.id, candidate = %found.date, "already up to date");
        return Ok(DiscoverSummary {
            appended: None,
            saved: false,
        });
    }

    let sha256 = match hasher {
        Some(hasher) => Some(hasher.sha256(&found.url)?),
        None => None,
    };
    let (format, compression) = infer_file_kind(&found.url);
    let options = AppendOptions {
        artifact_index: 0,
        title: config.title.clone(),
        description: dataset.description.clone().unwrap_or_default(),
        format,
        compression,
        sha256,
    };

    let appended = maybe_append(&mut dataset, &found, &options)?;
    if !appended {
        return Ok(DiscoverSummary {
            appended: None,
            saved: false,
        });
    }
    dataset.save(path)?;
    Ok(DiscoverSummary {
        appended: Some(found.date.to_string()),
        saved: true,
    })
}

/// Publish one document to the catalogue and clear its publish flag on
/// full success. A partial failure aborts without touching the flag, so
/// the next scheduled pass retries.
pub fn publish_dataset(path: &Path, client: &PublishClient) -> Result<()> {
    let mut dataset = Dataset::load(path)?;
    let (account, api_key) = credentials_for(&dataset)?;

    client
        .publish_dataset(&dataset, &account, &api_key)
        .with_context(|| format!("publish dataset `{}`", dataset.id))?;

    dataset.publish_requested = false;
    dataset.last_checked = Some(Utc::now());
    dataset.save(path)?;
    tracing::info!(dataset = %dataset.id, "published and flag cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::StubProber;
    use crate::probe::ProbeOutcome;
    use std::fs;

    fn write_doc(dir: &Path, yaml: &str) -> std::path::PathBuf {
        let path = dir.join("metadata.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    const PENDING_DOC: &str = "\
id: gnd
artifacts:
- id: authorities
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/gnd-2025-09-01.ttl.gz
      status: pending
";

    #[test]
    fn check_saves_only_when_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), PENDING_DOC);
        let prober = StubProber::new(ProbeOutcome::Reachable { size: None });

        let first = check_dataset(&path, &prober, &ReconcileOptions::default()).unwrap();
        assert!(first.saved);
        assert!(first.outcome.activated > 0);

        let reloaded = Dataset::load(&path).unwrap();
        assert!(reloaded.publish_requested);

        // Second pass: the distribution is active, nothing to probe.
        let second = check_dataset(&path, &prober, &ReconcileOptions::default()).unwrap();
        assert!(!second.saved);
    }

    #[test]
    fn check_on_unchanged_document_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "\
id: gnd
artifacts:
- id: authorities
  versions:
  - version: 2025-09-01
    distributions:
    - format: ttl
      status: pending
";
        let path = write_doc(dir.path(), yaml);
        let prober = StubProber::new(ProbeOutcome::Reachable { size: None });

        let summary = check_dataset(&path, &prober, &ReconcileOptions::default()).unwrap();

        assert!(!summary.saved);
        assert_eq!(fs::read_to_string(&path).unwrap(), yaml);
    }

    #[test]
    fn discover_appends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "\
id: dblp
license: cc0
release-url-template: https://example.org/{year}/dblp-{year}-{month}-01.nt.gz
artifacts:
- id: rdf
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/2025/dblp-2025-09-01.nt.gz
      status: active
";
        let path = write_doc(dir.path(), yaml);
        let prober = StubProber::new(ProbeOutcome::Reachable { size: Some(2048) });
        let config = DiscoverConfig {
            url_template: None,
            title: "Monthly Snapshot".to_string(),
            today: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
        };

        let summary = discover_dataset(&path, &prober, None, &config).unwrap();
        assert_eq!(summary.appended.as_deref(), Some("2025-10-01"));
        assert!(summary.saved);

        let reloaded = Dataset::load(&path).unwrap();
        let latest = reloaded.latest_version(0).unwrap();
        assert_eq!(latest.version.to_string(), "2025-10-01");
        let dist = &latest.distributions[0];
        assert_eq!(dist.format.as_deref(), Some("nt"));
        assert_eq!(dist.compression.as_deref(), Some("gz"));
        assert_eq!(dist.size, Some(2048));
        assert_eq!(dist.sha256, None);
    }

    #[test]
    fn discover_known_release_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "\
id: dblp
release-url-template: https://example.org/{year}/dblp-{year}-{month}-01.nt.gz
artifacts:
- id: rdf
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/2025/dblp-2025-09-01.nt.gz
      status: active
";
        let path = write_doc(dir.path(), yaml);
        // Current month 404s; fallback finds the release already recorded.
        let prober = StubProber::new(ProbeOutcome::Reachable { size: None }).with(
            "https://example.org/2025/dblp-2025-10-01.nt.gz",
            ProbeOutcome::Unreachable { code: 404 },
        );
        let config = DiscoverConfig {
            url_template: None,
            title: "Monthly Snapshot".to_string(),
            today: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
        };

        let summary = discover_dataset(&path, &prober, None, &config).unwrap();

        assert!(summary.appended.is_none());
        assert!(!summary.saved);
        assert_eq!(fs::read_to_string(&path).unwrap(), yaml);
    }

    #[test]
    fn discover_without_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), PENDING_DOC);
        let prober = StubProber::new(ProbeOutcome::NetworkError);
        let config = DiscoverConfig {
            url_template: None,
            title: String::new(),
            today: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
        };

        assert!(discover_dataset(&path, &prober, None, &config).is_err());
    }

    #[test]
    fn publish_failure_leaves_flag_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "\
id: dblp
databus-account: LODCUR_TEST_RETRY_KEY
publish-requested: true
artifacts:
- id: rdf
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/dblp-2025-09-01.nt.gz
      status: active
";
        let path = write_doc(dir.path(), yaml);
        std::env::set_var("LODCUR_TEST_RETRY_KEY", "not-a-real-key");
        // Nothing listens on port 1; the first POST fails in transport.
        let client = PublishClient::new(
            "http://127.0.0.1:1",
            std::time::Duration::from_millis(200),
        );

        assert!(publish_dataset(&path, &client).is_err());

        let reloaded = Dataset::load(&path).unwrap();
        assert!(reloaded.publish_requested);
        // The document was not rewritten at all.
        assert_eq!(fs::read_to_string(&path).unwrap(), yaml);
    }

    #[test]
    fn infer_file_kind_handles_compressed_and_plain_names() {
        assert_eq!(
            infer_file_kind("https://example.org/2025/dblp-2025-09-01.nt.gz"),
            (Some("nt".to_string()), Some("gz".to_string()))
        );
        assert_eq!(
            infer_file_kind("https://example.org/authorities.ttl"),
            (Some("ttl".to_string()), None)
        );
        assert_eq!(infer_file_kind("https://example.org/dump"), (None, None));
    }
}
