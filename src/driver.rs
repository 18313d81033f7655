//! Daily driver over a directory of dataset documents.
//!
//! Each knowledge graph lives in its own subdirectory with a
//! `metadata.yaml` that declares which built-in check procedure applies
//! to it. One dataset failing never halts its siblings; the run reports
//! totals and leaves the exit-code decision to the caller.

use crate::probe::Prober;
use crate::reconcile::ReconcileOptions;
use crate::workflow::{check_dataset, discover_dataset, DiscoverConfig};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

pub const METADATA_FILE: &str = "metadata.yaml";

#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOutcome {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub reconcile: ReconcileOptions,
    pub today: NaiveDate,
}

fn run_check(
    metadata: &Path,
    check: &str,
    prober: &dyn Prober,
    config: &DriverConfig,
) -> Result<bool> {
    match check {
        "reconcile" | "check-url" => {
            check_dataset(metadata, prober, &config.reconcile)?;
            Ok(true)
        }
        "release-discovery" => {
            // Discovery first so a freshly appended pending entry gets
            // probed in the same run.
            let discover_config = DiscoverConfig {
                url_template: None,
                title: "Monthly Snapshot".to_string(),
                today: config.today,
            };
            discover_dataset(metadata, prober, None, &discover_config)?;
            check_dataset(metadata, prober, &config.reconcile)?;
            Ok(true)
        }
        other => {
            tracing::warn!(check = other, "unknown check procedure, skipping");
            Ok(false)
        }
    }
}

/// Run the declared check for every dataset directory under `root`.
pub fn run_all(root: &Path, prober: &dyn Prober, config: &DriverConfig) -> Result<DriverOutcome> {
    let mut outcome = DriverOutcome::default();
    let mut names: Vec<_> = fs::read_dir(root)
        .with_context(|| format!("read dataset root {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path())
        .collect();
    names.sort();

    for dir in names {
        let metadata = dir.join(METADATA_FILE);
        if !metadata.is_file() {
            tracing::info!(dir = %dir.display(), "no metadata.yaml, skipping");
            outcome.skipped += 1;
            continue;
        }

        let check = match crate::document::Dataset::load(&metadata) {
            Ok(dataset) => dataset.check,
            Err(err) => {
                tracing::error!(path = %metadata.display(), error = %err, "dataset failed");
                outcome.failed += 1;
                continue;
            }
        };
        let Some(check) = check else {
            tracing::info!(path = %metadata.display(), "no check declared, skipping");
            outcome.skipped += 1;
            continue;
        };

        match run_check(&metadata, &check, prober, config) {
            Ok(true) => outcome.processed += 1,
            Ok(false) => outcome.skipped += 1,
            Err(err) => {
                tracing::error!(path = %metadata.display(), error = %err, "dataset failed");
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = outcome.processed,
        failed = outcome.failed,
        skipped = outcome.skipped,
        "daily run complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Dataset, Status};
    use crate::probe::testing::StubProber;
    use crate::probe::ProbeOutcome;

    fn config() -> DriverConfig {
        DriverConfig {
            reconcile: ReconcileOptions::default(),
            today: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
        }
    }

    fn seed(root: &Path, name: &str, yaml: &str) {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), yaml).unwrap();
    }

    #[test]
    fn one_broken_dataset_does_not_halt_siblings() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "broken", "artifacts: [not, a, mapping\n");
        seed(
            root.path(),
            "gnd",
            "\
id: gnd
check-new-release: reconcile
artifacts:
- id: authorities
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/gnd.ttl.gz
      status: pending
",
        );
        let prober = StubProber::new(ProbeOutcome::Reachable { size: None });

        let outcome = run_all(root.path(), &prober, &config()).unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 1);

        let doc = Dataset::load(&root.path().join("gnd").join(METADATA_FILE)).unwrap();
        assert_eq!(
            doc.artifacts[0].versions[0].distributions[0].status,
            Status::Active
        );
    }

    #[test]
    fn datasets_without_checks_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "plain", "id: plain\n");
        seed(root.path(), "odd", "id: odd\ncheck-new-release: scrape.py\n");
        fs::create_dir(root.path().join("empty")).unwrap();
        let prober = StubProber::new(ProbeOutcome::NetworkError);

        let outcome = run_all(root.path(), &prober, &config()).unwrap();

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(prober.probe_count(), 0);
    }

    #[test]
    fn release_discovery_appends_then_reconciles() {
        let root = tempfile::tempdir().unwrap();
        seed(
            root.path(),
            "dblp",
            "\
id: dblp
check-new-release: release-discovery
release-url-template: https://example.org/{year}/dblp-{year}-{month}-01.nt.gz
artifacts:
- id: rdf
  versions:
  - version: 2025-09-01
    distributions:
    - file: https://example.org/2025/dblp-2025-09-01.nt.gz
      status: active
",
        );
        let prober = StubProber::new(ProbeOutcome::Reachable { size: Some(9) });

        let outcome = run_all(root.path(), &prober, &config()).unwrap();
        assert_eq!(outcome.processed, 1);

        let doc = Dataset::load(&root.path().join("dblp").join(METADATA_FILE)).unwrap();
        let latest = doc.latest_version(0).unwrap();
        assert_eq!(latest.version.to_string(), "2025-10-01");
        // The appended pending entry was probed by the same run.
        assert_eq!(latest.distributions[0].status, Status::Active);
        assert!(doc.publish_requested);
    }
}
