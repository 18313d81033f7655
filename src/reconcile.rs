//! Status reconciliation for a loaded dataset document.
//!
//! One pass walks every distribution in deterministic order (artifact,
//! then version, then distribution), probes eligible URLs, and rewrites
//! statuses from the verdicts. The two historically divergent behaviors
//! of the per-source scripts are collapsed into a single eligibility
//! switch here instead of living on as near-duplicate copies.

use crate::document::{Dataset, Status};
use crate::probe::{ProbeOutcome, Prober};
use chrono::Utc;

/// Which distributions a pass is allowed to re-probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eligibility {
    /// Probe only `pending` entries; settled `active`/`error` statuses
    /// are left for a later pass.
    #[default]
    PendingOnly,
    /// Probe everything except entries already `active`, so past
    /// failures get another chance.
    RetryNonActive,
}

impl Eligibility {
    fn allows(self, status: Status) -> bool {
        match self {
            Eligibility::PendingOnly => status == Status::Pending,
            Eligibility::RetryNonActive => status != Status::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub eligibility: Eligibility,
}

/// What a reconciliation pass did to the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOutcome {
    /// At least one status transitioned; the caller should persist.
    pub changed: bool,
    /// URLs actually probed this pass.
    pub probed: usize,
    /// Transitions into `active`; feeds the publish trigger.
    pub activated: usize,
    /// Transitions into `error`.
    pub failed: usize,
}

fn status_for(outcome: ProbeOutcome) -> Status {
    match outcome {
        ProbeOutcome::Reachable { .. } => Status::Active,
        ProbeOutcome::Unreachable { .. } | ProbeOutcome::NetworkError => Status::Error,
    }
}

/// Re-derive every eligible distribution's status from a fresh probe.
///
/// Entries without a `file` URL are skipped, and a document without
/// artifacts yields zero iterations rather than an error. Every probe
/// attempt stamps `last_verified`, whether or not the status moved;
/// `changed` reflects status transitions only, since that is what decides
/// whether a new snapshot is worth persisting.
pub fn reconcile(
    dataset: &mut Dataset,
    prober: &dyn Prober,
    options: &ReconcileOptions,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let now = Utc::now();

    for artifact in &mut dataset.artifacts {
        for version in &mut artifact.versions {
            for dist in &mut version.distributions {
                let Some(url) = dist.file.as_deref().filter(|url| !url.is_empty()) else {
                    continue;
                };
                if !options.eligibility.allows(dist.status) {
                    continue;
                }

                let verdict = prober.probe(url);
                outcome.probed += 1;
                dist.last_verified = Some(now);

                let new_status = status_for(verdict);
                if new_status != dist.status {
                    tracing::info!(
                        url,
                        from = %dist.status,
                        to = %new_status,
                        "distribution status updated"
                    );
                    if new_status == Status::Active {
                        outcome.activated += 1;
                    } else {
                        outcome.failed += 1;
                    }
                    dist.status = new_status;
                    outcome.changed = true;
                } else {
                    tracing::debug!(url, status = %dist.status, "no change");
                }
            }
        }
    }

    dataset.last_checked = Some(now);
    outcome
}
