//! Discovery of newer monthly releases.
//!
//! Sources publish on a monthly cadence, dated the first of the month.
//! Discovery therefore probes exactly two candidate URLs: the first of
//! the current month, then the first of the previous month. That bound
//! is a deliberate scope limit, not an optimization; widening it would
//! change observable behavior.

use crate::document::ReleaseDate;
use crate::probe::{ProbeOutcome, Prober};
use chrono::{Datelike, NaiveDate};

/// Fixed URL template with `{year}` and `{month}` placeholders; month is
/// rendered zero-padded.
#[derive(Debug, Clone)]
pub struct ReleaseUrlTemplate {
    template: String,
}

impl ReleaseUrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        ReleaseUrlTemplate {
            template: template.into(),
        }
    }

    pub fn url_for(&self, date: ReleaseDate) -> String {
        self.template
            .replace("{year}", &date.year().to_string())
            .replace("{month}", &format!("{:02}", date.month()))
    }
}

/// A reachable candidate release found by discovery.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub date: ReleaseDate,
    pub url: String,
    pub size: Option<u64>,
}

/// The two candidate dates for `today`: current month first, then the
/// previous month with year rollover at January.
pub fn month_candidates(today: NaiveDate) -> [ReleaseDate; 2] {
    let current =
        ReleaseDate::from_ymd(today.year(), today.month(), 1).expect("first of month is valid");
    let (prev_year, prev_month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let previous =
        ReleaseDate::from_ymd(prev_year, prev_month, 1).expect("first of month is valid");
    [current, previous]
}

/// Probe for the most recent available release.
///
/// Returns the first reachable candidate, which may be a release the
/// document already knows about; the append policy is what decides
/// whether it is actually new. `None` means neither candidate is
/// reachable, which is not an error for the caller.
pub fn discover_next(
    template: &ReleaseUrlTemplate,
    today: NaiveDate,
    prober: &dyn Prober,
) -> Option<Discovered> {
    for date in month_candidates(today) {
        let url = template.url_for(date);
        match prober.probe(&url) {
            ProbeOutcome::Reachable { size } => {
                tracing::info!(%url, date = %date, "release candidate reachable");
                return Some(Discovered { date, url, size });
            }
            verdict => {
                tracing::debug!(%url, date = %date, ?verdict, "release candidate not available");
            }
        }
    }
    None
}
