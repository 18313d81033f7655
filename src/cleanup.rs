//! Operator-triggered removal of a published group.
//!
//! This is an isolated collaborator around the catalogue's SPARQL and
//! REST endpoints; it never touches the reconciliation state machine.
//! Versions are deleted before artifacts, and the group URI last.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use ureq::Agent;

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<BTreeMap<String, SparqlBinding>>,
}

#[derive(Deserialize)]
struct SparqlBinding {
    value: String,
}

/// Result of one removal run.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

pub struct CleanupClient {
    base_url: String,
    sparql_endpoint: String,
    agent: Agent,
}

impl CleanupClient {
    pub fn new(
        base_url: impl Into<String>,
        sparql_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        CleanupClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sparql_endpoint: sparql_endpoint.into(),
            agent,
        }
    }

    fn query_uris(&self, query: &str, var: &str) -> Result<Vec<String>> {
        let response = self
            .agent
            .post(&self.sparql_endpoint)
            .header("Accept", "application/sparql-results+json")
            .send_form([("query", query)])
            .context("run SPARQL query")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("SPARQL endpoint returned status {status}");
        }
        let parsed: SparqlResponse = response
            .into_body()
            .read_json()
            .context("parse SPARQL results")?;
        Ok(parsed
            .results
            .bindings
            .into_iter()
            .filter_map(|mut row| row.remove(var).map(|binding| binding.value))
            .collect())
    }

    fn group_members(&self, account: &str, group: &str, kind: &str) -> Result<Vec<String>> {
        let query = format!(
            "PREFIX databus: <https://dataid.dbpedia.org/databus#>\n\
             SELECT DISTINCT ?resource WHERE {{\n\
               ?resource databus:group <{}/{}/{}> .\n\
               ?resource a databus:{} .\n\
             }}",
            self.base_url, account, group, kind
        );
        self.query_uris(&query, "resource")
    }

    fn delete_resource(&self, uri: &str, api_key: &str, report: &mut CleanupReport) {
        let result = self
            .agent
            .delete(uri)
            .header("Accept", "application/json")
            .header("Content-Type", "application/ld+json")
            .header("X-API-KEY", api_key)
            .call();
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(uri, "deleted");
                report.deleted += 1;
            }
            Ok(response) => {
                tracing::warn!(uri, code = response.status().as_u16(), "delete rejected");
                report.failed += 1;
            }
            Err(err) => {
                tracing::warn!(uri, error = %err, "delete failed");
                report.failed += 1;
            }
        }
    }

    /// Remove every version and artifact in a group, then the group
    /// itself. Individual delete failures are counted, not fatal, so an
    /// operator can re-run until the report comes back clean.
    pub fn remove_group(&self, account: &str, group: &str, api_key: &str) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        let versions = self.group_members(account, group, "Version")?;
        tracing::info!(group, count = versions.len(), "removing versions");
        for uri in &versions {
            self.delete_resource(uri, api_key, &mut report);
        }

        let artifacts = self.group_members(account, group, "Artifact")?;
        tracing::info!(group, count = artifacts.len(), "removing artifacts");
        for uri in &artifacts {
            self.delete_resource(uri, api_key, &mut report);
        }

        let group_uri = format!("{}/{}/{}", self.base_url, account, group);
        self.delete_resource(&group_uri, api_key, &mut report);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sparql_bindings() {
        let raw = r#"{
            "head": {"vars": ["resource"]},
            "results": {"bindings": [
                {"resource": {"type": "uri", "value": "https://example.org/a/g/x/2025-09-01"}},
                {"resource": {"type": "uri", "value": "https://example.org/a/g/y/2025-09-01"}}
            ]}
        }"#;
        let parsed: SparqlResponse = serde_json::from_str(raw).unwrap();
        let uris: Vec<String> = parsed
            .results
            .bindings
            .into_iter()
            .filter_map(|mut row| row.remove("resource").map(|binding| binding.value))
            .collect();
        assert_eq!(uris.len(), 2);
        assert!(uris[0].ends_with("x/2025-09-01"));
    }

    #[test]
    fn empty_result_set_yields_no_uris() {
        let raw = r#"{"results": {"bindings": []}}"#;
        let parsed: SparqlResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.results.bindings.is_empty());
    }
}
