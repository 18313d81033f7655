//! Publishing dataset metadata to the external catalogue API.
//!
//! One HTTP call per entity, in Group -> Artifact -> Version order. The
//! first rejected call aborts the run and leaves the document's
//! publish-requested flag set, so the next scheduled pass retries
//! naturally; the flag clears only after every entity was accepted.

use crate::document::{Dataset, Version};
use crate::reconcile::ReconcileOutcome;
use serde::Serialize;
use std::env;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

pub const DEFAULT_API_BASE: &str = "https://databus.dbpedia.org";
const CONTEXT_URL: &str = "https://databus.dbpedia.org/res/context.jsonld";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("document `{dataset}` has no `databus-account` field")]
    MissingAccount { dataset: String },
    #[error("API key environment variable `{var}` is not set")]
    MissingKey { var: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("serialize {entity} `{id}`: {source}")]
    Payload {
        entity: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("publish {entity} `{id}`: {source}")]
    Transport {
        entity: &'static str,
        id: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("publish {entity} `{id}`: API returned status {code}")]
    Rejected {
        entity: &'static str,
        id: String,
        code: u16,
    },
}

/// Set the dataset-level publish request when a reconciliation pass
/// brought at least one distribution into `active`. Deactivations never
/// trigger a publish.
pub fn update_publish_flag(dataset: &mut Dataset, outcome: &ReconcileOutcome) {
    if outcome.activated > 0 {
        dataset.publish_requested = true;
        tracing::info!(
            dataset = %dataset.id,
            activated = outcome.activated,
            "publish requested"
        );
    }
}

/// Resolve the account name and its API key for a dataset.
///
/// The document's `databus-account` value is both the account path
/// segment and the name of the environment variable holding the key.
/// A missing key is fatal to the publish step, never silent.
pub fn credentials_for(dataset: &Dataset) -> Result<(String, String), CredentialError> {
    let account = dataset
        .databus_account
        .as_deref()
        .filter(|account| !account.is_empty())
        .ok_or_else(|| CredentialError::MissingAccount {
            dataset: dataset.id.clone(),
        })?;
    let key = env::var(account).map_err(|_| CredentialError::MissingKey {
        var: account.to_string(),
    })?;
    Ok((account.to_string(), key))
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(rename = "@context")]
    context: &'static str,
    #[serde(rename = "@graph")]
    graph: Entity<'a>,
}

#[derive(Serialize)]
struct Entity<'a> {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "@id")]
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    distribution: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "formatExtension", skip_serializing_if = "Option::is_none")]
    format_extension: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<&'a str>,
    #[serde(rename = "sha256sum", skip_serializing_if = "Option::is_none")]
    sha256sum: Option<&'a str>,
    #[serde(rename = "dcat:byteSize", skip_serializing_if = "Option::is_none")]
    byte_size: Option<u64>,
    #[serde(rename = "downloadURL", skip_serializing_if = "Option::is_none")]
    download_url: Option<&'a str>,
}

fn version_entity<'a>(version_id: String, dataset: &'a Dataset, version: &'a Version) -> Entity<'a> {
    let distribution = version
        .distributions
        .iter()
        .enumerate()
        .map(|(index, dist)| Part {
            id: format!("{version_id}#part-{index}"),
            kind: "Part",
            format_extension: dist.format.as_deref(),
            compression: dist.compression.as_deref(),
            sha256sum: dist.sha256.as_deref(),
            byte_size: dist.size,
            download_url: dist.file.as_deref(),
        })
        .collect();
    Entity {
        kind: "Version",
        id: version_id,
        title: version.title.as_deref(),
        summary: None,
        description: version.description.as_deref(),
        license: version.license.as_deref().or(dataset.license.as_deref()),
        distribution,
    }
}

/// Client for the catalogue's publish endpoint.
pub struct PublishClient {
    base_url: String,
    agent: Agent,
}

impl PublishClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        PublishClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/publish?fetch-file-properties=false", self.base_url)
    }

    fn post_entity(&self, entity: Entity<'_>, api_key: &str) -> Result<(), PublishError> {
        let entity_kind = entity.kind;
        let entity_id = entity.id.clone();
        let payload = Payload {
            context: CONTEXT_URL,
            graph: entity,
        };
        let body = serde_json::to_string(&payload).map_err(|source| PublishError::Payload {
            entity: entity_kind,
            id: entity_id.clone(),
            source,
        })?;

        let response = self
            .agent
            .post(&self.endpoint())
            .header("Accept", "application/json")
            .header("Content-Type", "application/ld+json")
            .header("X-API-KEY", api_key)
            .send(&body)
            .map_err(|source| PublishError::Transport {
                entity: entity_kind,
                id: entity_id.clone(),
                source: Box::new(source),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                entity: entity_kind,
                id: entity_id,
                code: status.as_u16(),
            });
        }
        tracing::info!(entity = entity_kind, id = %entity_id, "published");
        Ok(())
    }

    /// Publish the whole document: the group, then every artifact, then
    /// every version with its distributions. Any failure aborts the run
    /// so the caller keeps the publish flag set for a retry.
    pub fn publish_dataset(
        &self,
        dataset: &Dataset,
        account: &str,
        api_key: &str,
    ) -> Result<(), PublishError> {
        let group_id = format!("{}/{}/{}", self.base_url, account, dataset.id);
        self.post_entity(
            Entity {
                kind: "Group",
                id: group_id.clone(),
                title: dataset.title.as_deref(),
                summary: dataset.description.as_deref(),
                description: dataset.description.as_deref(),
                license: dataset.license.as_deref(),
                distribution: Vec::new(),
            },
            api_key,
        )?;

        for artifact in &dataset.artifacts {
            let artifact_id = format!("{group_id}/{}", artifact.id);
            self.post_entity(
                Entity {
                    kind: "Artifact",
                    id: artifact_id.clone(),
                    title: artifact.title.as_deref(),
                    summary: artifact.description.as_deref(),
                    description: artifact.description.as_deref(),
                    license: dataset.license.as_deref(),
                    distribution: Vec::new(),
                },
                api_key,
            )?;

            for version in &artifact.versions {
                let version_id = format!("{artifact_id}/{}", version.version);
                self.post_entity(version_entity(version_id, dataset, version), api_key)?;
            }
        }
        Ok(())
    }
}
