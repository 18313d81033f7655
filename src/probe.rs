//! Reachability probing for distribution URLs.
//!
//! Probes are single HEAD requests with a fixed per-probe timeout and no
//! in-process retries; a transient failure is recorded as an outcome and
//! corrected by the next scheduled run. The streamed digest is the one
//! deliberate exception: it downloads the whole file and is only invoked
//! when a caller explicitly asks for a content hash.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::time::Duration;
use ureq::http::header::CONTENT_LENGTH;
use ureq::Agent;

/// Default per-probe timeout, matching the cadence-driven runs this tool
/// is scheduled under.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Verdict for one URL probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx response; size is the advertised content length, if any.
    Reachable { size: Option<u64> },
    /// Definitive non-2xx response.
    Unreachable { code: u16 },
    /// Transport-level failure (DNS, connect, timeout).
    NetworkError,
}

/// Contract the reconciliation core needs from the network layer.
pub trait Prober {
    fn probe(&self, url: &str) -> ProbeOutcome;
}

/// HEAD-request prober over a shared `ureq` agent.
pub struct HttpProber {
    agent: Agent,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        HttpProber { agent }
    }

    /// Streamed SHA-256 over a full GET of the URL.
    ///
    /// Cost is a complete file download, so this is opt-in and never part
    /// of routine reconciliation. The probe timeout is lifted for the
    /// transfer itself.
    pub fn sha256(&self, url: &str) -> Result<String> {
        let response = self
            .agent
            .get(url)
            .config()
            .timeout_global(None)
            .build()
            .call()
            .with_context(|| format!("fetch {url} for hashing"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("fetch {url} for hashing: status {status}"));
        }

        let mut reader = response.into_body().into_reader();
        let mut hasher = Sha256::new();
        let bytes = std::io::copy(&mut reader, &mut hasher)
            .with_context(|| format!("stream {url} for hashing"))?;
        tracing::info!(url, bytes, "content hash computed");
        Ok(hex::encode(hasher.finalize()))
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        HttpProber::new(DEFAULT_TIMEOUT)
    }
}

impl Prober for HttpProber {
    fn probe(&self, url: &str) -> ProbeOutcome {
        match self.agent.head(url).call() {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let size = response
                        .headers()
                        .get(CONTENT_LENGTH)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse().ok());
                    ProbeOutcome::Reachable { size }
                } else {
                    ProbeOutcome::Unreachable {
                        code: status.as_u16(),
                    }
                }
            }
            Err(err) => {
                tracing::debug!(url, error = %err, "probe transport failure");
                ProbeOutcome::NetworkError
            }
        }
    }
}
