use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};

/// Deadline for one full three-endpoint refresh.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for the one-shot identity probe at startup.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Merged result of one successful refresh. Replaced wholesale on every
/// successful poll; a failed poll leaves the previous snapshot untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Live readings from `/meter`.
    pub realtime: Value,
    /// Device configuration from `/configuration`.
    pub config: Value,
    /// Link status from `/han`.
    pub status: Value,
}

/// Identity fields read once at startup from `/han`. All fields are optional;
/// a device that omits them still produces a working (if anonymous) bridge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeInfo {
    pub mac: Option<String>,
    pub serial: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "v")]
    pub firmware: Option<String>,
}

/// HTTP client for the HAN reader's local JSON API.
#[derive(Debug, Clone)]
pub struct MeterClient {
    http: reqwest::Client,
    host: String,
}

impl MeterClient {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            host: host.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetch all three endpoints sequentially under a single deadline and
    /// merge them into one snapshot. Any individual failure fails the whole
    /// refresh; partial results are never returned.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let fetch = async {
            let realtime = self.get_json("meter").await?;
            let config = self.get_json("configuration").await?;
            let status = self.get_json("han").await?;
            Ok(Snapshot {
                realtime,
                config,
                status,
            })
        };

        match tokio::time::timeout(FETCH_TIMEOUT, fetch).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Update(format!(
                "no response from {} within {}s",
                self.host,
                FETCH_TIMEOUT.as_secs()
            ))),
        }
    }

    /// One-shot identity probe against `/han`. Callers treat a failure as
    /// non-fatal and fall back to default identity.
    pub async fn probe(&self) -> Result<ProbeInfo> {
        let url = format!("http://{}/han", self.host);
        let request = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| AppError::Update(format!("GET {}: {}", url, e)))?;

            if !response.status().is_success() {
                return Err(AppError::Update(format!(
                    "GET {}: unexpected status {}",
                    url,
                    response.status()
                )));
            }

            response
                .json::<ProbeInfo>()
                .await
                .map_err(|e| AppError::Update(format!("GET {}: invalid JSON: {}", url, e)))
        };

        match tokio::time::timeout(PROBE_TIMEOUT, request).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Update(format!(
                "no response from {} within {}s",
                self.host,
                PROBE_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("http://{}/{}", self.host, path);
        debug!(%url, "fetching");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Update(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Update(format!(
                "GET {}: unexpected status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::Update(format!("GET {}: invalid JSON: {}", url, e)))
    }
}
