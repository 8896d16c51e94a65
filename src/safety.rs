use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SAFE_BROWSING_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";
const REQUEST_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum SafetyCheckError {
    #[error("safety check request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("safety check returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Answers whether an endpoint is considered safe to visit. Consulted once,
/// when a url is shortened.
#[async_trait]
pub trait UrlSafetyCheck: Send + Sync {
    async fn is_url_safe(&self, endpoint: &str) -> Result<bool, SafetyCheckError>;
}

#[derive(Debug, Clone)]
pub struct SafeBrowsingConfig {
    pub api_key: String,
    pub client_id: String,
    pub client_version: String,
}

pub struct GoogleSafeBrowsing {
    client: Client,
    config: SafeBrowsingConfig,
}

impl GoogleSafeBrowsing {
    pub fn new(config: SafeBrowsingConfig) -> Result<Self, SafetyCheckError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl UrlSafetyCheck for GoogleSafeBrowsing {
    async fn is_url_safe(&self, endpoint: &str) -> Result<bool, SafetyCheckError> {
        let response = self
            .client
            .post(SAFE_BROWSING_URL)
            .query(&[("key", &self.config.api_key)])
            .json(&ThreatMatchesRequest::new(&self.config, endpoint))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SafetyCheckError::Status(response.status()));
        }
        let matches: ThreatMatchesResponse = response.json().await?;
        Ok(matches.is_safe())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatchesRequest<'a> {
    client: ClientInfo<'a>,
    threat_info: ThreatInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo<'a> {
    client_id: &'a str,
    client_version: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: [&'static str; 2],
    platform_types: [&'static str; 1],
    threat_entry_types: [&'static str; 1],
    threat_entries: [ThreatEntry<'a>; 1],
}

#[derive(Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

impl<'a> ThreatMatchesRequest<'a> {
    fn new(config: &'a SafeBrowsingConfig, url: &'a str) -> Self {
        Self {
            client: ClientInfo {
                client_id: &config.client_id,
                client_version: &config.client_version,
            },
            threat_info: ThreatInfo {
                threat_types: ["MALWARE", "SOCIAL_ENGINEERING"],
                platform_types: ["ANY_PLATFORM"],
                threat_entry_types: ["URL"],
                threat_entries: [ThreatEntry { url }],
            },
        }
    }
}

#[derive(Deserialize)]
struct ThreatMatchesResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

impl ThreatMatchesResponse {
    fn is_safe(&self) -> bool {
        self.matches.is_empty()
    }
}
