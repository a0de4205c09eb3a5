//! Organization, election and follower lookups owned by other services.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LookupConfig;
use crate::error::{AnalyticsError, Result};

/// Read-only view of the directory services. Not-found, ambiguous and failed
/// lookups all come back as "no result".
#[async_trait]
pub trait Directory: Send + Sync {
    async fn election_day_text(&self, google_civic_election_id: i64) -> Option<String>;

    async fn organization_id(&self, organization_we_vote_id: &str) -> Option<i64>;

    /// Voters currently following the organization.
    async fn followers(&self, organization_we_vote_id: &str) -> Vec<String>;
}

#[derive(Deserialize)]
struct ElectionResponse {
    election_day_text: Option<String>,
}

#[derive(Deserialize)]
struct OrganizationResponse {
    organization_id: Option<i64>,
}

#[derive(Deserialize)]
struct FollowersResponse {
    #[serde(default)]
    voter_we_vote_ids: Vec<String>,
}

/// JSON-over-HTTP directory client.
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalyticsError::Lookup(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalyticsError::Lookup(format!("{url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(AnalyticsError::Lookup(format!("{url}: HTTP {}", resp.status())));
        }
        resp.json::<T>()
            .await
            .map_err(|e| AnalyticsError::Lookup(format!("{url}: {e}")))
    }
}

fn organization_path(organization_we_vote_id: &str) -> String {
    format!("/organizations/{}", urlencoding::encode(organization_we_vote_id))
}

fn followers_path(organization_we_vote_id: &str) -> String {
    format!("{}/followers", organization_path(organization_we_vote_id))
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn election_day_text(&self, google_civic_election_id: i64) -> Option<String> {
        match self
            .get_json::<ElectionResponse>(&format!("/elections/{google_civic_election_id}"))
            .await
        {
            Ok(resp) => resp.election_day_text.filter(|text| !text.is_empty()),
            Err(e) => {
                tracing::warn!("election {google_civic_election_id} lookup failed: {e}");
                None
            }
        }
    }

    async fn organization_id(&self, organization_we_vote_id: &str) -> Option<i64> {
        match self
            .get_json::<OrganizationResponse>(&organization_path(organization_we_vote_id))
            .await
        {
            Ok(resp) => resp.organization_id,
            Err(e) => {
                tracing::warn!("organization {organization_we_vote_id} lookup failed: {e}");
                None
            }
        }
    }

    async fn followers(&self, organization_we_vote_id: &str) -> Vec<String> {
        match self
            .get_json::<FollowersResponse>(&followers_path(organization_we_vote_id))
            .await
        {
            Ok(resp) => resp.voter_we_vote_ids,
            Err(e) => {
                tracing::warn!("followers of {organization_we_vote_id} lookup failed: {e}");
                Vec::new()
            }
        }
    }
}

/// HTTP directory when a base URL is configured, otherwise an empty static one.
pub fn directory_from_config(config: &LookupConfig) -> Result<Arc<dyn Directory>> {
    match config.base_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
        Some(base_url) => {
            tracing::info!("directory lookups via {base_url}");
            Ok(Arc::new(HttpDirectory::new(base_url, config.timeout_secs)?))
        }
        None => {
            tracing::info!("no directory base_url configured, lookups return nothing");
            Ok(Arc::new(StaticDirectory::default()))
        }
    }
}

/// In-memory directory for tests and for deployments without a directory service.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    pub election_days: HashMap<i64, String>,
    pub organization_ids: HashMap<String, i64>,
    pub followers: HashMap<String, Vec<String>>,
}

impl StaticDirectory {
    pub fn with_election(mut self, google_civic_election_id: i64, election_day_text: &str) -> Self {
        self.election_days
            .insert(google_civic_election_id, election_day_text.to_string());
        self
    }

    pub fn with_organization(mut self, organization_we_vote_id: &str, organization_id: i64) -> Self {
        self.organization_ids
            .insert(organization_we_vote_id.to_ascii_lowercase(), organization_id);
        self
    }

    pub fn with_followers(mut self, organization_we_vote_id: &str, voters: &[&str]) -> Self {
        self.followers.insert(
            organization_we_vote_id.to_ascii_lowercase(),
            voters.iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn election_day_text(&self, google_civic_election_id: i64) -> Option<String> {
        self.election_days.get(&google_civic_election_id).cloned()
    }

    async fn organization_id(&self, organization_we_vote_id: &str) -> Option<i64> {
        self.organization_ids
            .get(&organization_we_vote_id.to_ascii_lowercase())
            .copied()
    }

    async fn followers(&self, organization_we_vote_id: &str) -> Vec<String> {
        self.followers
            .get(&organization_we_vote_id.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_lookups() {
        let directory = StaticDirectory::default()
            .with_election(9000, "2024-11-05")
            .with_organization("wv01org1", 41)
            .with_followers("wv01org1", &["wv01voter1", "wv01voter2"]);

        assert_eq!(directory.election_day_text(9000).await.as_deref(), Some("2024-11-05"));
        assert_eq!(directory.election_day_text(1).await, None);
        assert_eq!(directory.organization_id("WV01ORG1").await, Some(41));
        assert_eq!(directory.followers("wv01org1").await.len(), 2);
        assert!(directory.followers("wv01org2").await.is_empty());
    }

    #[test]
    fn test_organization_ids_are_escaped_in_paths() {
        assert_eq!(organization_path("wv01org1"), "/organizations/wv01org1");
        assert_eq!(organization_path("wv01/org 1?x"), "/organizations/wv01%2Forg%201%3Fx");
        assert_eq!(followers_path("a/b"), "/organizations/a%2Fb/followers");
    }

    #[tokio::test]
    async fn test_unreachable_http_directory_yields_no_result() {
        let directory = HttpDirectory::new("http://127.0.0.1:9", 1).unwrap();
        assert_eq!(directory.organization_id("wv01org1").await, None);
        assert!(directory.followers("wv01org1").await.is_empty());
    }
}
