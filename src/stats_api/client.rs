use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::provider::StatsSource;

/// Client for the public MLB Stats API and its player-search service.
#[derive(Clone)]
pub struct MlbStatsApi {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
    search_url: String,
}

impl MlbStatsApi {
    pub fn new(base_url: &str, search_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("mlb-predictor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(MlbStatsApi {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            search_url: search_url.trim_end_matches('/').to_string(),
        })
    }

    /// One GET, decoded as JSON. Failures are logged and become `None`;
    /// there is no retry.
    pub async fn call(&self, url: &str) -> Option<Value> {
        match self.fetch_json(url).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Stats API call failed: {:#}", e);
                None
            }
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        if !resp.status().is_success() {
            anyhow::bail!("{} returned {}", url, resp.status());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to decode JSON from {}", url))
    }

    fn search_player_url(&self, name: &str) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}/svc/search/v2/mlb", self.search_url),
            &[("query", name), ("limit", "1")],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl StatsSource for MlbStatsApi {
    fn name(&self) -> &str {
        "MLB Stats API"
    }

    async fn schedule(&self, date: NaiveDate) -> Option<Value> {
        let url = format!(
            "{}/v1/schedule?sportId=1&date={}",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        self.call(&url).await
    }

    async fn probable_schedule(&self, date: NaiveDate) -> Option<Value> {
        let url = format!(
            "{}/v1/schedule?sportId=1&date={}&hydrate=probablePitcher(lineups),team,linescore",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        self.call(&url).await
    }

    async fn live_feed(&self, game_pk: u64) -> Option<Value> {
        let url = format!("{}/v1.1/game/{}/feed/live", self.base_url, game_pk);
        self.call(&url).await
    }

    async fn teams(&self, season: i32) -> Option<Value> {
        let url = format!("{}/v1/teams?sportId=1&season={}", self.base_url, season);
        self.call(&url).await
    }

    async fn team_stats(&self, team_id: u64, season: i32) -> Option<Value> {
        let url = format!(
            "{}/v1/teams/stats?season={}&group=hitting,pitching&teamId={}",
            self.base_url, season, team_id
        );
        self.call(&url).await
    }

    async fn search_player(&self, name: &str) -> Option<Value> {
        match self.search_player_url(name) {
            Ok(url) => self.call(url.as_str()).await,
            Err(e) => {
                warn!("Cannot build player search URL for '{}': {}", name, e);
                None
            }
        }
    }

    async fn pitcher_stats(&self, player_id: u64, season: i32) -> Option<Value> {
        let url = format!(
            "{}/v1/people/{}/stats?stats=season&season={}&group=pitching",
            self.base_url, player_id, season
        );
        self.call(&url).await
    }
}
