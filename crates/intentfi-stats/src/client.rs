use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::StatsError;
use crate::types::{
    Competitor, DataList, MatchRecord, Season, Statistic, StatisticsResponse,
    UpcomingMatchesResponse,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Read-only client for the sports statistics provider.
#[derive(Debug, Clone)]
pub struct StatsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl StatsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "stats http client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StatsError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "stats provider returned error status");
            return Err(StatsError::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET /competitors/{team}/seasons/{season}/statistics`
    pub async fn fetch_statistics(
        &self,
        team_id: &str,
        season_id: &str,
    ) -> Result<Vec<Statistic>, StatsError> {
        let path = format!("/competitors/{team_id}/seasons/{season_id}/statistics");
        let resp: StatisticsResponse = self.get_json(&path, &[]).await?;
        Ok(resp
            .competitor
            .map(|c| c.statistics)
            .unwrap_or_default())
    }

    /// `GET /seasons/{season}/upcoming-matches`
    pub async fn fetch_upcoming_matches(
        &self,
        season_id: &str,
    ) -> Result<Vec<MatchRecord>, StatsError> {
        let path = format!("/seasons/{season_id}/upcoming-matches");
        let resp: UpcomingMatchesResponse = self.get_json(&path, &[]).await?;
        Ok(resp.upcoming_matches)
    }

    /// Display name of a team, best effort.
    pub async fn fetch_team_name(&self, team_id: &str) -> Option<String> {
        match self.list_competitors(&[("id", team_id)]).await {
            Ok(competitors) => competitors.into_iter().next().and_then(|c| c.name),
            Err(err) => {
                tracing::debug!(team_id, error = %err, "team name lookup failed");
                None
            }
        }
    }

    pub async fn list_competitors(
        &self,
        query: &[(&str, &str)],
    ) -> Result<Vec<Competitor>, StatsError> {
        let list: DataList<Competitor> = self.get_json("/competitors", query).await?;
        Ok(list.data)
    }

    pub async fn list_seasons(&self, query: &[(&str, &str)]) -> Result<Vec<Season>, StatsError> {
        let list: DataList<Season> = self.get_json("/seasons", query).await?;
        Ok(list.data)
    }
}
