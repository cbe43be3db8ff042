use std::cmp::Reverse;

use crate::client::StatsClient;
use crate::error::StatsError;
use crate::types::Competitor;

/// One tier of the team lookup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStep {
    ExactName,
    ExactShortName,
    ExactAbbreviation,
    Substring,
}

impl LookupStep {
    pub const CHAIN: [LookupStep; 4] = [
        LookupStep::ExactName,
        LookupStep::ExactShortName,
        LookupStep::ExactAbbreviation,
        LookupStep::Substring,
    ];

    fn filter_param(self) -> Option<&'static str> {
        match self {
            Self::ExactName => Some("name"),
            Self::ExactShortName => Some("short_name"),
            Self::ExactAbbreviation => Some("abbreviation"),
            Self::Substring => None,
        }
    }

    fn matches(self, competitor: &Competitor, needle: &str) -> bool {
        let eq = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase() == needle)
        };
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(needle))
        };
        match self {
            Self::ExactName => eq(&competitor.name),
            Self::ExactShortName => eq(&competitor.short_name),
            Self::ExactAbbreviation => eq(&competitor.abbreviation),
            Self::Substring => contains(&competitor.name) || contains(&competitor.short_name),
        }
    }
}

/// Maps a free-text team reference to the provider's competitor id.
#[derive(Debug, Clone)]
pub struct TeamResolver {
    client: StatsClient,
}

impl TeamResolver {
    pub fn new(client: StatsClient) -> Self {
        Self { client }
    }

    /// Walks the lookup chain; the first step yielding a competitor wins.
    /// Failed steps are skipped.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let needle = token.to_lowercase();
        for step in LookupStep::CHAIN {
            match self.run_step(step, token, &needle).await {
                Ok(Some(team_id)) => {
                    tracing::debug!(?step, token, %team_id, "team resolved");
                    return Some(team_id);
                }
                Ok(None) => tracing::debug!(?step, token, "no team at this step"),
                Err(err) => tracing::debug!(?step, token, error = %err, "team lookup step failed"),
            }
        }
        tracing::info!(token, "team not found");
        None
    }

    async fn run_step(
        &self,
        step: LookupStep,
        token: &str,
        needle: &str,
    ) -> Result<Option<String>, StatsError> {
        let competitors = match step.filter_param() {
            Some(param) => self.client.list_competitors(&[(param, token)]).await?,
            None => self.client.list_competitors(&[]).await?,
        };
        Ok(competitors
            .into_iter()
            .find(|c| step.matches(c, needle))
            .map(|c| c.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonHit {
    pub season_id: String,
    pub year: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SeasonResolver {
    client: StatsClient,
}

impl SeasonResolver {
    pub fn new(client: StatsClient) -> Self {
        Self { client }
    }

    async fn embedded_season(&self, team_id: &str) -> Result<Option<SeasonHit>, StatsError> {
        let competitors = self
            .client
            .list_competitors(&[("id", team_id), ("include_season", "true")])
            .await?;
        Ok(competitors
            .into_iter()
            .next()
            .and_then(|c| c.season)
            .map(|s| SeasonHit {
                season_id: s.special_id,
                year: s.year,
            }))
    }

    /// Season the provider embeds on the competitor record. Single query.
    pub async fn latest_season(&self, team_id: &str) -> Option<SeasonHit> {
        match self.embedded_season(team_id).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::debug!(team_id, error = %err, "latest season lookup failed");
                None
            }
        }
    }

    /// Season of `team_id` for calendar `year`: the embedded season when its
    /// year matches, otherwise the first season of that year listing the team.
    pub async fn season_for_year(&self, team_id: &str, year: i64) -> Option<String> {
        match self.embedded_season(team_id).await {
            Ok(Some(hit)) if hit.year == Some(year) => return Some(hit.season_id),
            Ok(_) => {}
            Err(err) => tracing::debug!(team_id, year, error = %err, "embedded season lookup failed"),
        }

        let year_param = year.to_string();
        match self
            .client
            .list_seasons(&[("year", year_param.as_str()), ("include_competitors", "true")])
            .await
        {
            Ok(seasons) => seasons
                .into_iter()
                .find(|s| s.lists_team(team_id))
                .map(|s| s.special_id),
            Err(err) => {
                tracing::debug!(team_id, year, error = %err, "season scan by year failed");
                None
            }
        }
    }

    /// All seasons listing `team_id`, most recent year first. Seasons without
    /// a year sort last.
    pub async fn seasons_by_recency(&self, team_id: &str) -> Vec<SeasonHit> {
        let mut seasons = match self
            .client
            .list_seasons(&[("include_competitors", "true")])
            .await
        {
            Ok(seasons) => seasons,
            Err(err) => {
                tracing::debug!(team_id, error = %err, "season recency scan failed");
                return Vec::new();
            }
        };
        seasons.sort_by_key(|s| Reverse(s.year.unwrap_or(0)));
        seasons
            .into_iter()
            .filter(|s| s.lists_team(team_id))
            .map(|s| SeasonHit {
                season_id: s.special_id,
                year: s.year,
            })
            .collect()
    }
}
