use anyhow::Result;
use intentfi_provider::create_provider;
use intentfi_stats::{SeasonResolver, StatsClient, TeamResolver};

use crate::config::IntentfiConfig;
use crate::fallback::FallbackResponder;
use crate::format::{self, StatsScope};
use crate::intent::{classify, Intent, TeamRef};

/// Answers classified intents from provider data.
#[derive(Debug, Clone)]
pub struct StatsResponder {
    client: StatsClient,
    teams: TeamResolver,
    seasons: SeasonResolver,
}

impl StatsResponder {
    pub fn new(client: StatsClient) -> Self {
        Self {
            teams: TeamResolver::new(client.clone()),
            seasons: SeasonResolver::new(client.clone()),
            client,
        }
    }

    /// Reply for a matched intent; `None` for [`Intent::Unmatched`].
    pub async fn respond(&self, intent: &Intent) -> Option<String> {
        let reply = match intent {
            Intent::RecentStats { team } => self.recent_stats(team).await,
            Intent::StatsBySeason { team, season } | Intent::LegacyStatsBySeason { team, season } => {
                self.stats_by_season(team, season).await
            }
            Intent::StatsByYear { team, year } => self.stats_by_year(team, *year).await,
            Intent::NextMatch { team } => self.next_match(team).await,
            Intent::UpcomingMatchesBySeason { season } => {
                self.upcoming_matches(season.as_deref()).await
            }
            Intent::Unmatched => return None,
        };
        Some(reply)
    }

    /// Team id for `team`, or the "team not found" reply.
    async fn team_id(&self, team: &TeamRef) -> Result<String, String> {
        match team {
            TeamRef::Id(id) => Ok(id.clone()),
            TeamRef::Name(name) => self
                .teams
                .resolve(name)
                .await
                .ok_or_else(|| format::team_not_found(name)),
        }
    }

    async fn recent_stats(&self, team: &TeamRef) -> String {
        let team_id = match self.team_id(team).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        let label = team.as_str();

        if let Some(hit) = self.seasons.latest_season(&team_id).await {
            let year = display_year(hit.year, &hit.season_id);
            return match self.client.fetch_statistics(&team_id, &hit.season_id).await {
                Ok(stats) => format::statistics(label, StatsScope::Recent { year: &year }, &stats),
                Err(err) => format::stats_error(&err),
            };
        }

        // no embedded season: walk seasons newest first, skipping empty ones
        for hit in self.seasons.seasons_by_recency(&team_id).await {
            match self.client.fetch_statistics(&team_id, &hit.season_id).await {
                Ok(stats) if stats.is_empty() => continue,
                Ok(stats) => {
                    let year = display_year(hit.year, &hit.season_id);
                    return format::statistics(label, StatsScope::Recent { year: &year }, &stats);
                }
                Err(err) => return format::stats_error(&err),
            }
        }

        format::no_statistics_for_team(label)
    }

    async fn stats_by_season(&self, team: &TeamRef, season: &str) -> String {
        let team_id = match self.team_id(team).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        match self.client.fetch_statistics(&team_id, season).await {
            Ok(stats) => format::statistics(team.as_str(), StatsScope::Season { season }, &stats),
            Err(err) => format::stats_error(&err),
        }
    }

    async fn stats_by_year(&self, team: &TeamRef, year: i64) -> String {
        let team_id = match self.team_id(team).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        let Some(season_id) = self.seasons.season_for_year(&team_id, year).await else {
            return format::season_not_found_for_year(team.as_str(), year);
        };
        match self.client.fetch_statistics(&team_id, &season_id).await {
            Ok(stats) => format::statistics(team.as_str(), StatsScope::Year { year }, &stats),
            Err(err) => format::stats_error(&err),
        }
    }

    async fn next_match(&self, team: &TeamRef) -> String {
        let team_id = match self.team_id(team).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };

        let season_id = match self.seasons.latest_season(&team_id).await {
            Some(hit) => Some(hit.season_id),
            None => self
                .seasons
                .seasons_by_recency(&team_id)
                .await
                .into_iter()
                .next()
                .map(|hit| hit.season_id),
        };
        let Some(season_id) = season_id else {
            return format::season_not_found(team.as_str());
        };

        let matches = match self.client.fetch_upcoming_matches(&season_id).await {
            Ok(matches) => matches,
            Err(err) => return format::matches_error(&err),
        };

        let display_name = self
            .client
            .fetch_team_name(&team_id)
            .await
            .unwrap_or_else(|| team.as_str().to_string());

        let next = matches
            .iter()
            .find(|m| m.involves_name(&display_name))
            .or_else(|| matches.iter().find(|m| m.involves_id(&team_id)));
        format::next_match(&display_name, next)
    }

    async fn upcoming_matches(&self, season: Option<&str>) -> String {
        let Some(season) = season else {
            return format::SEASON_HINT.to_string();
        };
        match self.client.fetch_upcoming_matches(season).await {
            Ok(matches) => format::upcoming_matches(season, &matches),
            Err(err) => format::matches_error(&err),
        }
    }
}

fn display_year(year: Option<i64>, season_id: &str) -> String {
    year.map(|y| y.to_string())
        .unwrap_or_else(|| season_id.to_string())
}

/// Full reply path for one message: intent rules first, completion fallback
/// for anything unmatched.
#[derive(Clone)]
pub struct Responder {
    stats: StatsResponder,
    fallback: FallbackResponder,
}

impl Responder {
    pub fn new(stats: StatsResponder, fallback: FallbackResponder) -> Self {
        Self { stats, fallback }
    }

    pub fn from_config(config: &IntentfiConfig) -> Result<Self> {
        let client = StatsClient::with_timeout(&config.stats.base_url, config.stats.timeout_secs);
        let provider = create_provider(&config.llm.provider)?;
        Ok(Self::new(
            StatsResponder::new(client),
            FallbackResponder::new(provider, &config.llm),
        ))
    }

    /// Data-backed reply, or `None` when no intent rule matches.
    pub async fn direct(&self, text: &str) -> Option<String> {
        let intent = classify(text);
        tracing::info!(intent = intent.name(), "message classified");
        self.stats.respond(&intent).await
    }

    pub async fn fallback(&self, text: &str) -> String {
        self.fallback.respond(text).await
    }

    pub async fn answer(&self, text: &str) -> String {
        match self.direct(text).await {
            Some(reply) => reply,
            None => self.fallback(text).await,
        }
    }
}
