//! French reply texts.

use intentfi_stats::{MatchRecord, StatsError, Statistic};

pub const UPCOMING_LIST_LIMIT: usize = 5;

pub const EMERGENCY_REPLY: &str = "🤖 IntentFi Agent connecté ! Erreur temporaire, mais je suis là.";
pub const UNREADABLE_COLLABORATOR_REPLY: &str = "Désolé, je n'ai pas compris la réponse de l'IA.";
pub const SEASON_HINT: &str = "Merci de préciser la saison (ex: 'prochains matchs saison 5').";
pub const NO_UPCOMING_FOR_SEASON: &str = "Aucun match à venir trouvé pour cette saison.";

/// How a statistics block is labelled.
#[derive(Debug, Clone, Copy)]
pub enum StatsScope<'a> {
    Recent { year: &'a str },
    Season { season: &'a str },
    Year { year: i64 },
}

pub fn statistics(team: &str, scope: StatsScope<'_>, stats: &[Statistic]) -> String {
    if stats.is_empty() {
        return match scope {
            StatsScope::Recent { year } => {
                format!("Aucune statistique trouvée pour {team} (saison {year}).")
            }
            StatsScope::Season { season } => {
                format!("Aucune statistique trouvée pour {team} (saison {season}).")
            }
            StatsScope::Year { year } => format!("Aucune statistique trouvée pour {team} en {year}."),
        };
    }

    let header = match scope {
        StatsScope::Recent { year } => {
            format!("Statistiques les plus récentes pour l'équipe {team} (saison {year}):")
        }
        StatsScope::Season { season } => {
            format!("Statistiques principales pour l'équipe {team} (saison {season}):")
        }
        StatsScope::Year { year } => format!("Statistiques principales pour l'équipe {team} en {year}:"),
    };

    let mut lines = Vec::with_capacity(stats.len() + 1);
    lines.push(header);
    for stat in stats {
        let kind = stat.kind.as_deref().unwrap_or("Type inconnu");
        let value = stat
            .value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!("- {kind}: {value}"));
    }
    lines.join("\n")
}

pub fn next_match(team_name: &str, next: Option<&MatchRecord>) -> String {
    match next {
        Some(m) => format!(
            "Prochain match de {team_name}: {} vs {} le {}",
            or_unknown(&m.home_team),
            or_unknown(&m.away_team),
            or_unknown(&m.start_time)
        ),
        None => format!("Aucun match à venir trouvé pour {team_name}."),
    }
}

pub fn upcoming_matches(season: &str, matches: &[MatchRecord]) -> String {
    if matches.is_empty() {
        return NO_UPCOMING_FOR_SEASON.to_string();
    }
    let mut lines = vec![format!("Matchs à venir pour la saison {season}:")];
    lines.extend(matches.iter().take(UPCOMING_LIST_LIMIT).map(|m| {
        format!(
            "- {} vs {} le {}",
            or_unknown(&m.home_team),
            or_unknown(&m.away_team),
            or_unknown(&m.start_time)
        )
    }));
    lines.join("\n")
}

fn or_unknown(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("?")
}

pub fn team_not_found(team: &str) -> String {
    format!("Impossible de trouver l'équipe '{team}'. Vérifie le nom.")
}

pub fn season_not_found_for_year(team: &str, year: i64) -> String {
    format!("Impossible de trouver la saison {year} pour l'équipe '{team}'.")
}

pub fn season_not_found(team: &str) -> String {
    format!("Impossible de trouver la saison pour l'équipe '{team}'.")
}

pub fn no_statistics_for_team(team: &str) -> String {
    format!("Aucune statistique trouvée pour l'équipe '{team}'.")
}

pub fn stats_error(err: &StatsError) -> String {
    format!("Erreur lors de la récupération des stats: {err}")
}

pub fn matches_error(err: &StatsError) -> String {
    format!("Erreur lors de la récupération des matchs: {err}")
}

pub fn completion_error(err: &anyhow::Error) -> String {
    format!("Erreur lors de l'appel au modèle de langage: {err}")
}
