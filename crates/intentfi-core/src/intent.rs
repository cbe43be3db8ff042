//! Regex intent classification over French chat text.
//!
//! Rules run in a fixed priority order against the lower-cased message and
//! the first rule producing an [`Intent`] wins. Team tokens are reported in
//! the user's own casing whenever that can be recovered from the original
//! text.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static RECENT_STATS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"stat[s]? (?:les plus récentes|actuelle[s]?|du moment|derni[eè]re[s]?) (?:du|de|d'|de l'|de la|des)?\s*([\w\d\s'-]+)",
    )
    .expect("recent stats pattern")
});

static STATS_BY_SEASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"stat[s]?\s*(?:du|de|d'|de l'|de la|de les|des)?\s*([\w\d\s'-]+?)\s*(?:équipe)?\s*saison\s*(\d+)",
    )
    .expect("stats by season pattern")
});

static STATS_BY_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"stat[s]?\s*(?:du|de|d'|de l'|de la|de les|des)?\s*([\w\d\s'-]+?)\s*(?:équipe)?\s*(?:en|pour|année|an)\s*(\d{4})",
    )
    .expect("stats by year pattern")
});

static LEGACY_STATS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"équipe\s*([\w\d\s]+).*saison\s*(\d+)").expect("legacy stats pattern")
});

static NEXT_MATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"prochain match (?:du|de|d'|de l'|de la|des)?\s*([\w\d\s'-]+)")
        .expect("next match pattern")
});

static SEASON_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"saison\s*(\d+)").expect("season number pattern"));

/// Team reference as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamRef {
    /// All-digit token, used as the provider id directly
    Id(String),
    Name(String),
}

impl TeamRef {
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            Some(Self::Id(token.to_string()))
        } else {
            Some(Self::Name(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Name(s) => s,
        }
    }
}

impl fmt::Display for TeamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    RecentStats { team: TeamRef },
    StatsBySeason { team: TeamRef, season: String },
    StatsByYear { team: TeamRef, year: i64 },
    LegacyStatsBySeason { team: TeamRef, season: String },
    NextMatch { team: TeamRef },
    UpcomingMatchesBySeason { season: Option<String> },
    Unmatched,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecentStats { .. } => "recent_stats",
            Self::StatsBySeason { .. } => "stats_by_season",
            Self::StatsByYear { .. } => "stats_by_year",
            Self::LegacyStatsBySeason { .. } => "legacy_stats_by_season",
            Self::NextMatch { .. } => "next_match",
            Self::UpcomingMatchesBySeason { .. } => "upcoming_matches_by_season",
            Self::Unmatched => "unmatched",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trim {
    Whitespace,
    /// Whitespace plus hyphens and apostrophes
    Punctuation,
}

/// A message prepared for matching.
pub struct Utterance<'a> {
    original: &'a str,
    lower: String,
}

impl<'a> Utterance<'a> {
    pub fn new(original: &'a str) -> Self {
        Self {
            original,
            lower: original.to_lowercase(),
        }
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    fn team(&self, caps: &Captures<'_>, group: usize, trim: Trim) -> Option<TeamRef> {
        let m = caps.get(group)?;
        let lowered = m.as_str();
        let raw = self
            .original
            .get(m.range())
            .filter(|orig| orig.to_lowercase() == lowered)
            .unwrap_or(lowered);
        let token = match trim {
            Trim::Whitespace => raw.trim(),
            Trim::Punctuation => raw.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '\''),
        };
        TeamRef::parse(token)
    }
}

/// One classification rule: a pure function from message to intent.
pub struct IntentRule {
    pub name: &'static str,
    apply: fn(&Utterance<'_>) -> Option<Intent>,
}

impl IntentRule {
    pub fn apply(&self, utterance: &Utterance<'_>) -> Option<Intent> {
        (self.apply)(utterance)
    }
}

fn recent_stats(u: &Utterance<'_>) -> Option<Intent> {
    let caps = RECENT_STATS_RE.captures(u.lower())?;
    Some(Intent::RecentStats {
        team: u.team(&caps, 1, Trim::Punctuation)?,
    })
}

fn stats_by_season(u: &Utterance<'_>) -> Option<Intent> {
    let caps = STATS_BY_SEASON_RE.captures(u.lower())?;
    Some(Intent::StatsBySeason {
        team: u.team(&caps, 1, Trim::Punctuation)?,
        season: caps[2].to_string(),
    })
}

fn stats_by_year(u: &Utterance<'_>) -> Option<Intent> {
    let caps = STATS_BY_YEAR_RE.captures(u.lower())?;
    Some(Intent::StatsByYear {
        team: u.team(&caps, 1, Trim::Punctuation)?,
        year: caps[2].parse().ok()?,
    })
}

fn legacy_stats(u: &Utterance<'_>) -> Option<Intent> {
    let caps = LEGACY_STATS_RE.captures(u.lower())?;
    Some(Intent::LegacyStatsBySeason {
        team: u.team(&caps, 1, Trim::Whitespace)?,
        season: caps[2].to_string(),
    })
}

fn next_match(u: &Utterance<'_>) -> Option<Intent> {
    let caps = NEXT_MATCH_RE.captures(u.lower())?;
    Some(Intent::NextMatch {
        team: u.team(&caps, 1, Trim::Punctuation)?,
    })
}

fn upcoming_by_season(u: &Utterance<'_>) -> Option<Intent> {
    let text = u.lower();
    let wants_upcoming =
        text.contains("prochain") || text.contains("à venir") || text.contains("upcoming");
    if !(wants_upcoming && text.contains("match") && text.contains("saison")) {
        return None;
    }
    Some(Intent::UpcomingMatchesBySeason {
        season: SEASON_NUMBER_RE
            .captures(text)
            .map(|caps| caps[1].to_string()),
    })
}

pub static RULES: [IntentRule; 6] = [
    IntentRule { name: "recent_stats", apply: recent_stats },
    IntentRule { name: "stats_by_season", apply: stats_by_season },
    IntentRule { name: "stats_by_year", apply: stats_by_year },
    IntentRule { name: "legacy_stats_by_season", apply: legacy_stats },
    IntentRule { name: "next_match", apply: next_match },
    IntentRule { name: "upcoming_matches_by_season", apply: upcoming_by_season },
];

pub fn classify(text: &str) -> Intent {
    let utterance = Utterance::new(text);
    RULES
        .iter()
        .find_map(|rule| {
            let intent = rule.apply(&utterance)?;
            tracing::debug!(rule = rule.name, "intent rule matched");
            Some(intent)
        })
        .unwrap_or(Intent::Unmatched)
}
