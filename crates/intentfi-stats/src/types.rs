use std::fmt;

use serde::{Deserialize, Serialize};

/// `{ "data": [...] }` list wrapper used by the collection endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DataList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub abbreviation: Option<String>,
    /// Present when queried with `include_season=true`
    #[serde(default)]
    pub season: Option<SeasonRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRef {
    #[serde(deserialize_with = "lenient::id")]
    pub special_id: String,
    #[serde(default, deserialize_with = "lenient::opt_year")]
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    #[serde(deserialize_with = "lenient::id")]
    pub special_id: String,
    #[serde(default, deserialize_with = "lenient::opt_year")]
    pub year: Option<i64>,
    #[serde(default)]
    pub competitors: Vec<CompetitorRef>,
}

impl Season {
    pub fn lists_team(&self, team_id: &str) -> bool {
        self.competitors
            .iter()
            .any(|c| c.id.as_deref() == Some(team_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRef {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default)]
    pub competitor: Option<CompetitorStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompetitorStatistics {
    #[serde(default)]
    pub statistics: Vec<Statistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<StatValue>,
}

impl Statistic {
    pub fn new(kind: impl Into<String>, value: impl Into<StatValue>) -> Self {
        Self {
            kind: Some(kind.into()),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(serde_json::Number),
    Text(String),
    Flag(bool),
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        Self::Number(v.into())
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingMatchesResponse {
    #[serde(rename = "upcomingMatches", default)]
    pub upcoming_matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub home_team: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub away_team: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub home_competitor: Option<CompetitorRef>,
    #[serde(default)]
    pub away_competitor: Option<CompetitorRef>,
}

impl MatchRecord {
    pub fn involves_name(&self, name: &str) -> bool {
        self.home_team.as_deref() == Some(name) || self.away_team.as_deref() == Some(name)
    }

    pub fn involves_id(&self, team_id: &str) -> bool {
        [&self.home_competitor, &self.away_competitor]
            .into_iter()
            .flatten()
            .any(|c| c.id.as_deref() == Some(team_id))
    }
}

/// The provider mixes numeric and string encodings for ids and years.
mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    pub(super) fn id<'de, D>(de: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(de)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("invalid identifier: {other}"))),
        }
    }

    pub(super) fn opt_text<'de, D>(de: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(de)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub(super) fn opt_year<'de, D>(de: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(de)? {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }
}
