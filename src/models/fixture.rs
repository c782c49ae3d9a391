use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    /// Map an API-Football short status code. Unknown codes are scheduled.
    pub fn from_api_code(code: &str) -> Self {
        match code {
            "TBD" | "NS" | "PST" => MatchStatus::Scheduled,
            "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE" => MatchStatus::Live,
            "FT" | "AET" | "PEN" | "AWD" | "WO" => MatchStatus::Finished,
            "CANC" | "ABD" => MatchStatus::Cancelled,
            _ => MatchStatus::Scheduled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "live" => MatchStatus::Live,
            "finished" => MatchStatus::Finished,
            "cancelled" => MatchStatus::Cancelled,
            _ => MatchStatus::Scheduled,
        }
    }
}

/// A stored match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Source-prefixed id, e.g. "af-1035037"
    pub id: String,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub league_id: Option<i64>,
    pub kickoff_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub api_football_id: Option<i64>,
}

/// Id of a match sourced from API-Football
pub fn api_football_match_id(fixture_id: i64) -> String {
    format!("af-{}", fixture_id)
}

/// Whether an upsert created or refreshed the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchUpsert {
    Inserted,
    Updated,
}
