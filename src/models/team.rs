use serde::{Deserialize, Serialize};

use super::identity::ExternalId;

/// A competition row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub wikidata_id: Option<String>,
    pub api_football_id: Option<i64>,
}

/// A club row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub logo: Option<String>,
    pub league_id: Option<i64>,
    pub wikidata_id: Option<String>,
    pub api_football_id: Option<i64>,
}

/// League as described by an external source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeagueInfo {
    pub name: String,
    pub external_id: Option<ExternalId>,
    pub country: Option<String>,
    pub logo: Option<String>,
}

/// Team as described by an external source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeamInfo {
    pub name: String,
    pub external_id: Option<ExternalId>,
    pub logo: Option<String>,
    /// League the source places the team in, created on demand
    pub league: Option<LeagueInfo>,
}

impl TeamInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Short display code: first three alphanumerics, upper-cased
pub fn short_code(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .take(3)
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code() {
        assert_eq!(short_code("Al-Hilal Saudi FC"), "ALH");
        assert_eq!(short_code("PSG"), "PSG");
        assert_eq!(short_code(""), "");
    }
}
