use serde::{Deserialize, Serialize};

/// Normalized playing position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    GK,
    CB,
    LB,
    RB,
    DM,
    CM,
    AM,
    LW,
    RW,
    ST,
    MF,
}

/// Keyword table for free-text labels, most specific keywords first
const POSITION_KEYWORDS: &[(&str, Position)] = &[
    ("goalkeeper", Position::GK),
    ("attacking midfielder", Position::AM),
    ("defensive midfielder", Position::DM),
    ("centre back", Position::CB),
    ("center back", Position::CB),
    ("right back", Position::RB),
    ("left back", Position::LB),
    ("left winger", Position::LW),
    ("winger", Position::RW),
    ("striker", Position::ST),
    ("defender", Position::CB),
    ("midfielder", Position::CM),
    ("forward", Position::ST),
];

impl Position {
    /// Map a free-text label ("Centre-back", "attacking midfielder") to a
    /// position. The first keyword contained in the label wins; unknown
    /// labels are midfielders.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase().replace('-', " ");

        POSITION_KEYWORDS
            .iter()
            .find(|(keyword, _)| label.contains(keyword))
            .map(|(_, position)| *position)
            .unwrap_or(Position::MF)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::GK => "GK",
            Position::CB => "CB",
            Position::LB => "LB",
            Position::RB => "RB",
            Position::DM => "DM",
            Position::CM => "CM",
            Position::AM => "AM",
            Position::LW => "LW",
            Position::RW => "RW",
            Position::ST => "ST",
            Position::MF => "MF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let position = match s {
            "GK" => Position::GK,
            "CB" => Position::CB,
            "LB" => Position::LB,
            "RB" => Position::RB,
            "DM" => Position::DM,
            "CM" => Position::CM,
            "AM" => Position::AM,
            "LW" => Position::LW,
            "RW" => Position::RW,
            "ST" => Position::ST,
            "MF" => Position::MF,
            _ => return None,
        };
        Some(position)
    }
}

/// A stored player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: Option<Position>,
    pub nationality: String,
    /// None = unassigned
    pub team_id: Option<i64>,
    pub date_of_birth: Option<String>,
    pub image_url: Option<String>,
    pub market_value: Option<f64>,
    pub wikidata_id: Option<String>,
}

/// Fields offered by a sync for inserting or filling a player row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpsert {
    pub name: String,
    pub nationality: String,
    pub position: Option<Position>,
    pub team_id: Option<i64>,
    pub date_of_birth: Option<String>,
    pub image_url: Option<String>,
    pub wikidata_id: Option<String>,
    /// Overwrite an existing team assignment instead of only filling a null one
    pub force_team: bool,
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Position::from_label("goalkeeper"), Position::GK);
        assert_eq!(Position::from_label("Centre-back"), Position::CB);
        assert_eq!(Position::from_label("left-back"), Position::LB);
        assert_eq!(Position::from_label("right back"), Position::RB);
        assert_eq!(Position::from_label("attacking midfielder"), Position::AM);
        assert_eq!(Position::from_label("defensive midfielder"), Position::DM);
        assert_eq!(Position::from_label("midfielder"), Position::CM);
        assert_eq!(Position::from_label("winger"), Position::RW);
        assert_eq!(Position::from_label("forward"), Position::ST);
        assert_eq!(Position::from_label("defender"), Position::CB);
    }

    #[test]
    fn test_from_label_defaults_to_midfielder() {
        assert_eq!(Position::from_label("Unknown"), Position::MF);
        assert_eq!(Position::from_label(""), Position::MF);
    }

    #[test]
    fn test_parse_as_str() {
        for p in [Position::GK, Position::DM, Position::LW, Position::MF] {
            assert_eq!(Position::parse(p.as_str()), Some(p));
        }
        assert_eq!(Position::parse("XX"), None);
    }
}
