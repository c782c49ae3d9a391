use serde::{Deserialize, Serialize};

/// External data provider that assigns its own identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Wikidata,
    ApiFootball,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Wikidata => "wikidata",
            Source::ApiFootball => "api_football",
        }
    }

    /// Column holding this source's identifier on teams/leagues
    pub fn column(&self) -> &'static str {
        match self {
            Source::Wikidata => "wikidata_id",
            Source::ApiFootball => "api_football_id",
        }
    }
}

/// Identifier assigned by an external provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalId {
    /// Wikidata entity id, e.g. "Q193910"
    Wikidata(String),
    /// API-Football numeric id
    ApiFootball(i64),
}

impl ExternalId {
    pub fn source(&self) -> Source {
        match self {
            ExternalId::Wikidata(_) => Source::Wikidata,
            ExternalId::ApiFootball(_) => Source::ApiFootball,
        }
    }

    /// Value as stored in the source's column
    pub fn value(&self) -> String {
        match self {
            ExternalId::Wikidata(qid) => qid.clone(),
            ExternalId::ApiFootball(id) => id.to_string(),
        }
    }
}

/// Which identity table a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Team,
    League,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Team => "team",
            IdentityKind::League => "league",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            IdentityKind::Team => "teams",
            IdentityKind::League => "leagues",
        }
    }
}

/// The identity-relevant columns of a team or league row
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRow {
    pub id: i64,
    pub name: String,
    pub short_name: Option<String>,
    pub wikidata_id: Option<String>,
    pub api_football_id: Option<i64>,
}

impl IdentityRow {
    /// Identifier this row carries for `source`, if any
    pub fn external_id(&self, source: Source) -> Option<ExternalId> {
        match source {
            Source::Wikidata => self.wikidata_id.clone().map(ExternalId::Wikidata),
            Source::ApiFootball => self.api_football_id.map(ExternalId::ApiFootball),
        }
    }

    /// False when the row already holds a different id for the same source,
    /// meaning it is known to be another club
    pub fn compatible_with(&self, external_id: Option<&ExternalId>) -> bool {
        match external_id {
            None => true,
            Some(ext) => match self.external_id(ext.source()) {
                None => true,
                Some(stored) => &stored == ext,
            },
        }
    }
}

/// A name (plus optional provider id) to be mapped onto a stored row
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub external_id: Option<ExternalId>,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(api_id: Option<i64>) -> IdentityRow {
        IdentityRow {
            id: 1,
            name: "Al-Hilal Saudi FC".to_string(),
            short_name: None,
            wikidata_id: Some("Q193910".to_string()),
            api_football_id: api_id,
        }
    }

    #[test]
    fn test_compatible_with() {
        assert!(row(None).compatible_with(Some(&ExternalId::ApiFootball(2932))));
        assert!(row(Some(2932)).compatible_with(Some(&ExternalId::ApiFootball(2932))));
        assert!(!row(Some(2932)).compatible_with(Some(&ExternalId::ApiFootball(1029))));
        assert!(!row(None).compatible_with(Some(&ExternalId::Wikidata("Q1".to_string()))));
        assert!(row(Some(1)).compatible_with(None));
    }
}
