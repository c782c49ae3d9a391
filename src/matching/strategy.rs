use super::aliases::AliasTable;
use super::normalize::normalize_name;
use crate::models::{Candidate, IdentityRow};

/// Shortest normalized key allowed to take part in a containment match
const MIN_CONTAINED_LEN: usize = 4;

/// Result of one strategy over a set of rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(i64),
    /// Several rows fit equally well; the strategy refuses to pick
    Ambiguous(Vec<i64>),
    NoMatch,
}

/// One step of identity resolution. Rows arrive in ascending id order.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn find(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Outcome;
}

/// Row already carrying the candidate's id for that source
pub struct ExactExternalId;

impl MatchStrategy for ExactExternalId {
    fn name(&self) -> &'static str {
        "exact_external_id"
    }

    fn find(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Outcome {
        let Some(ext) = &candidate.external_id else {
            return Outcome::NoMatch;
        };

        rows.iter()
            .find(|row| row.external_id(ext.source()).as_ref() == Some(ext))
            .map(|row| Outcome::Found(row.id))
            .unwrap_or(Outcome::NoMatch)
    }
}

/// Case-insensitive equality on name or short name, first row wins
pub struct ExactName;

impl MatchStrategy for ExactName {
    fn name(&self) -> &'static str {
        "exact_name"
    }

    fn find(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Outcome {
        let wanted = candidate.name.trim().to_lowercase();
        if wanted.is_empty() {
            return Outcome::NoMatch;
        }

        rows.iter()
            .find(|row| {
                row.name.trim().to_lowercase() == wanted
                    || row
                        .short_name
                        .as_deref()
                        .is_some_and(|short| short.trim().to_lowercase() == wanted)
            })
            .map(|row| Outcome::Found(row.id))
            .unwrap_or(Outcome::NoMatch)
    }
}

/// Normalized candidate contains a stored name or vice versa.
/// Only a single matching row is accepted.
pub struct Substring;

impl MatchStrategy for Substring {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn find(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Outcome {
        let key = normalize_name(&candidate.name);
        if key.is_empty() {
            return Outcome::NoMatch;
        }

        let ids: Vec<i64> = rows
            .iter()
            .filter(|row| contains_either(&key, &normalize_name(&row.name)))
            .map(|row| row.id)
            .collect();

        unique(ids)
    }
}

/// Retry containment against the known variants of a club whose name is
/// listed in the alias table
pub struct AliasVariants {
    table: AliasTable,
}

impl AliasVariants {
    pub fn new(table: AliasTable) -> Self {
        Self { table }
    }
}

impl MatchStrategy for AliasVariants {
    fn name(&self) -> &'static str {
        "alias_table"
    }

    fn find(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Outcome {
        let key = normalize_name(&candidate.name);
        if key.is_empty() {
            return Outcome::NoMatch;
        }

        let mut ambiguous: Vec<i64> = Vec::new();

        for variant in self.table.variants_for(&key) {
            let ids: Vec<i64> = rows
                .iter()
                .filter(|row| normalize_name(&row.name).contains(variant))
                .map(|row| row.id)
                .collect();

            match unique(ids) {
                Outcome::Found(id) => return Outcome::Found(id),
                Outcome::Ambiguous(ids) => {
                    for id in ids {
                        if !ambiguous.contains(&id) {
                            ambiguous.push(id);
                        }
                    }
                }
                Outcome::NoMatch => {}
            }
        }

        if ambiguous.is_empty() {
            Outcome::NoMatch
        } else {
            Outcome::Ambiguous(ambiguous)
        }
    }
}

/// Default order: exact id, exact name, substring, alias table
pub fn default_strategies(aliases: AliasTable) -> Vec<Box<dyn MatchStrategy>> {
    vec![
        Box::new(ExactExternalId),
        Box::new(ExactName),
        Box::new(Substring),
        Box::new(AliasVariants::new(aliases)),
    ]
}

fn contains_either(a: &str, b: &str) -> bool {
    if a.len() < MIN_CONTAINED_LEN || b.len() < MIN_CONTAINED_LEN {
        return a == b && !a.is_empty();
    }
    a.contains(b) || b.contains(a)
}

fn unique(ids: Vec<i64>) -> Outcome {
    match ids.len() {
        0 => Outcome::NoMatch,
        1 => Outcome::Found(ids[0]),
        _ => Outcome::Ambiguous(ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExternalId;

    fn row(id: i64, name: &str) -> IdentityRow {
        IdentityRow {
            id,
            name: name.to_string(),
            short_name: None,
            wikidata_id: None,
            api_football_id: None,
        }
    }

    #[test]
    fn test_exact_external_id() {
        let mut rows = vec![row(1, "Al-Hilal"), row(2, "Al Hilal Saudi FC")];
        rows[1].api_football_id = Some(2932);

        let candidate = Candidate::new("Whatever").with_external_id(ExternalId::ApiFootball(2932));
        assert_eq!(ExactExternalId.find(&candidate, &rows), Outcome::Found(2));

        let other = Candidate::new("Al-Hilal").with_external_id(ExternalId::Wikidata("Q1".into()));
        assert_eq!(ExactExternalId.find(&other, &rows), Outcome::NoMatch);
        assert_eq!(ExactExternalId.find(&Candidate::new("Al-Hilal"), &rows), Outcome::NoMatch);
    }

    #[test]
    fn test_exact_name_matches_name_or_short_name() {
        let mut rows = vec![row(1, "Paris Saint-Germain"), row(2, "Olympique de Marseille")];
        rows[1].short_name = Some("OM".to_string());

        assert_eq!(
            ExactName.find(&Candidate::new("paris saint-germain"), &rows),
            Outcome::Found(1)
        );
        assert_eq!(ExactName.find(&Candidate::new("om"), &rows), Outcome::Found(2));
        assert_eq!(ExactName.find(&Candidate::new("PSG"), &rows), Outcome::NoMatch);
    }

    #[test]
    fn test_exact_name_takes_lowest_id() {
        let rows = vec![row(3, "Raja CA"), row(7, "raja ca")];
        assert_eq!(ExactName.find(&Candidate::new("RAJA CA"), &rows), Outcome::Found(3));
    }

    #[test]
    fn test_substring_both_directions() {
        let rows = vec![row(1, "Al-Hilal Saudi FC"), row(2, "Wydad AC")];

        assert_eq!(Substring.find(&Candidate::new("Al Hilal"), &rows), Outcome::Found(1));
        assert_eq!(
            Substring.find(&Candidate::new("Wydad AC Casablanca"), &rows),
            Outcome::Found(2)
        );
    }

    #[test]
    fn test_substring_refuses_to_guess() {
        let rows = vec![row(1, "Al-Hilal Saudi FC"), row(2, "Al Hilal Omdurman")];
        assert_eq!(
            Substring.find(&Candidate::new("Al Hilal"), &rows),
            Outcome::Ambiguous(vec![1, 2])
        );
    }

    #[test]
    fn test_substring_ignores_short_and_empty_keys() {
        let rows = vec![row(1, "FC"), row(2, "Real Madrid")];
        assert_eq!(Substring.find(&Candidate::new("FC Porto"), &rows), Outcome::NoMatch);
        assert_eq!(Substring.find(&Candidate::new(" - "), &rows), Outcome::NoMatch);
    }

    #[test]
    fn test_alias_variants() {
        let rows = vec![row(1, "Wydad AC"), row(2, "Al-Hilal Saudi FC")];
        let strategy = AliasVariants::new(AliasTable::builtin());

        // Neither contains the other once normalized
        let candidate = Candidate::new("Al Hilal FC");
        assert_eq!(Substring.find(&candidate, &rows), Outcome::NoMatch);
        assert_eq!(strategy.find(&candidate, &rows), Outcome::Found(2));

        assert_eq!(strategy.find(&Candidate::new("Raja CA"), &rows), Outcome::NoMatch);
        // Containing a fragment is not enough to be a known spelling
        assert_eq!(
            strategy.find(&Candidate::new("Al Hilal Omdurman"), &rows),
            Outcome::NoMatch
        );
    }

    #[test]
    fn test_alias_variants_prefers_specific_variant() {
        let rows = vec![row(1, "Al Hilal Omdurman"), row(2, "Al Hilal Saudi FC")];
        let strategy = AliasVariants::new(AliasTable::builtin());

        assert_eq!(strategy.find(&Candidate::new("Al-Hilal"), &rows), Outcome::Found(2));
    }
}
