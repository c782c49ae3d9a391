use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::normalize::normalize_name;

/// Alias file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAliases {
    pub aliases: Vec<TeamAliasEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAliasEntry {
    /// Ambiguous name fragment, e.g. "al hilal"
    pub fragment: String,
    /// Known spellings of the club the fragment refers to, most specific first
    pub variants: Vec<String>,
}

/// Fragment -> known variants, kept as normalized keys
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<(String, Vec<String>)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clubs that show up under several spellings across sources
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for variant in ["al hilal saudi fc", "al hilal fc", "al-hilal"] {
            table.add_alias("al hilal", variant);
        }
        for variant in ["al ahli jeddah", "al-ahli jeddah", "al ahli fc", "al-ahli"] {
            table.add_alias("al ahli", variant);
        }
        for variant in ["al ittihad fc", "al-ittihad"] {
            table.add_alias("al ittihad", variant);
        }
        table
    }

    /// Built-in table extended with the entries of a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read team aliases file")?;

        let file: TeamAliases =
            serde_json::from_str(&content).context("Failed to parse team aliases JSON")?;

        let mut table = Self::builtin();
        for entry in file.aliases {
            for variant in &entry.variants {
                table.add_alias(&entry.fragment, variant);
            }
        }

        info!("Loaded {} team alias fragments", table.len());
        Ok(table)
    }

    /// Add a variant for a fragment
    pub fn add_alias(&mut self, fragment: &str, variant: &str) {
        let fragment = normalize_name(fragment);
        let variant = normalize_name(variant);
        if fragment.is_empty() || variant.is_empty() {
            return;
        }

        match self.entries.iter_mut().find(|(f, _)| *f == fragment) {
            Some((_, variants)) => {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
            None => self.entries.push((fragment, vec![variant])),
        }
    }

    /// Variants of every entry the normalized name is a known spelling of,
    /// either the fragment itself or one of its variants
    pub fn variants_for(&self, normalized_name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(fragment, variants)| {
                fragment == normalized_name || variants.iter().any(|v| v == normalized_name)
            })
            .flat_map(|(_, variants)| variants.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_variants() {
        let table = AliasTable::builtin();
        let variants = table.variants_for(&normalize_name("Al Hilal"));
        assert_eq!(variants, vec!["alhilalsaudifc", "alhilalfc", "alhilal"]);
        assert!(table.variants_for("rajaca").is_empty());
    }

    #[test]
    fn test_add_alias_dedupes() {
        let mut table = AliasTable::new();
        table.add_alias("Raja", "Raja CA");
        table.add_alias("raja", "raja ca");
        table.add_alias("raja", "");
        assert_eq!(table.len(), 1);
        assert_eq!(table.variants_for("raja"), vec!["rajaca"]);
        assert!(table.variants_for("rajacasablanca").is_empty());
    }

    #[test]
    fn test_load_from_file_extends_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"aliases": [{{"fragment": "wydad", "variants": ["Wydad AC", "Wydad Casablanca"]}}]}}"#
        )
        .unwrap();

        let table = AliasTable::load_from_file(file.path()).unwrap();
        assert_eq!(table.len(), AliasTable::builtin().len() + 1);
        assert_eq!(
            table.variants_for("wydadcasablanca"),
            vec!["wydadac", "wydadcasablanca"]
        );
    }
}
