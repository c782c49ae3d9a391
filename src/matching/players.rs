use super::normalize::normalize_name;
use crate::models::Player;

/// Whether a source name refers to a stored full name.
///
/// Equal keys match. An abbreviated source name ("A. Hakimi") matches a full
/// name that starts with the initial and ends with the surname.
pub fn same_person(source_name: &str, full_name: &str) -> bool {
    let full = normalize_name(full_name);
    if full.is_empty() {
        return false;
    }
    if normalize_name(source_name) == full {
        return true;
    }

    let Some((initial, surname)) = source_name.split_once(". ") else {
        return false;
    };
    let initial = normalize_name(initial);
    let surname = normalize_name(surname);

    !initial.is_empty()
        && !surname.is_empty()
        && full.len() > surname.len()
        && full.starts_with(&initial)
        && full.ends_with(&surname)
}

/// The single player any of `names` refers to. Exact keys are tried before
/// abbreviations; more than one candidate is no match.
pub fn find_unique_player<'a>(players: &'a [Player], names: &[&str]) -> Option<&'a Player> {
    let keys: Vec<String> = names
        .iter()
        .map(|n| normalize_name(n))
        .filter(|k| !k.is_empty())
        .collect();

    let exact: Vec<&Player> = players
        .iter()
        .filter(|p| keys.contains(&normalize_name(&p.name)))
        .collect();
    match exact.as_slice() {
        [one] => return Some(*one),
        [] => {}
        _ => return None,
    }

    let abbreviated: Vec<&Player> = players
        .iter()
        .filter(|p| names.iter().any(|n| same_person(n, &p.name)))
        .collect();
    match abbreviated.as_slice() {
        [one] => Some(*one),
        _ => None,
    }
}
