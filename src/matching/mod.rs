pub mod aliases;
pub mod consolidate;
pub mod normalize;
pub mod players;
pub mod strategy;
pub mod team_resolver;

pub use aliases::AliasTable;
pub use consolidate::{consolidate, ConsolidationPlan, ConsolidationReport};
pub use normalize::normalize_name;
pub use players::{find_unique_player, same_person};
pub use strategy::{default_strategies, MatchStrategy, Outcome};
pub use team_resolver::{Decision, Resolution, TeamResolver};
