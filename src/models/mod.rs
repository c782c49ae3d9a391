pub mod fixture;
pub mod identity;
pub mod player;
pub mod report;
pub mod team;
pub mod transfer;

pub use fixture::{api_football_match_id, Match, MatchStatus, MatchUpsert};
pub use identity::{Candidate, ExternalId, IdentityKind, IdentityRow, Source};
pub use player::{Player, PlayerUpsert, Position, UpsertOutcome};
pub use report::SyncReport;
pub use team::{League, LeagueInfo, Team, TeamInfo};
pub use transfer::{Transfer, TransferType};
