pub mod api_players;
pub mod team_mapping;
pub mod wikidata;

pub use api_players::{ApiPlayerSync, ApiPlayerSyncState};
pub use team_mapping::TeamMapper;
pub use wikidata::{RetryPolicy, WikidataPlayerSync, WikidataSyncState};
