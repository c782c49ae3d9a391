pub mod football;
pub mod wikidata;

pub use football::{
    ApiFootballClient, Fixture, FixtureQuery, FootballApi, Lineup, PlayerQuery, PlayerRecord,
    TeamSearchResult,
};
pub use wikidata::{PlayerSource, WikidataClient, WikidataPlayer};
