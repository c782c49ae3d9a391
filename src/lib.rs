pub mod api;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod sync;
pub mod workers;
