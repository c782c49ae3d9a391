pub mod fixture_sync;

pub use fixture_sync::FixtureSyncWorker;
