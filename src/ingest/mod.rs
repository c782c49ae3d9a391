pub mod fixtures;
pub mod linker;

pub use fixtures::{FixtureBatchState, FixtureIngestor};
pub use linker::PlayerMatchLinker;
