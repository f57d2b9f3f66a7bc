pub mod engine;
pub mod stats;

pub use engine::{RelayEngine, RelayEngineBuilder};
pub use stats::{RelayStats, StatsSnapshot};
