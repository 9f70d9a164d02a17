//! Command handlers for the nearest CLI.

pub mod load;
pub mod search;
pub mod stats;

pub use load::LoadCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
