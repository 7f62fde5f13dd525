pub mod cache;
pub mod client;
pub mod parse;
pub mod provider;

pub use cache::TtlCache;
pub use client::MlbStatsApi;
pub use provider::StatsSource;
