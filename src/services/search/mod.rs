//! 多引擎搜索

pub mod aggregator;
pub mod provider;

pub use aggregator::{build_queries, dedup_and_rank, SearchAggregator, SearchOptions};
pub use provider::{HttpSearchProvider, SearchProvider, StaticSearchProvider};
