pub mod browser_pool;
pub mod cache_store;
pub mod js_executor;

pub use browser_pool::{BrowserPool, BrowserSource};
pub use cache_store::{normalize_key, CacheStats, CacheStore};
pub use js_executor::JsExecutor;
