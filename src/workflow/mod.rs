pub mod layer_ctx;
pub mod layers;

pub use layer_ctx::LayerContext;
pub use layers::{CacheLayer, KnowledgeLayer, Layer, MlLayer, ScrapeLayer, ScrapeLayerOptions, SearchLayer};
