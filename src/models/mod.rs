pub mod discovery;
pub mod loaders;
pub mod requirement;
pub mod source;

pub use discovery::{
    normalize_key, DiscoveryContext, DiscoveryMetadata, DiscoveryRequest, DiscoveryResult,
    LayerKind,
};
pub use loaders::{load_knowledge_entries, KnowledgeEntry};
pub use requirement::{
    merge_requirements, parse_size_bytes, DimensionConstraints, ProcessingConstraints,
    Requirement, RequirementKind, SizeConstraints,
};
pub use source::{classify_source, dedup_sources, is_official_domain, SourceClassification, SourceInfo};
