pub mod knowledge_loader;

pub use knowledge_loader::{load_knowledge_entries, load_knowledge_entry, KnowledgeDocument, KnowledgeEntry};
