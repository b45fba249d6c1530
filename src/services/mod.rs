pub mod confidence;
pub mod extractor;
pub mod knowledge_base;
pub mod llm_predictor;
pub mod scraper;
pub mod search;
pub mod validation;

pub use extractor::RequirementExtractor;
pub use knowledge_base::{CuratedKnowledgeBase, ExamFamily, KnowledgeBase};
pub use llm_predictor::{LlmPredictor, Prediction, RequirementPredictor};
pub use scraper::{
    ChromiumRenderer, FetchedPage, HtmlTextExtractor, HttpFetcher, PageFetcher, PageLink, PageRenderer,
    RenderedPage, ScrapeOptions, ScrapingResult, TextExtractor, WebScraper,
};
pub use search::{HttpSearchProvider, SearchAggregator, SearchOptions, SearchProvider, StaticSearchProvider};
pub use validation::{RuleValidator, ValidationLayer};
