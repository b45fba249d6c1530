//! 级联中的各层 - 流程层
//!
//! 每一层把一种能力（缓存 / 知识库 / 搜索 / 抓取 / 推断）包装成统一的 `Layer`：
//! - 有结果返回 `Ok(Some(..))`，没有结果返回 `Ok(None)`
//! - 出错直接返回 `Err`，由 DiscoveryManager 记录并继续下一层
//! - 不写缓存，不决定是否停止

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::infrastructure::CacheStore;
use crate::models::{dedup_sources, DiscoveryRequest, DiscoveryResult, LayerKind, SourceInfo};
use crate::services::confidence::{scrape_confidence, search_confidence, PageScore};
use crate::services::search::build_queries;
use crate::services::{
    KnowledgeBase, RequirementExtractor, RequirementPredictor, ScrapeOptions, SearchAggregator, WebScraper,
};
use crate::workflow::LayerContext;

/// 级联中的一层
#[async_trait]
pub trait Layer: Send + Sync {
    fn kind(&self) -> LayerKind;

    /// 尝试为请求产出结果
    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>>;
}

// ========== 缓存层 ==========

/// 只读缓存；写入由 DiscoveryManager 在级联结束时完成
pub struct CacheLayer {
    cache: Arc<CacheStore>,
}

impl CacheLayer {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Layer for CacheLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Cache
    }

    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        let hit = self.cache.get(&request.exam_key());
        if hit.is_some() {
            debug!("[{}] 缓存命中", ctx.exam_name);
        }
        Ok(hit)
    }
}

// ========== 知识库层 ==========

pub struct KnowledgeLayer {
    knowledge_base: Arc<dyn KnowledgeBase>,
}

impl KnowledgeLayer {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }
}

#[async_trait]
impl Layer for KnowledgeLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Knowledge
    }

    async fn attempt(&self, request: &DiscoveryRequest, _ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        self.knowledge_base.find_exam(request).await
    }
}

// ========== 搜索层 ==========

/// 多引擎搜索 + 对标题和摘要运行提取器
///
/// 即使没有提取到要求也返回结果，让找到的来源（尤其是官方网站）传给后续层
pub struct SearchLayer {
    aggregator: Arc<SearchAggregator>,
    extractor: Arc<RequirementExtractor>,
}

impl SearchLayer {
    pub fn new(aggregator: Arc<SearchAggregator>, extractor: Arc<RequirementExtractor>) -> Self {
        Self { aggregator, extractor }
    }
}

#[async_trait]
impl Layer for SearchLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Search
    }

    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        if !self.aggregator.has_providers() {
            debug!("[{}] 未配置搜索提供方，跳过", ctx.exam_name);
            return Ok(None);
        }

        let queries = build_queries(request);
        let results = self.aggregator.multi_search(&queries, &ctx.cancel).await;
        if results.is_empty() {
            return Ok(None);
        }

        let texts: Vec<String> = results
            .iter()
            .map(|r| format!("{}\n{}", r.title, r.snippet))
            .collect();
        let requirements = self.extractor.extract_all(texts.iter().map(String::as_str));
        let confidence = search_confidence(&results, &requirements);

        info!(
            "[{}] 🔍 搜索到 {} 条结果, 提取 {} 项要求, 置信度 {:.2}",
            ctx.exam_name,
            results.len(),
            requirements.len(),
            confidence
        );

        Ok(Some(
            DiscoveryResult::new(request.exam_name.clone(), LayerKind::Search)
                .with_requirements(requirements)
                .with_sources(results)
                .with_confidence(confidence),
        ))
    }
}

// ========== 抓取层 ==========

/// 抓取层参数
#[derive(Debug, Clone)]
pub struct ScrapeLayerOptions {
    pub page_timeout: Duration,
    pub link_timeout: Duration,
    pub max_links: usize,
    /// 最多抓取的 URL 数
    pub max_urls: usize,
}

impl Default for ScrapeLayerOptions {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            link_timeout: Duration::from_secs(15),
            max_links: 2,
            max_urls: 3,
        }
    }
}

impl ScrapeLayerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_timeout: config.scrape_timeout(),
            link_timeout: config.link_follow_timeout(),
            max_links: config.max_followed_links,
            max_urls: config.max_scrape_urls,
        }
    }
}

/// 抓取官方网站
///
/// 候选 URL：之前各层发现的官方来源优先，其次是搜索到的官方网站；
/// 单个 URL 失败只记录日志
pub struct ScrapeLayer {
    scraper: Arc<WebScraper>,
    aggregator: Option<Arc<SearchAggregator>>,
    options: ScrapeLayerOptions,
}

impl ScrapeLayer {
    pub fn new(scraper: Arc<WebScraper>, aggregator: Option<Arc<SearchAggregator>>, options: ScrapeLayerOptions) -> Self {
        Self {
            scraper,
            aggregator,
            options,
        }
    }

    async fn candidate_sites(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Vec<SourceInfo> {
        let mut candidates: Vec<SourceInfo> = ctx.official_sources().cloned().collect();

        if let Some(aggregator) = self.aggregator.as_ref().filter(|a| a.has_providers()) {
            candidates.extend(
                aggregator
                    .find_official_websites(&request.exam_name, &ctx.cancel)
                    .await,
            );
        }

        let mut unique = dedup_sources(candidates);
        unique.truncate(self.options.max_urls);
        unique
    }
}

#[async_trait]
impl Layer for ScrapeLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Scrape
    }

    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        let sites = self.candidate_sites(request, ctx).await;
        if sites.is_empty() {
            debug!("[{}] 没有可抓取的官方网站", ctx.exam_name);
            return Ok(None);
        }

        let options = ScrapeOptions {
            exam_name: request.exam_name.clone(),
            timeout: self.options.page_timeout,
            link_timeout: self.options.link_timeout,
            max_links: self.options.max_links,
        };

        let mut pages = Vec::new();
        for site in &sites {
            match self.scraper.scrape(&site.url, &options, &ctx.cancel).await {
                Ok(page) => pages.push(page),
                Err(e) if ctx.cancel.is_cancelled() => return Err(e),
                Err(e) => match e.downcast_ref::<ScrapeError>() {
                    Some(ScrapeError::NoRequirements { .. }) => debug!("[{}] {}", ctx.exam_name, e),
                    _ => warn!("[{}] 抓取 {} 失败: {}", ctx.exam_name, site.url, e),
                },
            }
        }

        if pages.is_empty() {
            return Ok(None);
        }

        let scores: Vec<PageScore> = pages
            .iter()
            .map(|p| PageScore {
                confidence: p.confidence,
                requirement_count: p.requirements.len(),
            })
            .collect();
        let confidence = scrape_confidence(&scores);

        let mut requirements = Vec::new();
        let mut sources = Vec::new();
        for page in pages {
            requirements.extend(page.requirements);
            sources.push(page.source);
        }
        sources.extend(sites);

        info!(
            "[{}] 🌐 抓取 {} 个页面, 置信度 {:.2}",
            ctx.exam_name,
            scores.len(),
            confidence
        );

        Ok(Some(
            DiscoveryResult::new(request.exam_name.clone(), LayerKind::Scrape)
                .with_requirements(requirements)
                .with_sources(sources)
                .with_confidence(confidence),
        ))
    }
}

// ========== 推断层 ==========

pub struct MlLayer {
    predictor: Arc<dyn RequirementPredictor>,
}

impl MlLayer {
    pub fn new(predictor: Arc<dyn RequirementPredictor>) -> Self {
        Self { predictor }
    }
}

#[async_trait]
impl Layer for MlLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Ml
    }

    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        let Some(prediction) = self
            .predictor
            .predict_requirements(request, &ctx.prior_sources)
            .await?
        else {
            return Ok(None);
        };

        debug!(
            "[{}] 🤖 推断出 {} 项要求",
            ctx.exam_name,
            prediction.requirements.len()
        );
        Ok(Some(
            DiscoveryResult::new(request.exam_name.clone(), LayerKind::Ml)
                .with_requirements(prediction.requirements)
                .with_confidence(prediction.confidence),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Requirement, RequirementKind};
    use crate::services::{PageRenderer, Prediction, RenderedPage, StaticSearchProvider, SearchOptions};
    use tokio_util::sync::CancellationToken;

    const NOTICE: &str = "Documents Required\n\
        Photograph (JPG format, size 20KB to 50KB)\n\
        Signature (JPG format, maximum size: 20KB)";

    struct NoticeRenderer;

    #[async_trait]
    impl PageRenderer for NoticeRenderer {
        async fn render(&self, url: &str, _timeout: Duration, _cancel: &CancellationToken) -> Result<RenderedPage> {
            if url.contains("broken") {
                anyhow::bail!("connection reset");
            }
            Ok(RenderedPage {
                url: url.to_string(),
                title: "Recruitment Notification".to_string(),
                text: NOTICE.to_string(),
                ..RenderedPage::default()
            })
        }
    }

    struct FixedPredictor;

    #[async_trait]
    impl RequirementPredictor for FixedPredictor {
        async fn predict_requirements(
            &self,
            _request: &DiscoveryRequest,
            prior_sources: &[SourceInfo],
        ) -> Result<Option<Prediction>> {
            Ok(Some(Prediction {
                requirements: vec![Requirement::new("photo", "Photograph", RequirementKind::Media)],
                confidence: if prior_sources.is_empty() { 0.4 } else { 0.5 },
            }))
        }
    }

    fn ctx() -> LayerContext {
        LayerContext::new("SSC CGL 2024", CancellationToken::new())
    }

    fn extractor() -> Arc<RequirementExtractor> {
        Arc::new(RequirementExtractor::new().unwrap())
    }

    #[tokio::test]
    async fn test_cache_layer_reads_normalized_key() {
        let cache = Arc::new(CacheStore::default());
        cache.store(
            "ssc-cgl-2024",
            DiscoveryResult::new("SSC CGL 2024", LayerKind::Scrape).with_confidence(0.9),
            None,
        );

        let layer = CacheLayer::new(cache);
        let hit = layer
            .attempt(&DiscoveryRequest::new("SSC  CGL 2024"), &ctx())
            .await
            .unwrap();
        assert_eq!(hit.unwrap().confidence, 0.9);
    }

    #[tokio::test]
    async fn test_search_layer_without_providers_is_none() {
        let aggregator = Arc::new(SearchAggregator::new(Vec::new(), SearchOptions::default()));
        let layer = SearchLayer::new(aggregator, extractor());
        let result = layer.attempt(&DiscoveryRequest::new("SSC CGL"), &ctx()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_search_layer_extracts_from_snippets() {
        let provider = StaticSearchProvider::new("static", 1.0).with_results(
            "ssc cgl",
            vec![SourceInfo::new(
                "https://ssc.gov.in/notice",
                "SSC CGL 2024 Notification",
                "Upload photograph in JPG format, maximum size 40KB",
            )],
        );
        let aggregator = Arc::new(SearchAggregator::new(
            vec![Arc::new(provider)],
            SearchOptions {
                provider_delay: Duration::from_millis(1),
                ..SearchOptions::default()
            },
        ));
        let layer = SearchLayer::new(aggregator, extractor());

        let result = layer
            .attempt(&DiscoveryRequest::new("SSC CGL"), &ctx())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.sources.len(), 1);
        assert!(result.requirement("photo").is_some());
        assert!(result.confidence > 0.0);
    }

    #[tokio::test]
    async fn test_scrape_layer_uses_prior_official_sources_and_skips_failures() {
        let scraper = Arc::new(WebScraper::new(extractor()).with_renderer(Arc::new(NoticeRenderer)));
        let layer = ScrapeLayer::new(scraper, None, ScrapeLayerOptions::default());
        let ctx = ctx().with_prior_sources(vec![
            SourceInfo::new("https://broken.gov.in", "Broken", ""),
            SourceInfo::new("https://ssc.gov.in", "SSC", ""),
            SourceInfo::new("https://forum.example.com", "Forum", ""),
        ]);

        let result = layer
            .attempt(&DiscoveryRequest::new("SSC CGL 2024"), &ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.requirements.len(), 2);
        assert!(result.sources.iter().all(|s| !s.url.contains("forum")));
        assert!(result.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_scrape_layer_without_candidates_is_none() {
        let scraper = Arc::new(WebScraper::new(extractor()).with_renderer(Arc::new(NoticeRenderer)));
        let layer = ScrapeLayer::new(scraper, None, ScrapeLayerOptions::default());
        assert!(layer
            .attempt(&DiscoveryRequest::new("SSC CGL"), &ctx())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ml_layer_passes_prior_sources() {
        let layer = MlLayer::new(Arc::new(FixedPredictor));
        let ctx = ctx().with_prior_sources(vec![SourceInfo::new("https://ssc.gov.in", "SSC", "")]);

        let result = layer
            .attempt(&DiscoveryRequest::new("SSC CGL"), &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.metadata.method, LayerKind::Ml);
    }
}
