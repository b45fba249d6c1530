use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use exam_schema_discovery::services::RequirementExtractor;
use exam_schema_discovery::{
    CacheStore, DiscoveryError, DiscoveryManager, DiscoveryOptions, DiscoveryRequest, DiscoveryResult, Layer,
    LayerContext, LayerKind, Requirement, RequirementKind, SourceInfo,
};
use tokio_test::assert_ok;

/// 返回固定结果并记录调用次数的层
struct FixedLayer {
    kind: LayerKind,
    requirements: Vec<Requirement>,
    sources: Vec<SourceInfo>,
    confidence: Option<f64>,
    calls: AtomicUsize,
}

impl FixedLayer {
    fn new(kind: LayerKind, confidence: f64) -> Self {
        Self {
            kind,
            requirements: vec![photo()],
            sources: Vec::new(),
            confidence: Some(confidence),
            calls: AtomicUsize::new(0),
        }
    }

    fn empty(kind: LayerKind) -> Self {
        Self {
            confidence: None,
            ..Self::new(kind, 0.0)
        }
    }

    fn with_requirements(mut self, requirements: Vec<Requirement>) -> Self {
        self.requirements = requirements;
        self
    }

    fn with_source(mut self, source: SourceInfo) -> Self {
        self.sources.push(source);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Layer for FixedLayer {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    async fn attempt(&self, request: &DiscoveryRequest, _ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.confidence.map(|confidence| {
            DiscoveryResult::new(request.exam_name.clone(), self.kind)
                .with_requirements(self.requirements.clone())
                .with_sources(self.sources.clone())
                .with_confidence(confidence)
        }))
    }
}

/// 断言收到了前面各层累积的来源
struct SourceCheckingLayer {
    expected_urls: Vec<&'static str>,
    seen: AtomicUsize,
}

#[async_trait]
impl Layer for SourceCheckingLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Ml
    }

    async fn attempt(&self, request: &DiscoveryRequest, ctx: &LayerContext) -> Result<Option<DiscoveryResult>> {
        let urls: Vec<&str> = ctx.prior_sources.iter().map(|s| s.url.as_str()).collect();
        for expected in &self.expected_urls {
            assert!(urls.contains(expected), "缺少来源 {}", expected);
        }
        self.seen.store(urls.len(), Ordering::SeqCst);
        Ok(Some(
            DiscoveryResult::new(request.exam_name.clone(), LayerKind::Ml)
                .with_requirements(vec![photo()])
                .with_confidence(0.5),
        ))
    }
}

fn photo() -> Requirement {
    Requirement::new("photo", "Photograph", RequirementKind::Media)
        .with_formats(["jpg", "png"])
        .with_size(Some("0KB"), Some("50KB"))
}

fn signature() -> Requirement {
    Requirement::new("signature", "Signature", RequirementKind::Media)
        .with_formats(["jpg"])
        .with_size(Some("1KB"), Some("30KB"))
}

fn manager(cache: Arc<CacheStore>, keep_best: bool) -> DiscoveryManager {
    DiscoveryManager::new(
        cache,
        DiscoveryOptions {
            keep_best,
            ..DiscoveryOptions::default()
        },
    )
}

fn new_cache() -> Arc<CacheStore> {
    Arc::new(CacheStore::new(100, Duration::from_secs(3600)))
}

#[tokio::test]
async fn test_end_to_end_cache_then_scrape() {
    let cache = new_cache();
    let scrape = Arc::new(
        FixedLayer::new(LayerKind::Scrape, 0.91)
            .with_requirements(vec![photo(), signature()])
            .with_source(SourceInfo::new("https://ssc.nic.in/notice", "SSC CGL 2024 Notification", "")),
    );
    let manager = manager(cache.clone(), false)
        .with_layer(Arc::new(exam_schema_discovery::workflow::CacheLayer::new(cache.clone())))
        .with_layer(scrape.clone());

    let request = DiscoveryRequest::new("SSC CGL 2024").with_levels(vec![LayerKind::Cache, LayerKind::Scrape]);
    let result = assert_ok!(manager.discover(&request).await);

    assert_eq!(result.discovery_path, vec![LayerKind::Cache, LayerKind::Scrape]);
    assert_eq!(result.requirements.len(), 2);
    assert!((result.confidence - 0.91).abs() < 1e-9);
    assert!(!result.metadata.needs_verification);

    let signature = result.requirement("signature").unwrap();
    assert_eq!(signature.formats, vec!["jpg".to_string()]);
    assert_eq!(signature.size_constraints.max.as_deref(), Some("30KB"));

    assert!(cache.contains("ssc-cgl-2024"));
    assert!(cache.stats().contains("ssc-cgl-2024"));
    assert_eq!(scrape.calls(), 1);

    // 第二次直接命中缓存
    let again = assert_ok!(manager.discover(&request).await);
    assert_eq!(again.discovery_path, vec![LayerKind::Cache]);
    assert_eq!(scrape.calls(), 1);
}

#[tokio::test]
async fn test_stops_when_threshold_reached() {
    let knowledge = Arc::new(FixedLayer::new(LayerKind::Knowledge, 0.95));
    let search = Arc::new(FixedLayer::new(LayerKind::Search, 0.9));
    let manager = manager(new_cache(), false)
        .with_layer(knowledge.clone())
        .with_layer(search.clone());

    let request = DiscoveryRequest::new("IBPS PO 2024").with_levels(vec![LayerKind::Knowledge, LayerKind::Search]);
    let result = assert_ok!(manager.discover(&request).await);

    assert_eq!(result.discovery_path, vec![LayerKind::Knowledge]);
    assert_eq!(knowledge.calls(), 1);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn test_exhausted_leaves_cache_untouched() {
    let cache = new_cache();
    let manager = manager(cache.clone(), false)
        .with_layer(Arc::new(FixedLayer::empty(LayerKind::Knowledge)))
        .with_layer(Arc::new(FixedLayer::empty(LayerKind::Search)));

    let request = DiscoveryRequest::new("Unknown Exam").with_levels(vec![LayerKind::Knowledge, LayerKind::Search]);
    match manager.discover(&request).await {
        Err(DiscoveryError::Exhausted { attempted, .. }) => {
            assert_eq!(attempted, vec![LayerKind::Knowledge, LayerKind::Search]);
        }
        other => panic!("应当耗尽所有层级, 实际: {:?}", other),
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_replace_keeps_latest_result_below_threshold() {
    let manager = manager(new_cache(), false)
        .with_layer(Arc::new(FixedLayer::new(LayerKind::Knowledge, 0.7)))
        .with_layer(Arc::new(
            FixedLayer::new(LayerKind::Search, 0.4).with_requirements(vec![signature()]),
        ));

    let request = DiscoveryRequest::new("NEET 2025").with_levels(vec![LayerKind::Knowledge, LayerKind::Search]);
    let result = assert_ok!(manager.discover(&request).await);

    assert!((result.confidence - 0.4).abs() < 1e-9);
    assert!(result.requirement("signature").is_some());
    assert!(result.metadata.needs_verification);
    assert_eq!(result.discovery_path, vec![LayerKind::Knowledge, LayerKind::Search]);
}

#[tokio::test]
async fn test_keep_best_retains_higher_confidence() {
    let manager = manager(new_cache(), true)
        .with_layer(Arc::new(FixedLayer::new(LayerKind::Knowledge, 0.7)))
        .with_layer(Arc::new(
            FixedLayer::new(LayerKind::Search, 0.4).with_requirements(vec![signature()]),
        ));

    let request = DiscoveryRequest::new("NEET 2025").with_levels(vec![LayerKind::Knowledge, LayerKind::Search]);
    let result = assert_ok!(manager.discover(&request).await);

    assert!((result.confidence - 0.7).abs() < 1e-9);
    assert!(result.requirement("photo").is_some());
    assert!(result.requirement("signature").is_none());
}

#[tokio::test]
async fn test_sources_accumulate_across_layers() {
    let checker = Arc::new(SourceCheckingLayer {
        expected_urls: vec!["https://ibps.in/notice", "https://example.com/guide"],
        seen: AtomicUsize::new(0),
    });
    let manager = manager(new_cache(), false)
        .with_layer(Arc::new(
            FixedLayer::new(LayerKind::Knowledge, 0.3)
                .with_source(SourceInfo::new("https://ibps.in/notice", "IBPS Notification", "")),
        ))
        .with_layer(Arc::new(
            FixedLayer::new(LayerKind::Search, 0.3)
                .with_source(SourceInfo::new("https://example.com/guide", "IBPS guide", ""))
                .with_source(SourceInfo::new("https://ibps.in/notice", "IBPS Notification", "")),
        ))
        .with_layer(checker.clone());

    let request = DiscoveryRequest::new("IBPS Clerk").with_levels(vec![
        LayerKind::Knowledge,
        LayerKind::Search,
        LayerKind::Ml,
    ]);
    let result = assert_ok!(manager.discover(&request).await);

    assert_eq!(checker.seen.load(Ordering::SeqCst), 2);
    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.metadata.method, LayerKind::Ml);
}

#[tokio::test]
async fn test_requirement_ids_are_unique() {
    let duplicated = vec![
        photo(),
        Requirement::new("photo", "Recent Photograph", RequirementKind::Media).with_formats(["jpeg"]),
        signature(),
    ];
    let manager = manager(new_cache(), false)
        .with_layer(Arc::new(FixedLayer::new(LayerKind::Search, 0.85).with_requirements(duplicated)));

    let request = DiscoveryRequest::new("GATE 2025").with_levels(vec![LayerKind::Search]);
    let result = assert_ok!(manager.discover(&request).await);

    let mut ids: Vec<&str> = result.requirements.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), result.requirements.len());
    assert_eq!(result.requirements.len(), 2);
}

#[test]
fn test_extractor_reads_signature_rules() {
    let extractor = RequirementExtractor::new().unwrap();
    let text = "Upload your signature in JPG format, size between 10KB and 20KB.";
    let requirements = extractor.extract(text);

    let signature = requirements
        .iter()
        .find(|r| r.id == "signature")
        .unwrap();
    assert!(signature.formats.iter().any(|f| f == "jpg"));
    assert_eq!(signature.size_constraints.max.as_deref(), Some("20KB"));
}
