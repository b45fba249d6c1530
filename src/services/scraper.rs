//! 网页抓取 - 服务层
//!
//! 职责：
//! - 按策略阶梯抓取单个 URL：先渲染（无头浏览器），再静态（HTTP + HTML 解析）
//! - 渲染策略会跟进最多 N 个相关链接
//! - 对收集到的文本运行 RequirementExtractor，并给出单页置信度
//!
//! 页面资源由渲染器负责：每次调用独占一个页面，任何退出路径都会关闭。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ScrapeError;
use crate::infrastructure::{BrowserPool, JsExecutor};
use crate::models::{Requirement, SourceInfo};
use crate::services::extractor::RequirementExtractor;
use crate::utils::truncate_text;

/// 相关链接关键字
const RELEVANT_LINK_KEYWORDS: &[&str] = &[
    "notification",
    "apply",
    "application",
    "form",
    "recruitment",
    "documents",
    "requirements",
];

const SNIPPET_CHARS: usize = 200;

/// 渲染页面后在浏览器内执行的提取脚本
const EXTRACT_PAGE_JS: &str = r#"
(() => {
    const clean = (s) => (s || '').replace(/\s+/g, ' ').trim();
    const links = Array.from(document.querySelectorAll('a[href]'))
        .map(a => ({ text: clean(a.innerText), href: a.href }))
        .filter(l => l.href && l.href.startsWith('http'));
    return {
        url: location.href,
        title: document.title || '',
        text: document.body ? document.body.innerText : '',
        links,
    };
})()
"#;

// ========== 协作者接口 ==========

/// 页面上的一个链接
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub text: String,
    pub href: String,
}

/// 渲染后的页面内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderedPage {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<PageLink>,
}

/// 完整渲染一个页面（执行 JS）
///
/// 实现方必须自行遵守 `timeout` 和 `cancel`，并在任何情况下释放页面资源
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, timeout: Duration, cancel: &CancellationToken) -> Result<RenderedPage>;

    /// 释放共享资源
    async fn shutdown(&self) {}
}

/// 原始 HTTP 响应
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// 不执行 JS 的普通抓取
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;
}

/// 从原始内容中取出的文本
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    pub title: String,
    pub text: String,
}

/// 文本提取协作者（HTML、PDF 等）
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, url: &str, body: &[u8], content_type: &str) -> Result<ExtractedText>;
}

// ========== 抓取结果 ==========

/// 产出结果的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStrategy {
    Rendered,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMetadata {
    pub strategy: ScrapeStrategy,
    pub links_followed: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

/// 单个 URL 的抓取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingResult {
    pub requirements: Vec<Requirement>,
    pub source: SourceInfo,
    pub confidence: f64,
    pub metadata: ScrapeMetadata,
}

/// 抓取参数
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// 考试名，用于识别相关链接
    pub exam_name: String,
    /// 单页超时
    pub timeout: Duration,
    /// 跟进链接的超时
    pub link_timeout: Duration,
    /// 最多跟进的链接数
    pub max_links: usize,
}

impl ScrapeOptions {
    pub fn new(exam_name: impl Into<String>) -> Self {
        Self {
            exam_name: exam_name.into(),
            timeout: Duration::from_secs(30),
            link_timeout: Duration::from_secs(15),
            max_links: 2,
        }
    }
}

// ========== WebScraper ==========

/// 网页抓取器
pub struct WebScraper {
    extractor: Arc<RequirementExtractor>,
    renderer: Option<Arc<dyn PageRenderer>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    text_extractor: Arc<dyn TextExtractor>,
}

impl WebScraper {
    pub fn new(extractor: Arc<RequirementExtractor>) -> Self {
        Self {
            extractor,
            renderer: None,
            fetcher: None,
            text_extractor: Arc::new(HtmlTextExtractor),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_text_extractor(mut self, text_extractor: Arc<dyn TextExtractor>) -> Self {
        self.text_extractor = text_extractor;
        self
    }

    /// 抓取单个 URL
    ///
    /// # 参数
    /// - `url`: 目标页面
    /// - `options`: 超时、链接跟进参数
    /// - `cancel`: 取消令牌
    ///
    /// # 返回
    /// 第一个提取到要求的策略的结果；两种策略都没有结果时返回 `ScrapeError::NoRequirements`
    pub async fn scrape(&self, url: &str, options: &ScrapeOptions, cancel: &CancellationToken) -> Result<ScrapingResult> {
        if cancel.is_cancelled() {
            return Err(cancelled(url));
        }

        if let Some(renderer) = &self.renderer {
            match self.scrape_rendered(renderer.as_ref(), url, options, cancel).await {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => debug!("渲染策略未提取到要求: {}", url),
                Err(_) if cancel.is_cancelled() => return Err(cancelled(url)),
                Err(e) => warn!("渲染策略失败 ({}): {}", url, e),
            }
        }

        if let Some(fetcher) = &self.fetcher {
            match self.scrape_static(fetcher.as_ref(), url, options, cancel).await {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => debug!("静态策略未提取到要求: {}", url),
                Err(_) if cancel.is_cancelled() => return Err(cancelled(url)),
                Err(e) => warn!("静态策略失败 ({}): {}", url, e),
            }
        }

        Err(ScrapeError::NoRequirements { url: url.to_string() }.into())
    }

    /// 释放浏览器等共享资源
    pub async fn shutdown(&self) {
        if let Some(renderer) = &self.renderer {
            renderer.shutdown().await;
        }
    }

    async fn scrape_rendered(
        &self,
        renderer: &dyn PageRenderer,
        url: &str,
        options: &ScrapeOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<ScrapingResult>> {
        let page = renderer.render(url, options.timeout, cancel).await?;
        let mut texts = vec![page.text.clone()];
        let mut followed = Vec::new();

        for link in relevant_links(&page, url, &options.exam_name, options.max_links) {
            match renderer.render(&link, options.link_timeout, cancel).await {
                Ok(linked) => {
                    debug!("已跟进链接: {}", link);
                    texts.push(linked.text);
                    followed.push(link);
                }
                Err(e) if cancel.is_cancelled() => return Err(e),
                Err(e) => warn!("跟进链接失败 ({}): {}", link, e),
            }
        }

        let requirements = self.extractor.extract_all(texts.iter().map(String::as_str));
        if requirements.is_empty() {
            return Ok(None);
        }

        let all_text = texts.join("\n");
        let confidence = rendered_confidence(requirements.len(), !followed.is_empty(), &page.title, &all_text);
        info!(
            "✅ 渲染抓取 {}: {} 项要求, 置信度 {:.2}",
            url,
            requirements.len(),
            confidence
        );

        Ok(Some(ScrapingResult {
            requirements,
            source: SourceInfo::new(url, page.title.clone(), truncate_text(page.text.trim(), SNIPPET_CHARS)),
            confidence,
            metadata: ScrapeMetadata {
                strategy: ScrapeStrategy::Rendered,
                links_followed: followed,
                scraped_at: Utc::now(),
            },
        }))
    }

    async fn scrape_static(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
        options: &ScrapeOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<ScrapingResult>> {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(url)),
            fetched = tokio::time::timeout(options.timeout, fetcher.fetch(url, options.timeout)) => {
                fetched.map_err(|_| ScrapeError::Timeout {
                    url: url.to_string(),
                    timeout_secs: options.timeout.as_secs(),
                })??
            }
        };

        let extracted = self
            .text_extractor
            .extract_text(&fetched.url, &fetched.body, &fetched.content_type)?;
        let requirements = self.extractor.extract(&extracted.text);
        if requirements.is_empty() {
            return Ok(None);
        }

        let confidence = static_confidence(requirements.len(), &extracted.title, &extracted.text);
        info!(
            "✅ 静态抓取 {}: {} 项要求, 置信度 {:.2}",
            url,
            requirements.len(),
            confidence
        );

        Ok(Some(ScrapingResult {
            requirements,
            source: SourceInfo::new(url, extracted.title, truncate_text(extracted.text.trim(), SNIPPET_CHARS)),
            confidence,
            metadata: ScrapeMetadata {
                strategy: ScrapeStrategy::Static,
                links_followed: Vec::new(),
                scraped_at: Utc::now(),
            },
        }))
    }
}

fn cancelled(url: &str) -> anyhow::Error {
    ScrapeError::Cancelled { url: url.to_string() }.into()
}

/// 选出值得跟进的链接
///
/// 链接文字或 URL 含相关关键字，或提到考试名；不含当前页面；按出现顺序去重
pub fn relevant_links(page: &RenderedPage, page_url: &str, exam_name: &str, max: usize) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let exam = exam_name.trim().to_lowercase();
    let current = page_url.trim_end_matches('/');
    let mut selected: Vec<String> = Vec::new();

    for link in &page.links {
        if selected.len() >= max {
            break;
        }

        let href = match &base {
            Some(base) => match base.join(&link.href) {
                Ok(resolved) => resolved.to_string(),
                Err(_) => continue,
            },
            None => link.href.clone(),
        };
        if !href.starts_with("http") || href.trim_end_matches('/') == current {
            continue;
        }

        let haystack = format!("{} {}", link.text, href).to_lowercase();
        let relevant = RELEVANT_LINK_KEYWORDS.iter().any(|k| haystack.contains(k))
            || (!exam.is_empty() && haystack.contains(&exam));
        if relevant && !selected.contains(&href) {
            selected.push(href);
        }
    }

    selected
}

/// 渲染策略置信度
///
/// 基础 0.3，有要求 +0.3，≥3 项 +0.2，跟进了链接 +0.1，
/// 标题含 "notification" +0.1，正文含 "documents required" +0.1，上限 1.0
pub fn rendered_confidence(requirement_count: usize, followed_links: bool, title: &str, text: &str) -> f64 {
    let mut confidence: f64 = 0.3;
    if requirement_count > 0 {
        confidence += 0.3;
    }
    if requirement_count >= 3 {
        confidence += 0.2;
    }
    if followed_links {
        confidence += 0.1;
    }
    if title.to_lowercase().contains("notification") {
        confidence += 0.1;
    }
    if text.to_lowercase().contains("documents required") {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

/// 静态策略置信度：权重更低，上限 0.8
pub fn static_confidence(requirement_count: usize, title: &str, text: &str) -> f64 {
    let mut confidence: f64 = 0.2;
    if requirement_count > 0 {
        confidence += 0.3;
    }
    if requirement_count >= 3 {
        confidence += 0.15;
    }
    if title.to_lowercase().contains("notification") {
        confidence += 0.1;
    }
    if text.to_lowercase().contains("documents required") {
        confidence += 0.1;
    }
    confidence.min(0.8)
}

// ========== 默认实现：Chromium 渲染 ==========

/// 基于共享浏览器的渲染器
pub struct ChromiumRenderer {
    pool: Arc<BrowserPool>,
}

impl ChromiumRenderer {
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str, timeout: Duration, cancel: &CancellationToken) -> Result<RenderedPage> {
        let page = PageGuard::new(self.pool.open_page().await?);

        let outcome = match page.executor() {
            Some(executor) => tokio::select! {
                _ = cancel.cancelled() => Err(cancelled(url)),
                rendered = tokio::time::timeout(timeout, async {
                    executor.goto(url).await?;
                    executor.eval_as::<RenderedPage>(EXTRACT_PAGE_JS).await
                }) => rendered.unwrap_or_else(|_| Err(ScrapeError::Timeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                }.into())),
            },
            None => Err(anyhow!("页面已关闭")),
        };

        page.close().await;
        outcome
    }

    async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// 保证页面被关闭：正常路径显式 close，future 被丢弃时在 Drop 中补关
struct PageGuard {
    executor: Option<JsExecutor>,
}

impl PageGuard {
    fn new(executor: JsExecutor) -> Self {
        Self {
            executor: Some(executor),
        }
    }

    fn executor(&self) -> Option<&JsExecutor> {
        self.executor.as_ref()
    }

    async fn close(mut self) {
        if let Some(executor) = self.executor.take() {
            executor.close().await;
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(executor) = self.executor.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(executor.close());
            }
        }
    }
}

// ========== 默认实现：HTTP 抓取 ==========

/// reqwest 实现的静态抓取
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} ({})", status, url);
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await?.to_vec();

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }
}

// ========== 默认实现：HTML 文本提取 ==========

/// 承载正文的块级元素，每个元素输出为一行
const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, tr, pre, blockquote, dt, dd, caption";

/// HTML / 纯文本提取器，其它内容类型返回 `ScrapeError::UnsupportedContent`
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextExtractor;

impl TextExtractor for HtmlTextExtractor {
    fn extract_text(&self, url: &str, body: &[u8], content_type: &str) -> Result<ExtractedText> {
        let content_type = content_type.to_lowercase();
        let raw = String::from_utf8_lossy(body);

        if content_type.starts_with("text/plain") {
            return Ok(ExtractedText {
                title: String::new(),
                text: raw.into_owned(),
            });
        }
        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(ScrapeError::UnsupportedContent {
                url: url.to_string(),
                content_type,
            }
            .into());
        }

        let document = Html::parse_document(&raw);
        let title_selector = parse_selector("title")?;
        let block_selector = parse_selector(BLOCK_SELECTOR)?;

        let title = document
            .select(&title_selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        let lines: Vec<String> = document
            .select(&block_selector)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|line| !line.is_empty())
            .collect();

        let text = if lines.is_empty() {
            let body_selector = parse_selector("body")?;
            document
                .select(&body_selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
                .unwrap_or_default()
        } else {
            lines.join("\n")
        };

        Ok(ExtractedText { title, text })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("无效的选择器 {}: {:?}", selector, e))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const NOTICE: &str = "Documents Required\n\
        Photograph (JPG format, size 20KB to 50KB, 200x230 pixels)\n\
        Signature in black ink (JPG/JPEG format, maximum size: 40KB, dimensions: 140x60 pixels)\n\
        Left thumb impression (JPG, maximum size 50KB)";

    /// 按 URL 返回预置页面，并记录调用
    #[derive(Default)]
    struct FakeRenderer {
        pages: HashMap<String, RenderedPage>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRenderer {
        fn with_page(mut self, url: &str, page: RenderedPage) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, url: &str, _timeout: Duration, _cancel: &CancellationToken) -> Result<RenderedPage> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404 {}", url))
        }
    }

    struct FakeFetcher {
        html: String,
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
            Ok(FetchedPage {
                url: url.to_string(),
                content_type: "text/html; charset=utf-8".to_string(),
                body: self.html.clone().into_bytes(),
            })
        }
    }

    fn scraper() -> WebScraper {
        WebScraper::new(Arc::new(RequirementExtractor::new().unwrap()))
    }

    fn page(title: &str, text: &str, links: Vec<PageLink>) -> RenderedPage {
        RenderedPage {
            url: String::new(),
            title: title.to_string(),
            text: text.to_string(),
            links,
        }
    }

    fn link(text: &str, href: &str) -> PageLink {
        PageLink {
            text: text.to_string(),
            href: href.to_string(),
        }
    }

    #[test]
    fn test_rendered_page_parses_script_output() {
        let value = serde_json::json!({
            "url": "https://ssc.gov.in/notice",
            "title": "SSC CGL 2024 Notification",
            "text": "Documents Required\nPhotograph in JPG, 20KB to 50KB",
            "links": [{ "text": "Apply online", "href": "https://ssc.gov.in/apply" }],
        });

        let page: RenderedPage = serde_json::from_value(value).unwrap();
        assert_eq!(page.title, "SSC CGL 2024 Notification");
        assert_eq!(page.links, vec![link("Apply online", "https://ssc.gov.in/apply")]);
        assert!(!scraper().extractor.extract(&page.text).is_empty());
    }

    #[test]
    fn test_rendered_confidence_formula() {
        assert!((rendered_confidence(0, false, "", "") - 0.3).abs() < 1e-9);
        assert!((rendered_confidence(1, false, "", "") - 0.6).abs() < 1e-9);
        assert!((rendered_confidence(3, true, "Notification", "documents required") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_static_confidence_capped() {
        assert!((static_confidence(1, "", "") - 0.5).abs() < 1e-9);
        assert!((static_confidence(5, "Notification", "Documents Required") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_relevant_links_limited_and_filtered() {
        let page = page(
            "Home",
            "",
            vec![
                link("About us", "https://ssc.gov.in/about"),
                link("Notification CGL", "/notice/cgl.html"),
                link("Home", "https://ssc.gov.in/"),
                link("Apply online", "https://ssc.gov.in/apply"),
                link("Recruitment", "https://ssc.gov.in/recruitment"),
            ],
        );

        let links = relevant_links(&page, "https://ssc.gov.in/", "SSC CGL", 2);
        assert_eq!(
            links,
            vec!["https://ssc.gov.in/notice/cgl.html", "https://ssc.gov.in/apply"]
        );
    }

    #[tokio::test]
    async fn test_rendered_strategy_follows_links() {
        let renderer = FakeRenderer::default()
            .with_page(
                "https://ssc.gov.in",
                page(
                    "SSC",
                    "Welcome to the Staff Selection Commission portal",
                    vec![link("CGL 2024 Notification", "https://ssc.gov.in/cgl-notice")],
                ),
            )
            .with_page("https://ssc.gov.in/cgl-notice", page("Notice", NOTICE, vec![]));
        let renderer = Arc::new(renderer);
        let scraper = scraper().with_renderer(renderer.clone());

        let result = scraper
            .scrape("https://ssc.gov.in", &ScrapeOptions::new("SSC CGL"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.metadata.strategy, ScrapeStrategy::Rendered);
        assert_eq!(result.metadata.links_followed, vec!["https://ssc.gov.in/cgl-notice"]);
        assert!(result.requirements.iter().any(|r| r.id == "signature"));
        assert!(result.requirements.iter().any(|r| r.id == "photo"));
        // 0.3 + 0.3 + 0.2 + 0.1（跟进链接）+ 0.1（documents required）
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(renderer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_to_static_strategy() {
        let html = format!(
            "<html><head><title>Recruitment Notification</title><script>var x = 1;</script></head><body>{}</body></html>",
            NOTICE
                .lines()
                .map(|l| format!("<p>{}</p>", l))
                .collect::<String>()
        );
        let scraper = scraper()
            .with_renderer(Arc::new(FakeRenderer::default()))
            .with_fetcher(Arc::new(FakeFetcher { html }));

        let result = scraper
            .scrape("https://ssc.gov.in/notice", &ScrapeOptions::new("SSC CGL"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.metadata.strategy, ScrapeStrategy::Static);
        assert!(result.confidence <= 0.8);
        assert_eq!(result.source.title, "Recruitment Notification");
        assert!(result.source.classification.is_official());
    }

    #[tokio::test]
    async fn test_no_requirements_is_scrape_error() {
        let scraper = scraper().with_fetcher(Arc::new(FakeFetcher {
            html: "<html><body><p>Nothing here</p></body></html>".to_string(),
        }));

        let err = scraper
            .scrape("https://example.com", &ScrapeOptions::new("SSC CGL"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::NoRequirements { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scraper()
            .scrape("https://ssc.gov.in", &ScrapeOptions::new("SSC"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_html_extractor_lines_and_unsupported() {
        let extractor = HtmlTextExtractor;
        let html = b"<html><head><title> Notice </title></head><body><h2>Documents Required</h2><ul><li>Photo  (JPG)</li></ul></body></html>";
        let text = extractor.extract_text("https://a.gov.in", html, "text/html").unwrap();
        assert_eq!(text.title, "Notice");
        assert_eq!(text.text, "Documents Required\nPhoto (JPG)");

        let err = extractor
            .extract_text("https://a.gov.in/n.pdf", b"%PDF-1.4", "application/pdf")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::UnsupportedContent { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // 需要网络：cargo test -- --ignored
    async fn test_http_fetcher_live() {
        let fetcher = HttpFetcher::new().unwrap();
        let page = fetcher.fetch("https://ssc.gov.in", Duration::from_secs(30)).await.unwrap();
        assert!(!page.body.is_empty());
    }
}
