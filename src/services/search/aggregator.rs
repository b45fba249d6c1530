//! 搜索聚合器 - 服务层
//!
//! 职责：
//! - 多查询 × 多提供方的顺序搜索（提供方之间有间隔，单个提供方有超时）
//! - 按查询缓存结果（默认 1 小时）
//! - 去重、排序、截断
//!
//! 单个提供方失败只记录日志并跳过，整体调用永远不会因此失败。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::cache_store::MAX_TTL;
use crate::models::{dedup_sources, DiscoveryRequest, SourceInfo};
use crate::services::search::SearchProvider;

/// 官方网站查询模板，`{}` 为考试名
const OFFICIAL_QUERY_TEMPLATES: &[&str] = &[
    "{} official website",
    "{} .gov.in",
    "{} official notification",
    "{} recruitment apply online official portal",
];

/// 要求类查询模板
const REQUIREMENT_QUERY_TEMPLATES: &[&str] = &[
    "{} application form documents required",
    "{} photo signature size specifications",
    "{} notification pdf upload documents",
    "{} document upload format size kb",
];

const MAX_OFFICIAL_SITES: usize = 5;

/// 聚合器参数
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// 两个提供方之间的间隔
    pub provider_delay: Duration,
    /// 单个提供方的超时
    pub provider_timeout: Duration,
    /// 查询缓存的有效期
    pub cache_ttl: Duration,
    /// 去重排序后的结果上限
    pub max_results: usize,
    /// 每个提供方每次查询请求的条数
    pub per_provider_limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            provider_delay: Duration::from_millis(500),
            provider_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(60 * 60),
            max_results: 15,
            per_provider_limit: 10,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider_delay: config.provider_delay(),
            provider_timeout: config.provider_timeout(),
            cache_ttl: config.search_cache_ttl(),
            max_results: config.max_search_results,
            ..Self::default()
        }
    }
}

struct CachedQuery {
    results: Vec<SourceInfo>,
    expires_at: Instant,
}

/// 搜索聚合器
pub struct SearchAggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    options: SearchOptions,
    query_cache: Mutex<HashMap<String, CachedQuery>>,
}

impl SearchAggregator {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, options: SearchOptions) -> Self {
        Self {
            providers,
            options,
            query_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// 执行多个查询并合并结果
    ///
    /// # 参数
    /// - `queries`: 查询列表，按顺序执行
    /// - `cancel`: 取消后立即停止，返回已收集到的结果
    ///
    /// # 返回
    /// 去重、排序、截断后的结果
    pub async fn multi_search(&self, queries: &[String], cancel: &CancellationToken) -> Vec<SourceInfo> {
        let mut collected = Vec::new();

        for query in queries {
            if cancel.is_cancelled() {
                break;
            }

            let key = query.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }

            if let Some(hit) = self.cached(&key) {
                debug!("查询缓存命中: {}", query);
                collected.extend(hit);
                continue;
            }

            match self.query_providers(query, cancel).await {
                Some(results) => {
                    self.remember(key, results.clone());
                    collected.extend(results);
                }
                // 全部提供方失败，不缓存
                None => continue,
            }
        }

        let ranked = dedup_and_rank(collected, self.options.max_results);
        debug!("多查询搜索完成: {} 个查询 → {} 条结果", queries.len(), ranked.len());
        ranked
    }

    /// 查找考试的官方网站
    ///
    /// # 返回
    /// 最多 5 个官方来源（政府域名，或标题包含 "official"）
    pub async fn find_official_websites(&self, exam_name: &str, cancel: &CancellationToken) -> Vec<SourceInfo> {
        let queries: Vec<String> = OFFICIAL_QUERY_TEMPLATES
            .iter()
            .map(|t| t.replace("{}", exam_name))
            .collect();

        let official: Vec<SourceInfo> = self
            .multi_search(&queries, cancel)
            .await
            .into_iter()
            .filter(SourceInfo::is_official_site)
            .take(MAX_OFFICIAL_SITES)
            .collect();

        info!("🔎 {} 找到 {} 个官方网站", exam_name, official.len());
        official
    }

    /// 依次询问每个提供方
    ///
    /// 至少一个提供方成功时返回 `Some`；全部失败或被取消时返回 `None`
    async fn query_providers(&self, query: &str, cancel: &CancellationToken) -> Option<Vec<SourceInfo>> {
        let mut results = Vec::new();
        let mut any_succeeded = false;

        for (index, provider) in self.providers.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return any_succeeded.then_some(results),
                    _ = tokio::time::sleep(self.options.provider_delay) => {}
                }
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return any_succeeded.then_some(results),
                outcome = tokio::time::timeout(
                    self.options.provider_timeout,
                    provider.search(query, self.options.per_provider_limit),
                ) => outcome,
            };

            match outcome {
                Ok(Ok(items)) => {
                    any_succeeded = true;
                    let weight = provider.reliability();
                    results.extend(items.into_iter().map(|item| {
                        let scaled = item.reliability * weight;
                        item.with_reliability(scaled)
                    }));
                }
                Ok(Err(e)) => warn!("搜索提供方 {} 失败 (查询: {}): {}", provider.name(), query, e),
                Err(_) => warn!(
                    "搜索提供方 {} 超时 ({} 秒, 查询: {})",
                    provider.name(),
                    self.options.provider_timeout.as_secs(),
                    query
                ),
            }
        }

        any_succeeded.then_some(results)
    }

    fn cached(&self, key: &str) -> Option<Vec<SourceInfo>> {
        let mut cache = self.lock_cache();
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.results.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn remember(&self, key: String, results: Vec<SourceInfo>) {
        let now = Instant::now();
        let expires_at = now + self.options.cache_ttl.min(MAX_TTL);
        let mut cache = self.lock_cache();
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(key, CachedQuery { results, expires_at });
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CachedQuery>> {
        self.query_cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 去重并排序
///
/// 相同去重键保留可信度更高的一条；官方来源在前，其余按可信度降序；最多 `max` 条
pub fn dedup_and_rank(results: Vec<SourceInfo>, max: usize) -> Vec<SourceInfo> {
    let mut unique = dedup_sources(results);
    // sort_by 是稳定排序，同分时保持出现顺序
    unique.sort_by(|a, b| {
        b.classification
            .is_official()
            .cmp(&a.classification.is_official())
            .then_with(|| b.reliability.total_cmp(&a.reliability))
    });
    unique.truncate(max);
    unique
}

/// 根据请求构造面向"文档要求"的查询
pub fn build_queries(request: &DiscoveryRequest) -> Vec<String> {
    let context = request.context.clone().unwrap_or_default();

    let mut base = request.exam_name.trim().to_string();
    if let Some(year) = context.year {
        let year = year.to_string();
        if !base.contains(&year) {
            base = format!("{} {}", base, year);
        }
    }

    let mut queries: Vec<String> = REQUIREMENT_QUERY_TEMPLATES
        .iter()
        .map(|t| t.replace("{}", &base))
        .collect();

    let extra: Vec<&str> = [context.level.as_deref(), context.region.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !extra.is_empty() {
        queries.push(format!("{} {} documents required", base, extra.join(" ")));
    }

    let free_text = request.query.trim();
    if !free_text.is_empty() && !free_text.eq_ignore_ascii_case(request.exam_name.trim()) {
        queries.push(free_text.to_string());
    }

    queries
}
