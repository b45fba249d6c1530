//! 批量发现处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装各层、批量发现和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建缓存（含清扫任务）、搜索聚合器、抓取器、知识库、推断层
//! 2. **并发控制**：使用 Semaphore 限制同时进行的发现数量
//! 3. **分批处理**：每批完成后再开始下一批
//! 4. **结果输出**：每个考试的结果写入 `<output_folder>/<examId>.json`
//! 5. **资源释放**：停止清扫任务，关闭浏览器
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 CacheStore、浏览器和取消令牌的模块
//! - **向下委托**：单个考试的处理全部交给 DiscoveryManager

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{BrowserPool, BrowserSource, CacheStore};
use crate::models::{DiscoveryRequest, DiscoveryResult};
use crate::orchestrator::{DiscoveryManager, DiscoveryOptions};
use crate::services::{
    ChromiumRenderer, CuratedKnowledgeBase, HttpFetcher, HttpSearchProvider, LlmPredictor, RequirementExtractor,
    SearchAggregator, SearchOptions, SearchProvider, WebScraper,
};
use crate::utils::logging::{log_batch_complete, log_batch_start, log_exams_loaded, log_startup, print_final_stats};
use crate::workflow::{CacheLayer, KnowledgeLayer, MlLayer, ScrapeLayer, ScrapeLayerOptions, SearchLayer};

/// 默认搜索端点的可信度权重
const DEFAULT_PROVIDER_RELIABILITY: f64 = 0.8;

/// 应用主结构
pub struct App {
    config: Config,
    manager: Arc<DiscoveryManager>,
    scraper: Arc<WebScraper>,
    cancel: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl App {
    /// 初始化应用，组装完整的级联
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().map_err(AppError::from)?;
        log_startup(&config);

        let cancel = CancellationToken::new();

        // 缓存 + 后台清扫
        let cache = Arc::new(CacheStore::new(config.cache_max_size, config.cache_ttl()));
        let sweeper = cache.spawn_sweeper(config.cache_sweep_interval(), cancel.child_token());

        let extractor = Arc::new(RequirementExtractor::new()?);

        // 搜索
        let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
        match &config.search_endpoint {
            Some(endpoint) => {
                info!("🔎 搜索端点: {}", endpoint);
                providers.push(Arc::new(HttpSearchProvider::new(
                    "searx",
                    endpoint.clone(),
                    DEFAULT_PROVIDER_RELIABILITY,
                    config.provider_timeout(),
                )?));
            }
            None => warn!("⚠️ 未配置 SEARCH_ENDPOINT，搜索层和官方网站查找将被跳过"),
        }
        let aggregator = Arc::new(SearchAggregator::new(providers, SearchOptions::from_config(&config)));

        // 抓取（浏览器在第一次使用时才启动）
        let browser_source = match config.browser_debug_port {
            Some(port) => BrowserSource::Connect { port },
            None => BrowserSource::Launch {
                chrome_executable: config.chrome_executable.clone(),
            },
        };
        let pool = Arc::new(BrowserPool::new(browser_source));
        let scraper = Arc::new(
            WebScraper::new(extractor.clone())
                .with_renderer(Arc::new(ChromiumRenderer::new(pool)))
                .with_fetcher(Arc::new(HttpFetcher::new()?)),
        );

        let knowledge_base = Arc::new(CuratedKnowledgeBase::load(&config.knowledge_folder).await?);

        let mut manager = DiscoveryManager::new(cache.clone(), DiscoveryOptions::from_config(&config))
            .with_layer(Arc::new(CacheLayer::new(cache)))
            .with_layer(Arc::new(KnowledgeLayer::new(knowledge_base)))
            .with_layer(Arc::new(SearchLayer::new(aggregator.clone(), extractor)))
            .with_layer(Arc::new(ScrapeLayer::new(
                scraper.clone(),
                Some(aggregator),
                ScrapeLayerOptions::from_config(&config),
            )));

        if config.llm_enabled() {
            manager = manager.with_layer(Arc::new(MlLayer::new(Arc::new(LlmPredictor::new(&config)))));
        } else {
            info!("未配置 LLM_API_KEY，推断层不可用");
        }
        info!("✓ 已注册层级: {:?}", manager.registered_layers());

        Ok(Self {
            config,
            manager: Arc::new(manager),
            scraper,
            cancel,
            sweeper,
        })
    }

    pub fn manager(&self) -> &Arc<DiscoveryManager> {
        &self.manager
    }

    /// 取消令牌；触发后所有进行中的发现尽快结束
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行应用主逻辑：发现配置中的所有考试
    pub async fn run(&self) -> Result<()> {
        let exam_names = self.config.exam_names.clone();
        if exam_names.is_empty() {
            warn!("⚠️ 没有待发现的考试（设置 EXAM_NAMES 或在命令行传入考试名），程序结束");
            return Ok(());
        }

        log_exams_loaded(exam_names.len(), self.config.max_concurrent_discoveries);
        let stats = self.process_all_exams(exam_names).await?;
        print_final_stats(stats.success, stats.failed, stats.total, &self.config.output_folder);
        Ok(())
    }

    /// 分批处理所有考试
    async fn process_all_exams(&self, exam_names: Vec<String>) -> Result<ProcessingStats> {
        let batch_size = self.config.max_concurrent_discoveries;
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = exam_names.len();
        let total_batches = total.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        for (batch_index, batch) in exam_names.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                warn!("⚠️ 已取消，剩余考试不再处理");
                stats.failed += total - stats.success - stats.failed;
                break;
            }

            let batch_num = batch_index + 1;
            let start = batch_index * batch_size;
            log_batch_start(batch_num, total_batches, start + 1, start + batch.len(), total);

            let result = self.process_batch(batch, start, semaphore.clone()).await?;
            stats.success += result.success;
            stats.failed += result.failed;

            log_batch_complete(batch_num, result.success, result.success + result.failed);
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(&self, batch: &[String], start: usize, semaphore: Arc<Semaphore>) -> Result<BatchResult> {
        let mut handles = Vec::new();

        for (offset, exam_name) in batch.iter().enumerate() {
            let exam_index = start + offset + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let manager = self.manager.clone();
            let cancel = self.cancel.child_token();
            let output_folder = self.config.output_folder.clone();
            let request = DiscoveryRequest::new(exam_name.clone());

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match manager.discover_with_cancel(&request, &cancel).await {
                    Ok(result) => match write_result(&output_folder, &result).await {
                        Ok(path) => {
                            info!("[考试 {}] 💾 已保存: {}", exam_index, path.display());
                            true
                        }
                        Err(e) => {
                            error!("[考试 {}] ❌ 保存结果失败: {}", exam_index, e);
                            false
                        }
                    },
                    Err(e) => {
                        error!("[考试 {}] ❌ {}", exam_index, e);
                        false
                    }
                }
            });
            handles.push((exam_index, handle));
        }

        let mut result = BatchResult::default();
        for (exam_index, handle) in handles {
            match handle.await {
                Ok(true) => result.success += 1,
                Ok(false) => result.failed += 1,
                Err(e) => {
                    error!("[考试 {}] 任务执行失败: {}", exam_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// 停止后台任务并释放浏览器
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.sweeper.await {
            warn!("缓存清扫任务异常退出: {}", e);
        }
        self.scraper.shutdown().await;
        info!("👋 已退出");
    }
}

/// 将结果写为 `<folder>/<examId>.json`
pub async fn write_result(folder: &str, result: &DiscoveryResult) -> AppResult<PathBuf> {
    let path = Path::new(folder).join(format!("{}.json", result.exam_id));

    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|e| AppError::file_write_failed(folder, e))?;

    let json = serde_json::to_string_pretty(result)
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    tokio::fs::write(&path, json)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    Ok(path)
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}
