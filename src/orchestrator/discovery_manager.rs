//! 发现级联 - 编排层
//!
//! ## 职责
//!
//! 按请求给出的层级顺序依次尝试各层，直到置信度达到阈值：
//!
//! ```text
//! Idle → Attempting(layer_i) ─┬─ 成功: 累积来源; 置信度 ≥ 阈值 ? Done : 下一层
//!                             └─ 失败/超时: 记录日志, 下一层
//!      → Done | Exhausted | Cancelled
//! ```
//!
//! - 层与层严格顺序执行，每层有独立超时
//! - 未达阈值时，后一层的结果**替换**之前记住的结果（`keep_best` 为 true 时保留置信度最高的）
//! - Done 时附上完整路径和累积来源，调用校验，写入缓存（只写一次）
//! - Exhausted / Cancelled 时不写缓存

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DiscoveryError;
use crate::infrastructure::CacheStore;
use crate::models::{dedup_sources, DiscoveryRequest, DiscoveryResult, LayerKind, SourceInfo};
use crate::services::confidence::source_reliability;
use crate::services::{RuleValidator, ValidationLayer};
use crate::workflow::{Layer, LayerContext};

/// 校验分数低于该值时标记为需要人工核实
const VALIDATION_FLOOR: f64 = 0.5;

/// 级联参数
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// 达到该置信度即停止
    pub confidence_threshold: f64,
    /// 保留置信度最高的结果，而不是用后一层替换
    pub keep_best: bool,
    /// 单层超时
    pub layer_timeout: Duration,
    /// 写入缓存时的 TTL；为空时使用缓存的默认值
    pub cache_ttl: Option<Duration>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            keep_best: false,
            layer_timeout: Duration::from_secs(120),
            cache_ttl: None,
        }
    }
}

impl DiscoveryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            keep_best: config.keep_best,
            layer_timeout: config.layer_timeout(),
            cache_ttl: Some(config.cache_ttl()),
        }
    }
}

/// 发现管理器
///
/// 持有已注册的层、缓存和校验器；自身无可变状态，可在多个任务间共享
pub struct DiscoveryManager {
    layers: HashMap<LayerKind, Arc<dyn Layer>>,
    cache: Arc<CacheStore>,
    validator: Arc<dyn ValidationLayer>,
    options: DiscoveryOptions,
}

impl DiscoveryManager {
    pub fn new(cache: Arc<CacheStore>, options: DiscoveryOptions) -> Self {
        Self {
            layers: HashMap::new(),
            cache,
            validator: Arc::new(RuleValidator),
            options,
        }
    }

    /// 注册一层；同类型的层会被替换
    pub fn with_layer(mut self, layer: Arc<dyn Layer>) -> Self {
        self.layers.insert(layer.kind(), layer);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ValidationLayer>) -> Self {
        self.validator = validator;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub fn registered_layers(&self) -> Vec<LayerKind> {
        LayerKind::DEFAULT_ORDER
            .into_iter()
            .filter(|kind| self.layers.contains_key(kind))
            .collect()
    }

    /// 发现考试的文档要求
    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryResult, DiscoveryError> {
        self.discover_with_cancel(request, &CancellationToken::new()).await
    }

    /// 发现考试的文档要求，`cancel` 触发时尽快返回 `DiscoveryError::Cancelled`
    ///
    /// # 返回
    /// - `Ok(result)`: 某一层产出了结果（可能 `needs_verification`）
    /// - `Err(Exhausted)`: 所有层均无结果
    /// - `Err(Cancelled)`: 被调用方取消
    pub async fn discover_with_cancel(
        &self,
        request: &DiscoveryRequest,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        request.validate()?;
        let exam_name = request.exam_name.trim().to_string();
        let cancelled = || DiscoveryError::Cancelled {
            exam_name: exam_name.clone(),
        };

        info!("🔍 开始发现: {} (层级: {:?})", exam_name, request.fallback_levels);

        let mut path: Vec<LayerKind> = Vec::new();
        let mut sources: Vec<SourceInfo> = Vec::new();
        let mut best: Option<DiscoveryResult> = None;

        for (index, kind) in request.fallback_levels.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            let Some(layer) = self.layers.get(&kind) else {
                warn!("[{}] 层级 {} 未注册，跳过", exam_name, kind);
                continue;
            };
            path.push(kind);

            let ctx = LayerContext::new(exam_name.clone(), cancel.clone())
                .at_position(index + 1)
                .with_prior_sources(sources.clone());

            debug!("[{}] 尝试第 {} 层: {}", exam_name, index + 1, kind);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                outcome = tokio::time::timeout(self.options.layer_timeout, layer.attempt(request, &ctx)) => outcome,
            };

            let result = match outcome {
                Ok(Ok(Some(result))) => result,
                Ok(Ok(None)) => {
                    debug!("[{}] 层级 {} 无结果", exam_name, kind);
                    continue;
                }
                Ok(Err(e)) => {
                    if cancel.is_cancelled() {
                        return Err(cancelled());
                    }
                    warn!("[{}] 层级 {} 失败: {}", exam_name, kind, e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "[{}] 层级 {} 超时 ({} 秒)",
                        exam_name,
                        kind,
                        self.options.layer_timeout.as_secs()
                    );
                    continue;
                }
            };

            sources = dedup_sources(sources.into_iter().chain(result.sources.iter().cloned()));
            let confidence = result.confidence;
            info!(
                "[{}] 层级 {} 产出 {} 项要求, 置信度 {:.2}",
                exam_name,
                kind,
                result.requirements.len(),
                confidence
            );

            best = Some(match best.take() {
                Some(previous) if self.options.keep_best && previous.confidence >= confidence => previous,
                _ => result,
            });

            if confidence >= self.options.confidence_threshold {
                info!("[{}] ✅ 置信度 {:.2} 达到阈值，停止级联", exam_name, confidence);
                break;
            }
        }

        let Some(result) = best else {
            warn!("[{}] ❌ 所有层级均无结果", exam_name);
            return Err(DiscoveryError::Exhausted {
                exam_name,
                attempted: path,
            });
        };

        let result = self.finalize(request, result, path, sources).await;
        self.cache.store(&request.exam_key(), result.clone(), self.options.cache_ttl);
        info!(
            "[{}] 🎉 发现完成: {} 项要求, 置信度 {:.2}, 校验 {:.2}",
            exam_name,
            result.requirements.len(),
            result.confidence,
            result.validation_score
        );
        Ok(result)
    }

    /// 附上路径和来源，计算可信度并校验
    async fn finalize(
        &self,
        request: &DiscoveryRequest,
        mut result: DiscoveryResult,
        path: Vec<LayerKind>,
        sources: Vec<SourceInfo>,
    ) -> DiscoveryResult {
        result.exam_id = request.exam_key();
        result.exam_name = request.exam_name.trim().to_string();
        result.discovery_path = path;
        result.sources = sources;
        result.dedup_requirements();
        result.metadata.reliability = source_reliability(&result.sources);

        result.validation_score = match self.validator.validate(&result).await {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(e) => {
                warn!("[{}] 校验失败: {}", result.exam_name, e);
                0.0
            }
        };
        result.metadata.needs_verification = result.confidence < self.options.confidence_threshold
            || result.validation_score < VALIDATION_FLOOR;
        result
    }
}
