//! 层级调用上下文
//!
//! 封装"我正在为哪场考试、在第几层、已经知道哪些来源"这一信息

use tokio_util::sync::CancellationToken;

use crate::models::SourceInfo;

/// 单次层级调用的上下文
///
/// 由 DiscoveryManager 在每一层调用前构造，层只读不写
#[derive(Debug, Clone)]
pub struct LayerContext {
    /// 考试名（仅用于日志显示）
    pub exam_name: String,

    /// 本层在级联中的序号（从1开始）
    pub position: usize,

    /// 调用方的取消令牌，层内每个挂起点都应监听
    pub cancel: CancellationToken,

    /// 之前各层累积的来源
    pub prior_sources: Vec<SourceInfo>,
}

impl LayerContext {
    pub fn new(exam_name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            exam_name: exam_name.into(),
            position: 1,
            cancel,
            prior_sources: Vec::new(),
        }
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn with_prior_sources(mut self, sources: Vec<SourceInfo>) -> Self {
        self.prior_sources = sources;
        self
    }

    /// 已知来源中的官方来源
    pub fn official_sources(&self) -> impl Iterator<Item = &SourceInfo> {
        self.prior_sources
            .iter()
            .filter(|s| s.is_official_site())
    }
}
