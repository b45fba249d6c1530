use thiserror::Error;

use crate::models::LayerKind;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 发现流程错误
    #[error("发现错误: {0}")]
    Discovery(#[from] DiscoveryError),
    /// 抓取错误
    #[error("抓取错误: {0}")]
    Scrape(#[from] ScrapeError),
    /// 搜索提供方错误
    #[error("搜索错误: {0}")]
    Provider(#[from] ProviderError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 发现流程错误
///
/// 只有这一类错误会传递给 `discover()` 的调用方
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 请求不合法
    #[error("请求不合法: {reason}")]
    InvalidRequest { reason: String },
    /// 所有层均失败或无结果
    #[error("考试 {exam_name} 的所有层级均未产出结果 (尝试: {attempted:?})")]
    Exhausted {
        exam_name: String,
        attempted: Vec<LayerKind>,
    },
    /// 调用方取消
    #[error("考试 {exam_name} 的发现流程已被取消")]
    Cancelled { exam_name: String },
}

/// 抓取错误（单个 URL 范围内）
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 两种策略都没有提取到要求
    #[error("页面 {url} 未提取到任何文档要求")]
    NoRequirements { url: String },
    /// 页面导航失败
    #[error("导航到 {url} 失败: {source}")]
    Navigation {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 超时
    #[error("抓取 {url} 超时 ({timeout_secs} 秒)")]
    Timeout { url: String, timeout_secs: u64 },
    /// 不支持的内容类型
    #[error("不支持的内容类型 {content_type} ({url})")]
    UnsupportedContent { url: String, content_type: String },
    /// 被取消
    #[error("抓取 {url} 已被取消")]
    Cancelled { url: String },
}

/// 搜索提供方错误
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 网络请求失败
    #[error("搜索请求失败 ({provider}): {source}")]
    RequestFailed {
        provider: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回错误响应
    #[error("搜索返回错误响应 ({provider}): status={status}")]
    BadResponse { provider: String, status: u16 },
    /// 超时
    #[error("搜索超时 ({provider})")]
    Timeout { provider: String },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动无头浏览器失败
    #[error("启动无头浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值不合法
    #[error("配置项 {key} 的值 '{value}' 不合法: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建搜索请求失败错误
    pub fn provider_request_failed(
        provider: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Provider(ProviderError::RequestFailed {
            provider: provider.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_layers() {
        let err = DiscoveryError::Exhausted {
            exam_name: "SSC CGL".to_string(),
            attempted: vec![LayerKind::Cache, LayerKind::Scrape],
        };
        let message = err.to_string();
        assert!(message.contains("SSC CGL"));
        assert!(message.contains("Scrape"));
    }

    #[test]
    fn test_wraps_into_app_error() {
        let err: AppError = ScrapeError::NoRequirements {
            url: "https://ssc.gov.in".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Scrape(_)));
        assert!(err.to_string().contains("ssc.gov.in"));
    }
}
