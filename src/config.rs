use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时进行的发现任务数量
    pub max_concurrent_discoveries: usize,
    /// 待发现的考试名称（批量模式）
    pub exam_names: Vec<String>,
    /// 已打开调试端口的浏览器；为空时启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 浏览器可执行文件路径；为空时由 chromiumoxide 自动查找
    pub chrome_executable: Option<String>,
    // --- 缓存 ---
    pub cache_max_size: usize,
    pub cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,
    // --- 级联 ---
    /// 达到该置信度即停止级联
    pub confidence_threshold: f64,
    /// 为 true 时保留置信度最高的结果，而不是用后一层的结果替换
    pub keep_best: bool,
    pub layer_timeout_secs: u64,
    // --- 抓取 ---
    pub scrape_timeout_secs: u64,
    pub link_follow_timeout_secs: u64,
    pub max_followed_links: usize,
    pub max_scrape_urls: usize,
    // --- 搜索 ---
    pub provider_delay_ms: u64,
    pub provider_timeout_secs: u64,
    pub search_cache_ttl_secs: u64,
    pub max_search_results: usize,
    /// SearxNG 兼容的 JSON 搜索端点
    pub search_endpoint: Option<String>,
    // --- 知识库 / 输出 ---
    pub knowledge_folder: String,
    pub output_folder: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_discoveries: 4,
            exam_names: Vec::new(),
            browser_debug_port: None,
            chrome_executable: None,
            cache_max_size: 100,
            cache_ttl_secs: 60 * 60,
            cache_sweep_interval_secs: 5 * 60,
            confidence_threshold: 0.8,
            keep_best: false,
            layer_timeout_secs: 120,
            scrape_timeout_secs: 30,
            link_follow_timeout_secs: 15,
            max_followed_links: 2,
            max_scrape_urls: 3,
            provider_delay_ms: 500,
            provider_timeout_secs: 10,
            search_cache_ttl_secs: 60 * 60,
            max_search_results: 15,
            search_endpoint: None,
            knowledge_folder: "knowledge".to_string(),
            output_folder: "output_schema".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// 用环境变量覆盖已有配置，解析失败时保留原值
    pub fn merge_env(self) -> Self {
        let current = self;
        Self {
            max_concurrent_discoveries: env_parse("MAX_CONCURRENT_DISCOVERIES").unwrap_or(current.max_concurrent_discoveries),
            exam_names: std::env::var("EXAM_NAMES").ok().map(|v| split_list(&v)).unwrap_or(current.exam_names),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(current.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(current.chrome_executable),
            cache_max_size: env_parse("CACHE_MAX_SIZE").unwrap_or(current.cache_max_size),
            cache_ttl_secs: env_parse("CACHE_TTL_SECS").unwrap_or(current.cache_ttl_secs),
            cache_sweep_interval_secs: env_parse("CACHE_SWEEP_INTERVAL_SECS").unwrap_or(current.cache_sweep_interval_secs),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD").unwrap_or(current.confidence_threshold),
            keep_best: env_parse("KEEP_BEST").unwrap_or(current.keep_best),
            layer_timeout_secs: env_parse("LAYER_TIMEOUT_SECS").unwrap_or(current.layer_timeout_secs),
            scrape_timeout_secs: env_parse("SCRAPE_TIMEOUT_SECS").unwrap_or(current.scrape_timeout_secs),
            link_follow_timeout_secs: env_parse("LINK_FOLLOW_TIMEOUT_SECS").unwrap_or(current.link_follow_timeout_secs),
            max_followed_links: env_parse("MAX_FOLLOWED_LINKS").unwrap_or(current.max_followed_links),
            max_scrape_urls: env_parse("MAX_SCRAPE_URLS").unwrap_or(current.max_scrape_urls),
            provider_delay_ms: env_parse("PROVIDER_DELAY_MS").unwrap_or(current.provider_delay_ms),
            provider_timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS").unwrap_or(current.provider_timeout_secs),
            search_cache_ttl_secs: env_parse("SEARCH_CACHE_TTL_SECS").unwrap_or(current.search_cache_ttl_secs),
            max_search_results: env_parse("MAX_SEARCH_RESULTS").unwrap_or(current.max_search_results),
            search_endpoint: std::env::var("SEARCH_ENDPOINT").ok().or(current.search_endpoint),
            knowledge_folder: std::env::var("KNOWLEDGE_FOLDER").unwrap_or(current.knowledge_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(current.output_folder),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(current.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(current.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(current.llm_model_name),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(current.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::File(FileError::ReadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "confidence_threshold".to_string(),
                value: self.confidence_threshold.to_string(),
                reason: "必须在 [0, 1] 区间内".to_string(),
            });
        }
        if self.cache_max_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache_max_size".to_string(),
                value: "0".to_string(),
                reason: "缓存容量必须大于 0".to_string(),
            });
        }
        if self.max_concurrent_discoveries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_discoveries".to_string(),
                value: "0".to_string(),
                reason: "并发数必须大于 0".to_string(),
            });
        }
        for (key, secs) in [
            ("cache_ttl_secs", self.cache_ttl_secs),
            ("cache_sweep_interval_secs", self.cache_sweep_interval_secs),
            ("layer_timeout_secs", self.layer_timeout_secs),
            ("scrape_timeout_secs", self.scrape_timeout_secs),
            ("link_follow_timeout_secs", self.link_follow_timeout_secs),
            ("provider_timeout_secs", self.provider_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                    reason: "时长必须大于 0 秒".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn layer_timeout(&self) -> Duration {
        Duration::from_secs(self.layer_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn link_follow_timeout(&self) -> Duration {
        Duration::from_secs(self.link_follow_timeout_secs)
    }

    pub fn provider_delay(&self) -> Duration {
        Duration::from_millis(self.provider_delay_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }

    pub fn llm_enabled(&self) -> bool {
        !self.llm_api_key.trim().is_empty()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cascade_constants() {
        let config = Config::default();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.scrape_timeout(), Duration::from_secs(30));
        assert_eq!(config.link_follow_timeout(), Duration::from_secs(15));
        assert_eq!(config.provider_delay(), Duration::from_millis(500));
        assert!(!config.keep_best);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            keep_best = true
            exam_names = ["SSC CGL 2024", "IBPS PO"]
            "#,
        )
        .unwrap();
        assert!(config.keep_best);
        assert_eq!(config.exam_names.len(), 2);
        assert_eq!(config.cache_max_size, 100);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = Config {
            confidence_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let sweep = Config {
            cache_sweep_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            sweep.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "cache_sweep_interval_secs"
        ));

        let layer = Config {
            layer_timeout_secs: 0,
            ..Config::default()
        };
        assert!(layer.validate().is_err());

        let scrape = Config {
            scrape_timeout_secs: 0,
            ..Config::default()
        };
        assert!(scrape.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("SSC CGL, IBPS PO;;NEET "), vec!["SSC CGL", "IBPS PO", "NEET"]);
    }
}
