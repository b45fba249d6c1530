//! # Exam Schema Discovery
//!
//! 根据考试名称自动发现报名表要求上传的文档（照片、签名、各类证书）及其格式、大小、尺寸约束
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `CacheStore` - TTL + LRU 结果缓存，带可取消的清扫任务
//! - `BrowserPool` - 懒启动、跨调用复用的浏览器
//! - `JsExecutor` - 单次调用独占的页面，提供 goto() / eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心级联顺序
//! - `RequirementExtractor` - 基于规则的文档要求提取
//! - `SearchAggregator` - 多查询 × 多提供方搜索、去重、排序
//! - `WebScraper` - 渲染 / 静态两级抓取
//! - `confidence` - 置信度纯函数
//! - `CuratedKnowledgeBase` / `LlmPredictor` / `RuleValidator` - 可替换的协作者
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 把每种能力包装成级联中的一层
//! - `LayerContext` - 上下文封装（考试名 + 取消令牌 + 已知来源）
//! - `Layer` - 缓存 / 知识库 / 搜索 / 抓取 / 推断
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/discovery_manager` - 单个考试的发现级联
//! - `orchestrator/batch_processor` - 批量发现，管理资源和并发
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, DiscoveryError};
pub use infrastructure::CacheStore;
pub use models::{
    normalize_key, DiscoveryRequest, DiscoveryResult, LayerKind, Requirement, RequirementKind, SourceInfo,
};
pub use orchestrator::{App, DiscoveryManager, DiscoveryOptions};
pub use workflow::{Layer, LayerContext};
