//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责级联调度和批量处理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量发现处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 组装各层（缓存 / 知识库 / 搜索 / 抓取 / 推断）
//! - 控制并发数量（Semaphore）
//! - 持有 CacheStore 清扫任务和浏览器资源
//! - 输出全局统计信息
//!
//! ### `discovery_manager` - 单个考试的发现级联
//! - 按请求的层级顺序依次尝试
//! - 单层超时、失败都只记录日志
//! - 累积来源，置信度达到阈值即停止
//! - 唯一的缓存写入者
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<考试名>)
//!     ↓
//! discovery_manager (处理单个 DiscoveryRequest)
//!     ↓
//! workflow::Layer (缓存 / 知识库 / 搜索 / 抓取 / 推断)
//!     ↓
//! services (能力层：extractor / search / scraper / confidence)
//!     ↓
//! infrastructure (基础设施：CacheStore / BrowserPool / JsExecutor)
//! ```

pub mod batch_processor;
pub mod discovery_manager;

// 重新导出主要类型
pub use batch_processor::{write_result, App};
pub use discovery_manager::{DiscoveryManager, DiscoveryOptions};
