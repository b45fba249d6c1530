//! 浏览器资源 - 基础设施层
//!
//! 唯一持有 `Browser` 的地方：首次使用时启动（或连接），之后在所有抓取调用间复用，
//! 由 `shutdown()` 显式释放。每次调用只借出自己的 `JsExecutor`（页面）。

use anyhow::Result;
use chromiumoxide::Browser;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser;
use crate::error::{AppError, BrowserError};
use crate::infrastructure::JsExecutor;

/// 浏览器的获取方式
#[derive(Debug, Clone)]
pub enum BrowserSource {
    /// 启动新的无头浏览器
    Launch { chrome_executable: Option<String> },
    /// 连接到已开启调试端口的浏览器
    Connect { port: u16 },
}

struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
    /// 连接到外部浏览器时不关闭它
    owned: bool,
}

/// 共享的浏览器进程
pub struct BrowserPool {
    source: BrowserSource,
    running: Mutex<Option<Running>>,
}

impl BrowserPool {
    pub fn new(source: BrowserSource) -> Self {
        Self {
            source,
            running: Mutex::new(None),
        }
    }

    /// 打开一个新页面，必要时先启动浏览器
    pub async fn open_page(&self) -> Result<JsExecutor> {
        let mut running = self.running.lock().await;

        if running.is_none() {
            let (browser, handler, owned) = match &self.source {
                BrowserSource::Launch { chrome_executable } => {
                    let (browser, handler) =
                        browser::launch_headless_browser(chrome_executable.as_deref()).await?;
                    (browser, handler, true)
                }
                BrowserSource::Connect { port } => {
                    let (browser, handler) = browser::connect_to_browser(*port).await?;
                    (browser, handler, false)
                }
            };
            *running = Some(Running {
                browser,
                handler,
                owned,
            });
        }

        let Some(state) = running.as_ref() else {
            return Err(AppError::Browser(BrowserError::LaunchFailed {
                reason: "浏览器未初始化".to_string(),
            })
            .into());
        };

        let page = state.browser.new_page("about:blank").await.map_err(|e| {
            AppError::Browser(BrowserError::PageCreationFailed {
                source: Box::new(e),
            })
        })?;
        debug!("已创建新页面");
        Ok(JsExecutor::new(page))
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// 关闭浏览器（如果由本进程启动）并停止事件处理任务
    pub async fn shutdown(&self) {
        let Some(mut state) = self.running.lock().await.take() else {
            return;
        };

        if state.owned {
            if let Err(e) = state.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = state.browser.wait().await;
        }
        state.handler.abort();
        info!("🛑 浏览器资源已释放");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_without_start_is_noop() {
        let pool = BrowserPool::new(BrowserSource::Launch {
            chrome_executable: None,
        });
        assert!(!pool.is_running().await);
        pool.shutdown().await;
        assert!(!pool.is_running().await);
    }

    #[tokio::test]
    #[ignore] // 需要本机安装 Chrome/Chromium：cargo test -- --ignored
    async fn test_open_page_launches_once() {
        let pool = BrowserPool::new(BrowserSource::Launch {
            chrome_executable: None,
        });

        let first = pool.open_page().await.expect("打开页面失败");
        let second = pool.open_page().await.expect("打开页面失败");
        assert!(pool.is_running().await);

        first.close().await;
        second.close().await;
        pool.shutdown().await;
    }
}
