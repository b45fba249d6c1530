use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use exam_schema_discovery::utils::logging;
use exam_schema_discovery::{App, Config};
use tracing::{info, warn};

/// 根据考试名称发现报名表要求上传的文档
#[derive(Debug, Parser)]
#[command(name = "exam-schema-discovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover document upload requirements for exam application forms", long_about = None)]
struct Cli {
    /// 待发现的考试名称（覆盖配置中的 exam_names）
    exams: Vec<String>,

    /// TOML 配置文件；未指定时只读取环境变量
    #[arg(short, long, env = "EXAM_DISCOVERY_CONFIG")]
    config: Option<PathBuf>,

    /// 结果输出目录
    #[arg(short, long)]
    output: Option<String>,

    /// 输出 debug 日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// 加载配置：TOML 文件（可选）→ 环境变量覆盖 → 命令行覆盖
    fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::from_toml_file(path)?.merge_env(),
            None => Config::from_env(),
        };
        Ok(self.apply(config))
    }

    fn apply(&self, mut config: Config) -> Config {
        let exams: Vec<String> = self
            .exams
            .iter()
            .map(|exam| exam.trim().to_string())
            .filter(|exam| !exam.is_empty())
            .collect();
        if !exams.is_empty() {
            config.exam_names = exams;
        }
        if let Some(output) = &self.output {
            config.output_folder = output.clone();
        }
        config.verbose_logging |= self.verbose;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    let cancel = app.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到 Ctrl+C，正在取消进行中的发现...");
            cancel.cancel();
        }
    });

    let outcome = app.run().await;
    app.shutdown().await;
    info!("程序结束");
    outcome
}
