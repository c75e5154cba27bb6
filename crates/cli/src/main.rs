//! # bootstats CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载、命令行覆盖与验证
//! - 测量编排与生命周期管理
//! - 结果、参考比较的输出
//! - 优雅关闭处理 (Ctrl-C / SIGTERM)

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_measurements, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "bootstats starting");

    let result = match &cli.command {
        Commands::Run(args) => run_measurements(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let config = observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: observability::level_for(cli.verbose, cli.quiet).to_string(),
    };
    observability::init_with_config(config)
}
