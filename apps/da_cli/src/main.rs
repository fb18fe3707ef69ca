// apps/da_cli/src/main.rs

//! 离散伴随命令行界面
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**，只负责读取算例、组装各层对象和输出结果。
//! 库层通过 `log` 记录，这里由 `tracing-subscriber` 统一接收。

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// 离散伴随工具
#[derive(Parser)]
#[command(name = "da_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discrete-adjoint turbulence, mesh quality and reconstruction tools", long_about = None)]
struct Cli {
    /// 日志过滤：级别 (trace, debug, info, warn, error) 或 `target=level` 指令，
    /// 设置了 RUST_LOG 时以环境变量为准
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 验证算例配置
    Validate(commands::validate::ValidateArgs),
    /// 计算网格质量 KS 目标
    Quality(commands::quality::QualityArgs),
    /// 前向求解 nuTilda 并求转置伴随解
    Adjoint(commands::adjoint::AdjointArgs),
    /// 分区求解后重构场
    Reconstruct(commands::reconstruct::ReconstructArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_log_filter(&cli.log_level)?,
    };

    // try_init 同时安装 log -> tracing 的桥接
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志失败: {e}"))?;

    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Quality(args) => commands::quality::execute(args),
        Commands::Adjoint(args) => commands::adjoint::execute(args),
        Commands::Reconstruct(args) => commands::reconstruct::execute(args),
    }
}

/// 解析 `--log-level`
fn parse_log_filter(spec: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(spec).map_err(|e| anyhow::anyhow!("无效的日志过滤 '{spec}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_levels_and_directives() {
        let warn = parse_log_filter("warn").unwrap();
        assert_eq!(warn.max_level_hint(), Some(LevelFilter::WARN));

        let mixed = parse_log_filter("da_adjoint=trace,info").unwrap();
        assert_eq!(mixed.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
