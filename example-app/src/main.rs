//! # 示例应用程序
//!
//! 演示如何使用 Lorn Wire 按声明式规格装配对象图

mod demo;

use anyhow::Context as _;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wire_common::Value;
use wire_composition::{LoggingConfig, WireBuilder};
use wire_impl::StaticModuleLoader;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn Wire 示例应用")]
struct Args {
    /// 装配规格文件（JSON），不指定时使用内置规格
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// 装配配置文件（JSON 或 TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 使用 JSON 格式输出日志
    #[arg(long)]
    json_logs: bool,

    /// 装配完成后等待退出信号再销毁
    #[arg(long)]
    wait: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: parse_log_level(&args.log_level),
        json_format: args.json_logs,
        ..LoggingConfig::default()
    };

    let loader = StaticModuleLoader::new();
    demo::register(&loader);

    let mut builder = WireBuilder::new();
    if let Some(path) = &args.config {
        builder = builder.with_config_file(path)?;
    }
    builder
        .with_loader(Arc::new(loader))
        .with_default_module("demo/trace")
        .with_logging(logging)
        .install()?;

    info!("启动 Lorn Wire 示例应用");
    let spec = load_spec(args.spec.as_ref())?;

    let context = wire_composition::wire(&spec).await?;
    info!("装配完成: {}", context.info().name);
    for (name, value) in context.bindings() {
        match value.to_json() {
            Some(json) => println!("{name} = {json}"),
            None => println!("{name} = {value:?}"),
        }
    }

    if let Some(greeter) = context.get("greeter").as_ref().and_then(Value::downcast::<demo::Greeter>) {
        println!("{}", greeter.greet());
    }

    if args.wait {
        tokio::signal::ctrl_c().await?;
        info!("收到退出信号，正在关闭应用");
    }

    context.destroy().await?;
    wire_composition::reset().await?;
    info!("应用已关闭");
    Ok(())
}

/// 读取规格文件
fn load_spec(path: Option<&PathBuf>) -> anyhow::Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(default_spec());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取规格文件失败: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("规格文件不是有效的 JSON: {}", path.display()))
}

fn default_spec() -> serde_json::Value {
    json!({
        "started": {"$ref": "clock!now"},
        "greeter": {
            "create": {"module": "demo/greeter", "args": "Hello"},
            "properties": {"audience": ["wire", "rust"]},
            "init": "start",
            "destroy": "stop"
        },
        "clock": {"module": "demo/clock"}
    })
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
