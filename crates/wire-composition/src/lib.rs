//! # 装配组合层
//!
//! 把装配引擎、模块加载器、就绪门和日志组合成一个可直接使用的装配实例，
//! 并提供进程级的装配入口。
//!
//! ## 主要功能
//!
//! - **装配构建器**: 使用构建者模式组装引擎
//! - **进程级入口**: 第一次调用启动根作用域，之后的调用装配为根作用域的子作用域
//! - **日志初始化**: 开发与生产两套预设
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use serde_json::json;
//! use wire_abstractions::Module;
//! use wire_common::Value;
//! use wire_composition::WireBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     WireBuilder::new()
//!         .with_module(Module::new("app/config", Value::from(json!({"port": 8080}))))
//!         .with_root_spec(json!({"config": {"module": "app/config"}}))
//!         .install()?;
//!
//!     let context = wire_composition::wire(&json!({"port": {"$ref": "config"}})).await?;
//!     println!("{:?}", context.get("port"));
//!
//!     wire_composition::reset().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod logging;
pub mod runtime;

pub use builder::{WireBuilder, Wiring};
pub use logging::{init_logging, LoggingConfig};
pub use runtime::{install, is_installed, reset, root, wire, wiring};

pub use wire_common::WireError;
pub use wire_impl::Context;
