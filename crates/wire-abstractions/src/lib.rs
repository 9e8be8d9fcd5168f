//! # Wire Abstractions
//!
//! 装配抽象层，定义模块、插件协议以及引擎依赖的外部协作者接口。
//!
//! ## 核心接口
//!
//! - [`Module`] - 已加载模块
//! - [`Plugin`] - 插件：解析器、属性设置器、监听器
//! - [`PluginContext`] - 插件可见的作用域能力
//! - [`Listeners`] - 生命周期监听器
//! - [`ModuleLoader`] - 模块加载器接口
//! - [`ReadinessGate`] - 界面就绪门接口

pub mod gate;
pub mod listener;
pub mod loader;
pub mod module;
pub mod plugin;

pub use gate::*;
pub use listener::*;
pub use loader::*;
pub use module::*;
pub use plugin::*;
