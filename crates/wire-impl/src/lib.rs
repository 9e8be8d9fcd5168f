//! # Wire Impl
//!
//! 装配引擎实现：规格解析、对象生命周期、作用域编排和插件注册。
//!
//! ## 核心组件
//!
//! - [`Engine`] - 装配入口，每次装配创建根作用域
//! - [`Context`] - 已就绪作用域的句柄
//! - [`PluginRegistry`] - 解析器、设置器和监听器注册表
//! - [`StaticModuleLoader`] - 内存模块加载器
//! - [`ImmediateGate`] / [`ManualGate`] - 界面就绪门

mod object;
mod references;

pub mod base;
pub mod engine;
pub mod gate;
pub mod loader;
pub mod parser;
pub mod plugins;
pub mod scope;

pub use base::{base_module, BASE_MODULE};
pub use engine::Engine;
pub use gate::{ImmediateGate, ManualGate};
pub use loader::StaticModuleLoader;
pub use parser::collect_module_names;
pub use plugins::{PluginRegistry, SetterCache};
pub use scope::{Context, ScopeSettings};
