//! # Wire Common
//!
//! 装配引擎的公共基础类型。
//!
//! ## 核心组件
//!
//! - [`Deferred`] / [`Promise`] - 单次赋值的延迟值，支持续体链与进度通知
//! - [`Value`] - 装配结果值树
//! - [`Component`] / [`Constructor`] - 活对象与构造器接口
//! - [`WireError`] - 装配错误类型
//! - [`WireConfig`] - 装配配置
//! - [`ObjectState`] / [`ScopeInfo`] - 对象生命周期与作用域标识
//!
//! ## 设计原则
//!
//! - 不阻塞宿主：所有阶段都以延迟值表达
//! - 失败只影响所在子树
//! - 延迟值可以直接在 tokio 上 `.await`

pub mod component;
pub mod configuration;
pub mod deferred;
pub mod errors;
pub mod lifecycle;
pub mod value;

pub use component::*;
pub use configuration::*;
pub use deferred::*;
pub use errors::*;
pub use lifecycle::*;
pub use value::*;
