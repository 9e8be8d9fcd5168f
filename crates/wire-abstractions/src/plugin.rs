//! 插件协议
//!
//! 模块可以通过 [`Plugin`] 向作用域贡献三类扩展：
//! 引用解析器（按标签注册）、属性设置器（有序）和生命周期监听器。

use crate::listener::Listeners;
use crate::module::Module;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use wire_common::{Bindings, Deferred, Promise, ScopeInfo, Value, WireError};

/// 插件可见的作用域能力
pub trait PluginContext: Send + Sync {
    /// 作用域标识
    fn scope(&self) -> ScopeInfo;

    /// 模块加载完成
    fn modules_ready(&self) -> Promise<Vec<Module>>;

    /// 所有对象创建完成
    fn objects_created(&self) -> Promise<Bindings>;

    /// 上下文就绪
    fn context_ready(&self) -> Promise<Bindings>;

    /// 交互界面就绪
    fn surface_ready(&self) -> Promise<()>;

    /// 上下文已销毁
    fn context_destroyed(&self) -> Promise<()>;

    /// 按名称解析引用，名称可以带解析器标签
    fn resolve_name(&self, name: &str) -> Promise<Value>;

    /// 解析引用节点，非引用节点原样返回
    fn resolve_ref(&self, node: &serde_json::Value) -> Promise<Value>;

    /// 在当前作用域中解析任意规格节点
    fn parse(&self, node: &serde_json::Value) -> Promise<Value>;

    /// 对目标对象应用属性映射，完成后返回目标对象
    fn set_properties(&self, target: &Value, properties: &serde_json::Value) -> Promise<Value>;

    /// 当前作用域中已有的绑定
    fn lookup(&self, name: &str) -> Option<Value>;

    /// 名称是当前作用域中尚未解析完成的顶层键时，返回等待该绑定的 promise
    fn await_binding(&self, name: &str) -> Option<Promise<Value>>;
}

/// 引用解析结果
#[derive(Debug, Clone)]
pub enum Resolution {
    /// 解析成功
    Resolved(Value),
    /// 当前作用域无法解析，交给父作用域
    Unresolved,
}

/// 解析器回调
///
/// 解析器可以同步调用，也可以保存回调稍后在其他任务中调用。
/// 只有第一次调用生效。
#[derive(Debug, Clone)]
pub struct ResolveCallback {
    outcome: Deferred<Resolution>,
}

impl ResolveCallback {
    /// 创建回调
    pub fn new() -> Self {
        Self {
            outcome: Deferred::new(),
        }
    }

    /// 解析成功
    pub fn resolve(&self, value: Value) {
        if self.outcome.try_resolve(Resolution::Resolved(value)).is_err() {
            debug!("解析器回调已完成，忽略重复的 resolve");
        }
    }

    /// 解析失败
    pub fn reject(&self, error: WireError) {
        if self.outcome.try_reject(error).is_err() {
            debug!("解析器回调已完成，忽略重复的 reject");
        }
    }

    /// 当前作用域无法解析
    pub fn unresolved(&self) {
        if self.outcome.try_resolve(Resolution::Unresolved).is_err() {
            debug!("解析器回调已完成，忽略重复的 unresolved");
        }
    }

    /// 回调结果
    pub fn outcome(&self) -> Promise<Resolution> {
        self.outcome.promise()
    }
}

impl Default for ResolveCallback {
    fn default() -> Self {
        Self::new()
    }
}

/// 引用解析器
pub trait ReferenceResolver: Send + Sync {
    /// 解析名称，结果通过回调报告
    fn resolve(
        &self,
        context: Arc<dyn PluginContext>,
        name: &str,
        node: &serde_json::Value,
        callback: ResolveCallback,
    );
}

impl<F> ReferenceResolver for F
where
    F: Fn(Arc<dyn PluginContext>, &str, &serde_json::Value, ResolveCallback) + Send + Sync,
{
    fn resolve(
        &self,
        context: Arc<dyn PluginContext>,
        name: &str,
        node: &serde_json::Value,
        callback: ResolveCallback,
    ) {
        self(context, name, node, callback)
    }
}

/// 属性设置器，返回是否接受了该属性
pub trait PropertySetter: Send + Sync {
    fn set(&self, target: &Value, name: &str, value: &Value) -> bool;
}

impl<F> PropertySetter for F
where
    F: Fn(&Value, &str, &Value) -> bool + Send + Sync,
{
    fn set(&self, target: &Value, name: &str, value: &Value) -> bool {
        self(target, name, value)
    }
}

type LoadHook = Box<dyn Fn() + Send + Sync>;

/// 插件
///
/// 每个槽位都是可选的，扫描时只注册存在的部分。
#[derive(Default)]
pub struct Plugin {
    pub resolvers: Option<HashMap<String, Arc<dyn ReferenceResolver>>>,
    pub setters: Option<Vec<Arc<dyn PropertySetter>>>,
    pub listeners: Option<Arc<Listeners>>,
    on_load: Option<LoadHook>,
    loaded: OnceCell<()>,
}

impl Plugin {
    /// 创建空插件
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册解析器
    pub fn with_resolver(mut self, tag: impl Into<String>, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.resolvers
            .get_or_insert_with(HashMap::new)
            .insert(tag.into(), resolver);
        self
    }

    /// 以闭包注册解析器
    pub fn resolver_fn<F>(self, tag: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Arc<dyn PluginContext>, &str, &serde_json::Value, ResolveCallback) + Send + Sync + 'static,
    {
        self.with_resolver(tag, Arc::new(resolver))
    }

    /// 追加属性设置器
    pub fn with_setter(mut self, setter: Arc<dyn PropertySetter>) -> Self {
        self.setters.get_or_insert_with(Vec::new).push(setter);
        self
    }

    /// 以闭包追加属性设置器
    pub fn setter_fn<F>(self, setter: F) -> Self
    where
        F: Fn(&Value, &str, &Value) -> bool + Send + Sync + 'static,
    {
        self.with_setter(Arc::new(setter))
    }

    /// 设置监听器
    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = Some(Arc::new(listeners));
        self
    }

    /// 设置加载钩子
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_load = Some(Box::new(hook));
        self
    }

    /// 执行加载钩子，同一个插件实例只执行一次
    pub fn load(&self) {
        self.loaded.get_or_init(|| {
            if let Some(hook) = &self.on_load {
                hook();
            }
        });
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&String> = self
            .resolvers
            .as_ref()
            .map(|resolvers| resolvers.keys().collect())
            .unwrap_or_default();
        f.debug_struct("Plugin")
            .field("resolvers", &tags)
            .field("setters", &self.setters.as_ref().map_or(0, Vec::len))
            .field("listeners", &self.listeners)
            .field("has_on_load", &self.on_load.is_some())
            .finish()
    }
}
