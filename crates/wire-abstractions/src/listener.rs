//! 生命周期监听器

use crate::module::Module;
use std::fmt;
use std::sync::Arc;
use wire_common::{Bindings, Value, WireError};

type ModulesHandler = Arc<dyn Fn(&[Module]) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&Bindings, &str, &WireError) + Send + Sync>;
type BindingsHandler = Arc<dyn Fn(&Bindings) + Send + Sync>;
type ObjectHandler = Arc<dyn Fn(&Value, &serde_json::Value) + Send + Sync>;

/// 监听器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerCategory {
    ContextInit,
    ContextError,
    ContextReady,
    ContextDestroy,
    ObjectCreated,
    PropertiesApplied,
    ObjectInitialized,
    ObjectDestroyed,
}

impl ListenerCategory {
    /// 全部类别
    pub const ALL: [Self; 8] = [
        Self::ContextInit,
        Self::ContextError,
        Self::ContextReady,
        Self::ContextDestroy,
        Self::ObjectCreated,
        Self::PropertiesApplied,
        Self::ObjectInitialized,
        Self::ObjectDestroyed,
    ];
}

/// 一组监听处理函数，每个事件最多一个
#[derive(Default, Clone)]
pub struct Listeners {
    context_init: Option<ModulesHandler>,
    context_error: Option<ErrorHandler>,
    context_ready: Option<BindingsHandler>,
    context_destroy: Option<BindingsHandler>,
    object_created: Option<ObjectHandler>,
    properties_applied: Option<ObjectHandler>,
    object_initialized: Option<ObjectHandler>,
    object_destroyed: Option<ObjectHandler>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模块加载完成、插件扫描之后
    pub fn on_context_init<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[Module]) + Send + Sync + 'static,
    {
        self.context_init = Some(Arc::new(handler));
        self
    }

    /// 阶段失败
    pub fn on_context_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Bindings, &str, &WireError) + Send + Sync + 'static,
    {
        self.context_error = Some(Arc::new(handler));
        self
    }

    pub fn on_context_ready<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Bindings) + Send + Sync + 'static,
    {
        self.context_ready = Some(Arc::new(handler));
        self
    }

    pub fn on_context_destroy<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Bindings) + Send + Sync + 'static,
    {
        self.context_destroy = Some(Arc::new(handler));
        self
    }

    /// 对象创建完成，参数为对象和它的规格节点
    pub fn on_object_created<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value, &serde_json::Value) + Send + Sync + 'static,
    {
        self.object_created = Some(Arc::new(handler));
        self
    }

    pub fn on_properties_applied<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value, &serde_json::Value) + Send + Sync + 'static,
    {
        self.properties_applied = Some(Arc::new(handler));
        self
    }

    pub fn on_object_initialized<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value, &serde_json::Value) + Send + Sync + 'static,
    {
        self.object_initialized = Some(Arc::new(handler));
        self
    }

    pub fn on_object_destroyed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value, &serde_json::Value) + Send + Sync + 'static,
    {
        self.object_destroyed = Some(Arc::new(handler));
        self
    }

    /// 是否实现了指定类别
    pub fn handles(&self, category: ListenerCategory) -> bool {
        match category {
            ListenerCategory::ContextInit => self.context_init.is_some(),
            ListenerCategory::ContextError => self.context_error.is_some(),
            ListenerCategory::ContextReady => self.context_ready.is_some(),
            ListenerCategory::ContextDestroy => self.context_destroy.is_some(),
            ListenerCategory::ObjectCreated => self.object_created.is_some(),
            ListenerCategory::PropertiesApplied => self.properties_applied.is_some(),
            ListenerCategory::ObjectInitialized => self.object_initialized.is_some(),
            ListenerCategory::ObjectDestroyed => self.object_destroyed.is_some(),
        }
    }

    /// 已实现的类别
    pub fn categories(&self) -> Vec<ListenerCategory> {
        ListenerCategory::ALL
            .into_iter()
            .filter(|category| self.handles(*category))
            .collect()
    }

    pub fn context_init(&self, modules: &[Module]) {
        if let Some(handler) = &self.context_init {
            handler(modules);
        }
    }

    pub fn context_error(&self, bindings: &Bindings, message: &str, error: &WireError) {
        if let Some(handler) = &self.context_error {
            handler(bindings, message, error);
        }
    }

    pub fn context_ready(&self, bindings: &Bindings) {
        if let Some(handler) = &self.context_ready {
            handler(bindings);
        }
    }

    pub fn context_destroy(&self, bindings: &Bindings) {
        if let Some(handler) = &self.context_destroy {
            handler(bindings);
        }
    }

    /// 按对象事件类别分派
    pub fn object_event(&self, category: ListenerCategory, object: &Value, spec: &serde_json::Value) {
        let handler = match category {
            ListenerCategory::ObjectCreated => &self.object_created,
            ListenerCategory::PropertiesApplied => &self.properties_applied,
            ListenerCategory::ObjectInitialized => &self.object_initialized,
            ListenerCategory::ObjectDestroyed => &self.object_destroyed,
            _ => return,
        };
        if let Some(handler) = handler {
            handler(object, spec);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("categories", &self.categories())
            .finish()
    }
}
