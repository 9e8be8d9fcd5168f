//! 引用解析
//!
//! 引用名按第一个分隔符拆成解析器标签和名称，未带标签时使用默认解析器。
//! 当前作用域无法解析时交给父作用域，没有父作用域则拒绝。

use crate::scope::ScopeInner;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;
use wire_abstractions::{Resolution, ResolveCallback};
use wire_common::{Deferred, Value, WireError};

impl ScopeInner {
    /// 解析引用节点，非引用节点原样返回
    pub(crate) fn resolve_ref(self: &Arc<Self>, node: &JsonValue) -> Deferred<Value> {
        let reference = match node
            .as_object()
            .and_then(|map| map.get(&self.config().keys.reference))
        {
            None => return Deferred::resolved(Value::from(node)),
            Some(JsonValue::String(reference)) => reference.clone(),
            Some(other) => {
                return Deferred::rejected(WireError::invalid_spec(format!(
                    "引用必须是字符串: {other}"
                )))
            }
        };

        let target = Deferred::new();
        let scope = Arc::clone(self);
        let resolved = target.clone();
        let failed = target.clone();
        let node = node.clone();
        self.modules_ready.then(
            move |_| scope.resolve_ref_obj(&reference, &node, resolved),
            move |error| {
                let _ = failed.try_reject(error.clone());
            },
        );
        target
    }

    /// 按名称解析，名称可以带解析器标签
    pub(crate) fn resolve_name(self: &Arc<Self>, name: &str) -> Deferred<Value> {
        let mut node = serde_json::Map::new();
        node.insert(
            self.config().keys.reference.clone(),
            JsonValue::String(name.to_string()),
        );
        self.resolve_ref(&JsonValue::Object(node))
    }

    /// 拆分标签并调用解析器，结果写入 `target`
    pub(crate) fn resolve_ref_obj(self: &Arc<Self>, reference: &str, node: &JsonValue, target: Deferred<Value>) {
        let config = self.config();
        let (tag, name) = match reference.split_once(config.resolver_delimiter.as_str()) {
            Some((tag, name)) => (tag, name),
            None => (config.default_resolver.as_str(), reference),
        };

        let Some(resolver) = self.plugins.resolver(tag) else {
            debug!("作用域 {} 没有解析器 '{}'", self.info.name, tag);
            return self.delegate_to_parent(reference, node, target);
        };

        let callback = ResolveCallback::new();
        let scope = Arc::clone(self);
        let reference_owned = reference.to_string();
        let node_owned = node.clone();
        let failed = target.clone();
        callback.outcome().then(
            move |resolution| match resolution {
                Resolution::Resolved(value) => {
                    let _ = target.try_resolve(value.clone());
                }
                Resolution::Unresolved => scope.delegate_to_parent(&reference_owned, &node_owned, target),
            },
            move |error| {
                let _ = failed.try_reject(error.clone());
            },
        );
        resolver.resolve(self.plugin_context(), name, node, callback);
    }

    fn delegate_to_parent(&self, reference: &str, node: &JsonValue, target: Deferred<Value>) {
        let Some(parent) = self.parent.clone() else {
            let _ = target.try_reject(WireError::unresolved(reference));
            return;
        };

        debug!("引用 '{}' 交给父作用域 {}", reference, parent.info.name);
        let scope = Arc::clone(&parent);
        let reference = reference.to_string();
        let node = node.clone();
        let failed = target.clone();
        parent.modules_ready.then(
            move |_| scope.resolve_ref_obj(&reference, &node, target),
            move |error| {
                let _ = failed.try_reject(error.clone());
            },
        );
    }
}
