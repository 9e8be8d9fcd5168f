//! 内置基础插件
//!
//! 每个作用域都会加载：默认标签的解析器在作用域绑定中查找名称，
//! 设置器把属性交给组件自己处理。

use std::sync::Arc;
use wire_abstractions::{Module, Plugin, PluginContext, ResolveCallback};
use wire_common::Value;

/// 内置基础模块名
pub const BASE_MODULE: &str = "wire/base";

/// 创建内置基础模块，解析器注册在 `tag` 下
pub fn base_module(tag: &str) -> Module {
    Module::plugin(BASE_MODULE, base_plugin(tag))
}

fn base_plugin(tag: &str) -> Plugin {
    Plugin::new()
        .resolver_fn(tag, resolve_binding)
        .setter_fn(|target, name, value| {
            target
                .as_object()
                .map_or(false, |object| object.set_property(name, value.clone()))
        })
}

/// 名称是尚未完成的顶层键时等待它，否则查找已有绑定
fn resolve_binding(
    context: Arc<dyn PluginContext>,
    name: &str,
    _node: &serde_json::Value,
    callback: ResolveCallback,
) {
    if let Some(pending) = context.await_binding(name) {
        let on_value = callback.clone();
        pending.then(
            move |value: &Value| on_value.resolve(value.clone()),
            move |error| callback.reject(error.clone()),
        );
        return;
    }

    match context.lookup(name) {
        Some(value) => callback.resolve(value),
        None => callback.unresolved(),
    }
}
