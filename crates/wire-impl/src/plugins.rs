//! 插件注册表

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use wire_abstractions::{ListenerCategory, Listeners, Module, PropertySetter, ReferenceResolver};
use wire_common::{Value, WireError};

#[derive(Default)]
struct Entries {
    resolvers: HashMap<String, Arc<dyn ReferenceResolver>>,
    setters: Vec<Arc<dyn PropertySetter>>,
    listeners: HashMap<ListenerCategory, Vec<Arc<Listeners>>>,
}

/// 作用域的插件注册表
///
/// 解析器按标签合并，后扫描的覆盖先扫描的；设置器前插，后扫描的优先；
/// 监听器按实现的类别追加。
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<Entries>,
}

/// 一次属性映射赋值期间上次成功的设置器
///
/// 只在同一个目标的同一批属性之间共享，随该批赋值结束而丢弃。
#[derive(Clone, Default)]
pub struct SetterCache(Arc<Mutex<Option<Arc<dyn PropertySetter>>>>);

impl SetterCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 扫描模块中的插件并注册，然后依次执行插件的加载钩子
    pub fn scan(&self, modules: &[Module]) {
        let plugins: Vec<_> = modules
            .iter()
            .filter_map(|module| module.plugin.as_ref().map(|plugin| (&module.name, plugin)))
            .collect();

        {
            let mut entries = self.entries.write();
            for (name, plugin) in &plugins {
                debug!("注册插件: {}", name);
                if let Some(resolvers) = &plugin.resolvers {
                    for (tag, resolver) in resolvers {
                        entries.resolvers.insert(tag.clone(), Arc::clone(resolver));
                    }
                }
                if let Some(setters) = &plugin.setters {
                    let mut merged: Vec<_> = setters.iter().cloned().collect();
                    merged.append(&mut entries.setters);
                    entries.setters = merged;
                }
                if let Some(listeners) = &plugin.listeners {
                    for category in listeners.categories() {
                        entries
                            .listeners
                            .entry(category)
                            .or_default()
                            .push(Arc::clone(listeners));
                    }
                }
            }
        }

        for (_, plugin) in plugins {
            plugin.load();
        }
    }

    /// 按标签查找解析器
    pub fn resolver(&self, tag: &str) -> Option<Arc<dyn ReferenceResolver>> {
        self.entries.read().resolvers.get(tag).cloned()
    }

    /// 指定类别的监听器
    pub fn listeners(&self, category: ListenerCategory) -> Vec<Arc<Listeners>> {
        self.entries
            .read()
            .listeners
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    /// 用第一个接受的设置器给目标赋值
    ///
    /// 本批赋值上次成功的设置器优先尝试，失败时按注册顺序重新扫描。
    pub fn assign(
        &self,
        cache: &SetterCache,
        target: &Value,
        name: &str,
        value: &Value,
    ) -> Result<(), WireError> {
        let cached = cache.0.lock().clone();
        if let Some(setter) = &cached {
            if setter.set(target, name, value) {
                return Ok(());
            }
        }

        let setters = self.entries.read().setters.clone();
        for setter in setters {
            if cached.as_ref().map_or(false, |cached| Arc::ptr_eq(cached, &setter)) {
                continue;
            }
            if setter.set(target, name, value) {
                *cache.0.lock() = Some(setter);
                return Ok(());
            }
        }

        Err(WireError::NoSetter {
            property: name.to_string(),
        })
    }
}
