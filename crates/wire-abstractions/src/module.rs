//! 已加载模块

use crate::plugin::Plugin;
use std::fmt;
use std::sync::Arc;
use wire_common::Value;

/// 模块加载器返回的模块
///
/// `value` 是模块导出的值，创建节点会以它为构造器或直接作为对象；
/// `plugin` 是模块贡献的插件，扫描插件时注册到作用域。
#[derive(Clone)]
pub struct Module {
    pub name: String,
    pub value: Value,
    pub plugin: Option<Arc<Plugin>>,
}

impl Module {
    /// 创建普通模块
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            plugin: None,
        }
    }

    /// 创建只贡献插件的模块
    pub fn plugin(name: impl Into<String>, plugin: Plugin) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            plugin: Some(Arc::new(plugin)),
        }
    }

    /// 附加插件
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugin = Some(Arc::new(plugin));
        self
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("has_plugin", &self.plugin.is_some())
            .finish()
    }
}
