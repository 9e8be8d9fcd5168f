//! 装配引擎入口

use crate::gate::ImmediateGate;
use crate::scope::{Context, ScopeInner, ScopeSettings};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use wire_abstractions::{ModuleLoader, ReadinessGate};
use wire_common::{Promise, ScopeInfo, WireConfig};

/// 装配引擎
///
/// 每次 [`Engine::wire`] 创建一个独立的根作用域。
#[derive(Clone)]
pub struct Engine {
    settings: ScopeSettings,
}

impl Engine {
    /// 使用指定模块加载器创建引擎，默认立即就绪门与默认配置
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            settings: ScopeSettings {
                config: Arc::new(WireConfig::default()),
                loader,
                gate: Arc::new(ImmediateGate),
            },
        }
    }

    /// 设置界面就绪门
    pub fn with_gate(mut self, gate: Arc<dyn ReadinessGate>) -> Self {
        self.settings.gate = gate;
        self
    }

    /// 设置装配配置
    pub fn with_config(mut self, config: WireConfig) -> Self {
        self.settings.config = Arc::new(config);
        self
    }

    /// 当前配置
    pub fn config(&self) -> &WireConfig {
        &self.settings.config
    }

    /// 装配根作用域
    pub fn wire(&self, spec: &JsonValue) -> Promise<Context> {
        ScopeInner::new(self.settings.clone(), None, ScopeInfo::root()).wire(spec)
    }
}
