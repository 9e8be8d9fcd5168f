//! 内存模块加载器

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use wire_abstractions::{Module, ModuleLoader};
use wire_common::WireError;

/// 按名称注册模块的内存加载器
///
/// 克隆共享同一个注册表。记录每次加载请求，便于观察去重后的模块名。
#[derive(Debug, Clone, Default)]
pub struct StaticModuleLoader {
    modules: Arc<DashMap<String, Module>>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块，同名模块被替换
    pub fn register(&self, module: Module) {
        debug!("注册模块: {}", module.name);
        self.modules.insert(module.name.clone(), module);
    }

    /// 链式注册模块
    pub fn with_module(self, module: Module) -> Self {
        self.register(module);
        self
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// 历次加载请求
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, names: &[String]) -> Result<Vec<Module>, WireError> {
        self.requests.lock().push(names.to_vec());
        tokio::task::yield_now().await;

        names
            .iter()
            .map(|name| {
                self.modules
                    .get(name)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| WireError::ModuleLoad {
                        name: name.clone(),
                        message: "模块未注册".to_string(),
                    })
            })
            .collect()
    }
}
