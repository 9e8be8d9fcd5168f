//! 装配构建器

use crate::logging::{init_logging, LoggingConfig};
use crate::runtime;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use wire_abstractions::{Module, ModuleLoader, ReadinessGate};
use wire_common::{Promise, WireConfig, WireError};
use wire_impl::{Context, Engine, ImmediateGate, StaticModuleLoader};

/// 装配构建器
///
/// 使用建造者模式组装模块加载器、就绪门、配置和日志。
pub struct WireBuilder {
    /// 外部模块加载器，未设置时使用内存加载器
    loader: Option<Arc<dyn ModuleLoader>>,
    /// 注册到内存加载器的模块
    modules: Vec<Module>,
    /// 界面就绪门
    gate: Arc<dyn ReadinessGate>,
    /// 装配配置
    config: WireConfig,
    /// 是否校验配置
    validation_enabled: bool,
    /// 是否初始化日志
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl WireBuilder {
    /// 创建新的装配构建器
    pub fn new() -> Self {
        Self {
            loader: None,
            modules: Vec::new(),
            gate: Arc::new(ImmediateGate),
            config: WireConfig::default(),
            validation_enabled: true,
            logging_enabled: false,
            logging_config: LoggingConfig::default(),
        }
    }

    /// 使用外部模块加载器
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// 注册模块；设置了外部加载器时这些模块会被忽略
    pub fn with_module(mut self, module: Module) -> Self {
        debug!("添加模块: {}", module.name);
        self.modules.push(module);
        self
    }

    /// 设置界面就绪门
    pub fn with_gate(mut self, gate: Arc<dyn ReadinessGate>) -> Self {
        self.gate = gate;
        self
    }

    /// 设置装配配置
    pub fn with_config(mut self, config: WireConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 JSON 或 TOML 文件加载装配配置
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, WireError> {
        let path = path.as_ref();
        info!("加载装配配置: {}", path.display());
        self.config = WireConfig::from_file(path)?;
        Ok(self)
    }

    /// 设置进程级根作用域的规格
    pub fn with_root_spec(mut self, spec: JsonValue) -> Self {
        self.config.root_spec = spec;
        self
    }

    /// 添加每个作用域都加载的模块
    pub fn with_default_module(mut self, name: impl Into<String>) -> Self {
        self.config.default_modules.push(name.into());
        self
    }

    /// 启用或禁用配置校验
    pub fn enable_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true;
        self
    }

    /// 构建装配实例
    pub fn build(self) -> Result<Wiring, WireError> {
        if self.logging_enabled {
            init_logging(&self.logging_config)?;
        }
        info!("开始构建装配实例");

        if self.validation_enabled {
            self.config.validate()?;
        }

        let loader = match self.loader {
            Some(loader) => loader,
            None => {
                let loader = StaticModuleLoader::new();
                for module in self.modules {
                    loader.register(module);
                }
                Arc::new(loader)
            }
        };

        let engine = Engine::new(loader)
            .with_gate(self.gate)
            .with_config(self.config);
        info!("装配实例构建完成");
        Ok(Wiring { engine })
    }

    /// 构建并安装为进程级装配运行时
    pub fn install(self) -> Result<(), WireError> {
        let wiring = self.build()?;
        runtime::install(wiring);
        Ok(())
    }
}

impl Default for WireBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 构建完成的装配实例
#[derive(Clone)]
pub struct Wiring {
    engine: Engine,
}

impl Wiring {
    /// 底层引擎
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// 当前配置
    pub fn config(&self) -> &WireConfig {
        self.engine.config()
    }

    /// 装配一个独立的根作用域
    pub fn wire(&self, spec: &JsonValue) -> Promise<Context> {
        self.engine.wire(spec)
    }

    /// 装配配置中的根规格
    pub(crate) fn wire_root(&self) -> Promise<Context> {
        self.engine.wire(&self.config().root_spec)
    }
}
