//! 装配引擎配置
//!
//! 支持 JSON 与 TOML 两种格式，从文件加载时按扩展名选择解析器。

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// 规格中的保留键名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedKeys {
    /// 引用键
    pub reference: String,
    /// 模块键
    pub module: String,
    /// 构造键
    pub create: String,
    /// 构造参数键
    pub args: String,
    /// 属性键
    pub properties: String,
    /// 初始化键
    pub init: String,
    /// 销毁键
    pub destroy: String,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self {
            reference: "$ref".to_string(),
            module: "module".to_string(),
            create: "create".to_string(),
            args: "args".to_string(),
            properties: "properties".to_string(),
            init: "init".to_string(),
            destroy: "destroy".to_string(),
        }
    }
}

impl ReservedKeys {
    fn all(&self) -> [&str; 7] {
        [
            &self.reference,
            &self.module,
            &self.create,
            &self.args,
            &self.properties,
            &self.init,
            &self.destroy,
        ]
    }
}

/// 装配配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// 保留键名
    pub keys: ReservedKeys,
    /// 引用名中解析器标签与名称的分隔符
    pub resolver_delimiter: String,
    /// 引用未带标签时使用的解析器
    pub default_resolver: String,
    /// 每个作用域都会加载并扫描插件的模块
    pub default_modules: Vec<String>,
    /// 进程级根作用域的规格
    pub root_spec: serde_json::Value,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            keys: ReservedKeys::default(),
            resolver_delimiter: "!".to_string(),
            default_resolver: "_".to_string(),
            default_modules: Vec::new(),
            root_spec: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl WireConfig {
    /// 从 JSON 字符串加载
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 字符串加载
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，按扩展名选择格式
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("加载装配配置文件: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.resolver_delimiter.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "resolver_delimiter 不能为空".to_string(),
            });
        }
        if self.default_resolver.contains(self.resolver_delimiter.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "default_resolver '{}' 不能包含分隔符 '{}'",
                    self.default_resolver, self.resolver_delimiter
                ),
            });
        }

        let keys = self.keys.all();
        for (i, key) in keys.iter().enumerate() {
            if key.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "保留键名不能为空".to_string(),
                });
            }
            if keys[..i].contains(key) {
                return Err(ConfigError::ValidationError {
                    message: format!("保留键名重复: {key}"),
                });
            }
        }

        if !(self.root_spec.is_object() || self.root_spec.is_array()) {
            return Err(ConfigError::ValidationError {
                message: "root_spec 必须是映射或序列".to_string(),
            });
        }
        Ok(())
    }
}
