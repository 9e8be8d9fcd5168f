//! 错误类型定义

use std::sync::Arc;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("配置文件读取失败: {path}, 原因: {message}")]
    FileReadError { path: String, message: String },

    #[error("配置解析失败: {message}")]
    ParseError { message: String },

    #[error("不支持的配置文件格式: {path}")]
    UnsupportedFormat { path: String },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 装配错误类型
///
/// 所有阶段 future 的拒绝值都是这个类型，因此需要可以廉价克隆。
#[derive(Error, Debug, Clone)]
pub enum WireError {
    #[error("Deferred 已经完成，不能重复完成")]
    AlreadyCompleted,

    #[error("装配规格无效: {message}")]
    InvalidSpec { message: String },

    #[error("模块加载失败: {name}, 原因: {message}")]
    ModuleLoad { name: String, message: String },

    #[error("模块未加载: {name}")]
    ModuleNotLoaded { name: String },

    #[error("模块加载阶段失败 (module loading failed): {source}")]
    ModuleLoadingFailed { source: Arc<WireError> },

    #[error("对象构造失败: {module}, 原因: {message}")]
    Construction { module: String, message: String },

    #[error("对象创建阶段失败 (object creation failed): {source}")]
    ObjectCreationFailed { source: Arc<WireError> },

    #[error("没有属性设置器接受属性: {property}")]
    NoSetter { property: String },

    #[error("初始化方法调用失败: {method}, 原因: {message}")]
    InitFailed { method: String, message: String },

    #[error("方法不存在: {method}")]
    MethodNotFound { method: String },

    #[error("无法解析引用 (cannot resolve reference): {name}")]
    UnresolvedReference { name: String },

    #[error("上下文未就绪，销毁中止: {source}")]
    DestroyAborted { source: Arc<WireError> },

    #[error("对象生命周期状态转换非法: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("当前线程没有可用的 tokio 运行时")]
    NoRuntime,

    #[error("装配运行时尚未安装")]
    RuntimeNotInstalled,

    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("{message}")]
    Custom { message: String },
}

impl WireError {
    /// 创建规格无效错误
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// 创建自定义错误，供构造器和组件方法使用
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建无法解析引用错误
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::UnresolvedReference { name: name.into() }
    }

    /// 是否为重复完成错误
    pub fn is_already_completed(&self) -> bool {
        matches!(self, Self::AlreadyCompleted)
    }
}

/// 结果类型别名
pub type WireResult<T> = Result<T, WireError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
