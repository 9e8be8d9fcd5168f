//! 作用域标识与对象生命周期状态

use crate::errors::WireError;
use std::fmt;

/// 作用域标识
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub id: uuid::Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ScopeInfo {
    /// 创建新作用域标识
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// 创建根作用域标识
    pub fn root() -> Self {
        Self::new("root")
    }

    /// 创建第 `index` 个子作用域标识
    pub fn child(&self, index: usize) -> Self {
        Self::new(format!("{}.child-{}", self.name, index))
    }
}

impl Default for ScopeInfo {
    fn default() -> Self {
        Self::root()
    }
}

/// 装配对象生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectState {
    /// 等待模块或构造参数
    #[default]
    Pending,
    /// 已创建
    Created,
    /// 属性已全部赋值
    PropertiesSet,
    /// 初始化方法已执行
    Initialized,
    /// 销毁方法已执行
    Destroyed,
}

impl ObjectState {
    /// 状态机的下一个合法状态
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Created),
            Self::Created => Some(Self::PropertiesSet),
            Self::PropertiesSet => Some(Self::Initialized),
            Self::Initialized => Some(Self::Destroyed),
            Self::Destroyed => None,
        }
    }

    /// 推进到目标状态，只允许前进一步
    pub fn advance(&mut self, to: Self) -> Result<(), WireError> {
        if self.next() != Some(to) {
            return Err(WireError::IllegalTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        *self = to;
        Ok(())
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::PropertiesSet => "properties-set",
            Self::Initialized => "initialized",
            Self::Destroyed => "destroyed",
        };
        f.write_str(label)
    }
}

/// 对象生命周期记录
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// 模块名称
    pub module: String,
    /// 当前状态
    pub state: ObjectState,
}

impl ObjectRecord {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            state: ObjectState::Pending,
        }
    }
}
