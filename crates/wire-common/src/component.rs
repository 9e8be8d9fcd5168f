//! 组件基础接口定义
//!
//! 装配出来的活对象都以 [`Component`] trait 对象的形式存放在作用域中。
//! 由于 Rust 没有运行时反射，属性赋值和方法调用都由组件自己按名称分派。

use crate::errors::WireError;
use crate::value::Value;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// 类型擦除辅助 trait，为所有 `'static` 类型自动实现
pub trait AsAny: Any + Send + Sync {
    /// 以 `&dyn Any` 形式借用
    fn as_any(&self) -> &dyn Any;

    /// 转换为 `Arc<dyn Any>`，用于向下转型
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 组件基础 trait
///
/// 组件通过内部可变性接受属性和方法调用，因为同一个实例会被作用域和
/// 所有引用它的对象共享。
pub trait Component: AsAny + Debug {
    /// 组件名称
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 设置命名属性，返回是否接受了该属性
    fn set_property(&self, _name: &str, _value: Value) -> bool {
        false
    }

    /// 组件是否提供指定名称的可调用方法
    fn has_method(&self, _method: &str) -> bool {
        false
    }

    /// 按名称调用方法
    fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<(), WireError> {
        Err(WireError::MethodNotFound {
            method: method.to_string(),
        })
    }
}

/// 构造器 trait
///
/// 对应模块被当作构造函数调用的情形，参数按位置传入。
pub trait Constructor: Send + Sync {
    /// 使用已解析的参数创建新实例
    fn construct(&self, args: Vec<Value>) -> Result<Value, WireError>;
}

impl<F> Constructor for F
where
    F: Fn(Vec<Value>) -> Result<Value, WireError> + Send + Sync,
{
    fn construct(&self, args: Vec<Value>) -> Result<Value, WireError> {
        self(args)
    }
}

/// 组件实例类型
pub type Instance = Arc<dyn Component>;
