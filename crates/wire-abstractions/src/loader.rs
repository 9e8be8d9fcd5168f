//! 模块加载器抽象接口

use crate::module::Module;
use async_trait::async_trait;
use wire_common::WireError;

/// 模块加载器 trait
///
/// 引擎在每个作用域中只调用一次，`names` 已按文档顺序去重。
/// 返回的模块顺序不作要求，引擎按名称匹配。
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// 批量加载模块
    async fn load(&self, names: &[String]) -> Result<Vec<Module>, WireError>;
}
