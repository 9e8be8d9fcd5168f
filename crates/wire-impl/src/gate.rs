//! 界面就绪门实现

use wire_abstractions::ReadinessGate;
use wire_common::Deferred;

/// 立即就绪
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateGate;

impl ReadinessGate for ImmediateGate {
    fn on_ready(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

/// 手动触发的就绪门
///
/// 触发前注册的回调在 [`ManualGate::fire`] 时执行，触发后注册的立即执行。
#[derive(Debug, Clone, Default)]
pub struct ManualGate {
    fired: Deferred<()>,
}

impl ManualGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发就绪，重复触发无效
    pub fn fire(&self) {
        let _ = self.fired.try_resolve(());
    }

    /// 是否已触发
    pub fn is_fired(&self) -> bool {
        !self.fired.is_pending()
    }
}

impl ReadinessGate for ManualGate {
    fn on_ready(&self, callback: Box<dyn FnOnce() + Send>) {
        self.fired.on_resolved(move |_| callback());
    }
}
