//! 交互界面就绪门

/// 就绪门 trait
///
/// 上下文就绪前需要等待宿主界面可用，界面就绪时调用回调。
/// 注册时已经就绪的实现应当立即调用回调。
pub trait ReadinessGate: Send + Sync {
    /// 注册就绪回调
    fn on_ready(&self, callback: Box<dyn FnOnce() + Send>);
}
