//! 进程级装配入口
//!
//! 安装一个 [`Wiring`] 后，[`wire`] 在第一次调用时装配配置中的根规格，
//! 之后每次调用都以根作用域为父作用域装配子规格。根作用域启动期间的调用
//! 排队等待根作用域就绪。[`reset`] 销毁根作用域并卸载运行时。

use crate::builder::Wiring;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use wire_common::{Deferred, Promise, WireError};
use wire_impl::Context;

enum RootState {
    Uninstalled,
    Installed(Wiring),
    Booting { wiring: Wiring, root: Deferred<Context> },
    Ready { wiring: Wiring, root: Context },
}

struct Runtime {
    /// 每次安装或重置递增，用于丢弃过期的根作用域完成通知
    generation: u64,
    state: RootState,
}

static RUNTIME: Lazy<Mutex<Runtime>> = Lazy::new(|| {
    Mutex::new(Runtime {
        generation: 0,
        state: RootState::Uninstalled,
    })
});

/// 安装进程级装配运行时，替换已有的安装
pub fn install(wiring: Wiring) {
    let previous = {
        let mut runtime = RUNTIME.lock();
        runtime.generation += 1;
        std::mem::replace(&mut runtime.state, RootState::Installed(wiring))
    };
    if let RootState::Ready { root, .. } = previous {
        warn!("替换已启动的装配运行时，旧根作用域不会自动销毁: {}", root.info().name);
    }
    info!("装配运行时已安装");
}

/// 是否已安装运行时
pub fn is_installed() -> bool {
    !matches!(RUNTIME.lock().state, RootState::Uninstalled)
}

/// 当前安装的装配实例
pub fn wiring() -> Option<Wiring> {
    match &RUNTIME.lock().state {
        RootState::Uninstalled => None,
        RootState::Installed(wiring)
        | RootState::Booting { wiring, .. }
        | RootState::Ready { wiring, .. } => Some(wiring.clone()),
    }
}

/// 已就绪的根作用域
pub fn root() -> Option<Context> {
    match &RUNTIME.lock().state {
        RootState::Ready { root, .. } => Some(root.clone()),
        _ => None,
    }
}

/// 以进程级根作用域为父作用域装配规格
///
/// 第一次调用启动根作用域；根作用域失败时本次及之后的调用都以同样的
/// 错误拒绝，直到 [`reset`]。
pub fn wire(spec: &JsonValue) -> Promise<Context> {
    let (root, boot) = {
        let mut guard = RUNTIME.lock();
        let runtime = &mut *guard;
        match &runtime.state {
            RootState::Uninstalled => {
                return Deferred::rejected(WireError::RuntimeNotInstalled).promise();
            }
            RootState::Ready { root, .. } => (Root::Ready(root.clone()), None),
            RootState::Booting { root, .. } => (Root::Booting(root.clone()), None),
            RootState::Installed(wiring) => {
                let wiring = wiring.clone();
                let root = Deferred::new();
                runtime.state = RootState::Booting {
                    wiring: wiring.clone(),
                    root: root.clone(),
                };
                (Root::Booting(root), Some((wiring, runtime.generation)))
            }
        }
    };

    let root = match root {
        Root::Ready(root) => return root.wire(spec),
        Root::Booting(root) => root,
    };
    match boot {
        Some((wiring, generation)) => boot_root(&wiring, generation, &root),
        None => debug!("根作用域启动中，排队等待"),
    }

    let child = Deferred::new();
    let target = child.clone();
    let failed = child.clone();
    let spec = spec.clone();
    root.then(
        move |root: &Context| {
            root.wire(&spec).forward_to(&target);
        },
        move |error| {
            let _ = failed.try_reject(error.clone());
        },
    );
    child.promise()
}

enum Root {
    Ready(Context),
    Booting(Deferred<Context>),
}

fn boot_root(wiring: &Wiring, generation: u64, root: &Deferred<Context>) {
    info!("启动进程级根作用域");
    let ready = root.clone();
    let failed = root.clone();
    wiring.wire_root().then(
        move |context: &Context| {
            {
                let mut guard = RUNTIME.lock();
                let runtime = &mut *guard;
                let booting = match &runtime.state {
                    RootState::Booting { wiring, .. } if runtime.generation == generation => {
                        Some(wiring.clone())
                    }
                    _ => None,
                };
                if let Some(wiring) = booting {
                    runtime.state = RootState::Ready {
                        wiring,
                        root: context.clone(),
                    };
                }
            }
            let _ = ready.try_resolve(context.clone());
        },
        move |error| {
            warn!("根作用域启动失败: {}", error);
            let _ = failed.try_reject(error.clone());
        },
    );
}

/// 销毁根作用域并卸载运行时
///
/// 根作用域尚未就绪时直接丢弃句柄；返回根作用域的销毁完成。
pub fn reset() -> Promise<()> {
    let previous = {
        let mut runtime = RUNTIME.lock();
        runtime.generation += 1;
        std::mem::replace(&mut runtime.state, RootState::Uninstalled)
    };

    match previous {
        RootState::Ready { root, .. } => {
            info!("重置装配运行时，销毁根作用域: {}", root.info().name);
            root.destroy()
        }
        _ => {
            debug!("重置装配运行时");
            Deferred::resolved(()).promise()
        }
    }
}
