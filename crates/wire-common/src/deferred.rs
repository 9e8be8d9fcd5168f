//! 单次赋值的延迟值
//!
//! [`Deferred`] 只能被完成一次（解析或拒绝）。完成时按注册顺序依次调用
//! 续体，续体的返回值可以替换向后传递的结果，续体返回错误则把结果切换为
//! 拒绝。完成之后再注册的续体会立即同步地收到已存储的结果；在续体链
//! 执行期间注册的续体排到链尾，收到整条链处理后的最终结果。
//!
//! [`Promise`] 是只读视图，只能订阅不能完成；它同时实现了
//! [`std::future::Future`]，可以在 tokio 任务中直接 `.await`。

use crate::errors::WireError;
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::debug;

/// 续体处理结果：`Ok(None)` 保持原结果，`Ok(Some(v))` 替换结果，`Err(e)` 切换为拒绝
pub type Handled<T> = Result<Option<T>, WireError>;

type ResolveHandler<T> = Box<dyn FnOnce(&T) -> Handled<T> + Send>;
type RejectHandler = Box<dyn FnOnce(&WireError) -> Handled<WireError> + Send>;
type ProgressHandler = Arc<dyn Fn(&Value) -> Result<(), WireError> + Send + Sync>;

/// 一组续体处理函数
pub struct Continuation<T> {
    on_resolve: Option<ResolveHandler<T>>,
    on_reject: Option<RejectHandler>,
    on_progress: Option<ProgressHandler>,
}

impl<T> Continuation<T> {
    /// 创建空续体
    pub fn new() -> Self {
        Self {
            on_resolve: None,
            on_reject: None,
            on_progress: None,
        }
    }

    /// 设置解析处理函数
    pub fn on_resolve<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&T) -> Handled<T> + Send + 'static,
    {
        self.on_resolve = Some(Box::new(handler));
        self
    }

    /// 设置拒绝处理函数
    pub fn on_reject<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&WireError) -> Handled<WireError> + Send + 'static,
    {
        self.on_reject = Some(Box::new(handler));
        self
    }

    /// 设置进度处理函数
    pub fn on_progress<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<(), WireError> + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(handler));
        self
    }
}

impl<T> Default for Continuation<T> {
    fn default() -> Self {
        Self::new()
    }
}

enum Completion<T> {
    Pending,
    Resolved(T),
    Rejected(WireError),
}

struct Link<T> {
    on_resolve: Option<ResolveHandler<T>>,
    on_reject: Option<RejectHandler>,
}

struct State<T> {
    completion: Completion<T>,
    /// 完成后正在依次调用续体；期间注册的续体排在链尾
    settling: bool,
    chain: Vec<Link<T>>,
    progress: Vec<ProgressHandler>,
    wakers: Vec<Waker>,
}

/// 延迟值
pub struct Deferred<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + 'static,
{
    /// 创建待完成的延迟值
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                completion: Completion::Pending,
                settling: false,
                chain: Vec::new(),
                progress: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// 创建已解析的延迟值
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// 创建已拒绝的延迟值
    pub fn rejected(error: WireError) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    /// 是否仍未完成
    pub fn is_pending(&self) -> bool {
        matches!(self.state.lock().completion, Completion::Pending)
    }

    /// 已存储的结果，未完成时为 `None`
    pub fn outcome(&self) -> Option<Result<T, WireError>> {
        match &self.state.lock().completion {
            Completion::Pending => None,
            Completion::Resolved(value) => Some(Ok(value.clone())),
            Completion::Rejected(error) => Some(Err(error.clone())),
        }
    }

    /// 解析
    ///
    /// # Panics
    ///
    /// 重复完成属于使用错误，会直接 panic，已存储的结果保持不变。
    pub fn resolve(&self, value: T) {
        if let Err(error) = self.try_resolve(value) {
            panic!("{error}");
        }
    }

    /// 拒绝
    ///
    /// # Panics
    ///
    /// 与 [`Deferred::resolve`] 相同，重复完成会 panic。
    pub fn reject(&self, error: WireError) {
        if let Err(error) = self.try_reject(error) {
            panic!("{error}");
        }
    }

    /// 尝试解析，已完成时返回 [`WireError::AlreadyCompleted`]
    pub fn try_resolve(&self, value: T) -> Result<(), WireError> {
        self.complete(Ok(value))
    }

    /// 尝试拒绝，已完成时返回 [`WireError::AlreadyCompleted`]
    pub fn try_reject(&self, error: WireError) -> Result<(), WireError> {
        self.complete(Err(error))
    }

    fn complete(&self, outcome: Result<T, WireError>) -> Result<(), WireError> {
        let chain = {
            let mut state = self.state.lock();
            if !matches!(state.completion, Completion::Pending) {
                return Err(WireError::AlreadyCompleted);
            }
            state.completion = match &outcome {
                Ok(value) => Completion::Resolved(value.clone()),
                Err(error) => Completion::Rejected(error.clone()),
            };
            state.progress.clear();
            state.settling = true;
            std::mem::take(&mut state.chain)
        };

        let was_resolved = outcome.is_ok();
        let mut current = outcome;
        let mut links = chain;
        let wakers = loop {
            for link in links {
                current = Self::run_link(link, current);
            }

            let mut state = self.state.lock();
            if !state.chain.is_empty() {
                links = std::mem::take(&mut state.chain);
                continue;
            }
            // 续体抛错把解析切换成了拒绝，之后的订阅者看到的是拒绝
            if was_resolved {
                if let Err(error) = &current {
                    debug!("续体处理失败，延迟值切换为拒绝: {}", error);
                    state.completion = Completion::Rejected(error.clone());
                }
            }
            state.settling = false;
            break std::mem::take(&mut state.wakers);
        };

        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    fn run_link(link: Link<T>, current: Result<T, WireError>) -> Result<T, WireError> {
        match current {
            Ok(value) => match link.on_resolve {
                Some(handler) => match handler(&value) {
                    Ok(Some(next)) => Ok(next),
                    Ok(None) => Ok(value),
                    Err(error) => Err(error),
                },
                None => Ok(value),
            },
            Err(error) => match link.on_reject {
                Some(handler) => match handler(&error) {
                    Ok(Some(next)) | Err(next) => Err(next),
                    Ok(None) => Err(error),
                },
                None => Err(error),
            },
        }
    }

    /// 注册解析和拒绝处理函数
    pub fn then<R, E>(&self, on_resolve: R, on_reject: E) -> &Self
    where
        R: FnOnce(&T) + Send + 'static,
        E: FnOnce(&WireError) + Send + 'static,
    {
        self.then_with(
            Continuation::new()
                .on_resolve(move |value: &T| {
                    on_resolve(value);
                    Ok(None)
                })
                .on_reject(move |error: &WireError| {
                    on_reject(error);
                    Ok(None)
                }),
        )
    }

    /// 只注册解析处理函数
    pub fn on_resolved<R>(&self, on_resolve: R) -> &Self
    where
        R: FnOnce(&T) + Send + 'static,
    {
        self.then_with(Continuation::new().on_resolve(move |value: &T| {
            on_resolve(value);
            Ok(None)
        }))
    }

    /// 只注册拒绝处理函数
    pub fn on_rejected<E>(&self, on_reject: E) -> &Self
    where
        E: FnOnce(&WireError) + Send + 'static,
    {
        self.then_with(Continuation::new().on_reject(move |error: &WireError| {
            on_reject(error);
            Ok(None)
        }))
    }

    /// 只注册进度处理函数
    pub fn on_progress<P>(&self, on_progress: P) -> &Self
    where
        P: Fn(&Value) + Send + Sync + 'static,
    {
        self.then_with(Continuation::new().on_progress(move |status: &Value| {
            on_progress(status);
            Ok(())
        }))
    }

    /// 注册完整续体
    pub fn then_with(&self, continuation: Continuation<T>) -> &Self {
        let Continuation {
            on_resolve,
            on_reject,
            on_progress,
        } = continuation;

        let mut state = self.state.lock();
        let settled = match &state.completion {
            _ if state.settling => None,
            Completion::Pending => None,
            Completion::Resolved(value) => Some(Ok(value.clone())),
            Completion::Rejected(error) => Some(Err(error.clone())),
        };

        match settled {
            None => {
                if let Some(handler) = on_progress {
                    state.progress.push(handler);
                }
                state.chain.push(Link {
                    on_resolve,
                    on_reject,
                });
            }
            Some(result) => {
                drop(state);
                let handled = match result {
                    Ok(value) => on_resolve.map(|handler| handler(&value).map(|_| ())),
                    Err(error) => on_reject.map(|handler| handler(&error).map(|_| ())),
                };
                if let Some(Err(error)) = handled {
                    debug!("已完成延迟值的续体处理失败: {}", error);
                }
            }
        }
        self
    }

    /// 通知进度
    ///
    /// 进度处理函数失败时拒绝该延迟值，其余进度处理函数不再调用。
    /// 已完成的延迟值不再接受进度。
    pub fn progress(&self, status: &Value) {
        let handlers = {
            let state = self.state.lock();
            if !matches!(state.completion, Completion::Pending) {
                return;
            }
            state.progress.clone()
        };

        for handler in handlers {
            if let Err(error) = handler(status) {
                debug!("进度处理失败，拒绝延迟值: {}", error);
                let _ = self.try_reject(error);
                return;
            }
        }
    }

    /// 把结果转发到另一个延迟值
    pub fn forward_to(&self, target: &Deferred<T>) -> &Self {
        let on_ok = target.clone();
        let on_err = target.clone();
        self.then(
            move |value| {
                let _ = on_ok.try_resolve(value.clone());
            },
            move |error| {
                let _ = on_err.try_reject(error.clone());
            },
        )
    }

    /// 只读视图
    pub fn promise(&self) -> Promise<T> {
        Promise {
            deferred: self.clone(),
        }
    }
}

impl<T> Default for Deferred<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.lock().completion {
            Completion::Pending => "pending",
            Completion::Resolved(_) => "resolved",
            Completion::Rejected(_) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

/// 延迟值的只读视图
pub struct Promise<T> {
    deferred: Deferred<T>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// 注册解析和拒绝处理函数
    pub fn then<R, E>(&self, on_resolve: R, on_reject: E) -> &Self
    where
        R: FnOnce(&T) + Send + 'static,
        E: FnOnce(&WireError) + Send + 'static,
    {
        self.deferred.then(on_resolve, on_reject);
        self
    }

    /// 只注册解析处理函数
    pub fn on_resolved<R>(&self, on_resolve: R) -> &Self
    where
        R: FnOnce(&T) + Send + 'static,
    {
        self.deferred.on_resolved(on_resolve);
        self
    }

    /// 只注册拒绝处理函数
    pub fn on_rejected<E>(&self, on_reject: E) -> &Self
    where
        E: FnOnce(&WireError) + Send + 'static,
    {
        self.deferred.on_rejected(on_reject);
        self
    }

    /// 只注册进度处理函数
    pub fn on_progress<P>(&self, on_progress: P) -> &Self
    where
        P: Fn(&Value) + Send + Sync + 'static,
    {
        self.deferred.on_progress(on_progress);
        self
    }

    /// 注册完整续体
    pub fn then_with(&self, continuation: Continuation<T>) -> &Self {
        self.deferred.then_with(continuation);
        self
    }

    /// 是否仍未完成
    pub fn is_pending(&self) -> bool {
        self.deferred.is_pending()
    }

    /// 已存储的结果
    pub fn outcome(&self) -> Option<Result<T, WireError>> {
        self.deferred.outcome()
    }

    /// 把结果转发到另一个延迟值
    pub fn forward_to(&self, target: &Deferred<T>) -> &Self {
        self.deferred.forward_to(target);
        self
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl<T> Future for Promise<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T, WireError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.deferred.state.lock();
        match &state.completion {
            _ if state.settling => {
                state.wakers.push(cx.waker().clone());
                Poll::Pending
            }
            Completion::Pending => {
                if !state.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    state.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
            Completion::Resolved(value) => Poll::Ready(Ok(value.clone())),
            Completion::Rejected(error) => Poll::Ready(Err(error.clone())),
        }
    }
}
