//! 作用域编排
//!
//! 一个作用域持有绑定、插件注册表、销毁动作和五个阶段延迟值：
//! 模块就绪 → 对象创建完成 → 上下文就绪 → 上下文销毁，以及界面就绪门。
//! 阶段之间的先后顺序由计数器保证。

use crate::base::base_module;
use crate::parser::collect_module_names;
use crate::plugins::PluginRegistry;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use wire_abstractions::{
    ListenerCategory, Module, ModuleLoader, PluginContext, ReadinessGate,
};
use wire_common::{
    Bindings, Continuation, Deferred, ObjectRecord, ObjectState, Promise, ScopeInfo, Value,
    WireConfig, WireError,
};

/// 作用域共享的外部协作者与配置
#[derive(Clone)]
pub struct ScopeSettings {
    pub config: Arc<WireConfig>,
    pub loader: Arc<dyn ModuleLoader>,
    pub gate: Arc<dyn ReadinessGate>,
}

#[derive(Debug)]
struct Counters {
    to_create: usize,
    created: usize,
    to_init: usize,
    initialized: usize,
    /// 尚未发出嵌套解析的已创建对象数，另含一个模块就绪前持有的根令牌
    expansions: usize,
    root_parsed: bool,
    ready_scheduled: bool,
}

type Destroyer = Box<dyn FnOnce() + Send>;

pub(crate) struct ScopeInner {
    pub(crate) info: ScopeInfo,
    settings: ScopeSettings,
    pub(crate) parent: Option<Arc<ScopeInner>>,
    bindings: Mutex<Bindings>,
    pending: Mutex<HashMap<String, Deferred<Value>>>,
    modules: Mutex<HashMap<String, Value>>,
    pub(crate) plugins: PluginRegistry,
    counters: Mutex<Counters>,
    destroyers: Mutex<Vec<Destroyer>>,
    records: Mutex<Vec<ObjectRecord>>,
    children: AtomicUsize,
    destroy_requested: AtomicBool,
    pub(crate) modules_ready: Deferred<Vec<Module>>,
    pub(crate) objects_created: Deferred<Bindings>,
    pub(crate) context_ready: Deferred<Bindings>,
    pub(crate) surface_ready: Deferred<()>,
    pub(crate) context_destroyed: Deferred<()>,
}

impl ScopeInner {
    pub(crate) fn new(settings: ScopeSettings, parent: Option<Arc<ScopeInner>>, info: ScopeInfo) -> Arc<Self> {
        Arc::new(Self {
            info,
            settings,
            parent,
            bindings: Mutex::new(Bindings::new()),
            pending: Mutex::new(HashMap::new()),
            modules: Mutex::new(HashMap::new()),
            plugins: PluginRegistry::new(),
            counters: Mutex::new(Counters {
                to_create: 0,
                created: 0,
                to_init: 0,
                initialized: 0,
                expansions: 1,
                root_parsed: false,
                ready_scheduled: false,
            }),
            destroyers: Mutex::new(Vec::new()),
            records: Mutex::new(Vec::new()),
            children: AtomicUsize::new(0),
            destroy_requested: AtomicBool::new(false),
            modules_ready: Deferred::new(),
            objects_created: Deferred::new(),
            context_ready: Deferred::new(),
            surface_ready: Deferred::new(),
            context_destroyed: Deferred::new(),
        })
    }

    pub(crate) fn config(&self) -> &WireConfig {
        &self.settings.config
    }

    /// 创建子作用域
    pub(crate) fn child(self: &Arc<Self>) -> Arc<Self> {
        let index = self.children.fetch_add(1, Ordering::SeqCst) + 1;
        Self::new(self.settings.clone(), Some(Arc::clone(self)), self.info.child(index))
    }

    /// 装配规格，返回上下文就绪后的句柄
    pub(crate) fn wire(self: &Arc<Self>, spec: &JsonValue) -> Promise<Context> {
        info!("开始装配作用域: {}", self.info.name);
        let handle = Deferred::new();

        if !(spec.is_object() || spec.is_array()) {
            let error = WireError::invalid_spec(format!("根规格必须是映射或序列: {spec}"));
            let _ = self.context_ready.try_reject(error.clone());
            handle.reject(error);
            return handle.promise();
        }

        self.watch_surface();
        self.wire_phases();
        self.inherit_parent();

        let scope = Arc::clone(self);
        let resolved = handle.clone();
        let failed = handle.clone();
        self.context_ready.then(
            move |_| {
                info!("作用域已就绪: {}", scope.info.name);
                let _ = resolved.try_resolve(Context { scope });
            },
            move |error| {
                let _ = failed.try_reject(error.clone());
            },
        );

        let root = self.parse_root(spec);
        let scope = Arc::clone(self);
        self.modules_ready.on_resolved(move |_| scope.expansion_done());

        let parsed = Arc::clone(self);
        let failed = Arc::clone(self);
        root.then(
            move |_| parsed.root_resolved(),
            move |error| failed.fail_ready("context wiring failed", error.clone()),
        );

        self.load_modules(spec);
        handle.promise()
    }

    fn watch_surface(&self) {
        let surface = self.surface_ready.clone();
        self.settings.gate.on_ready(Box::new(move || {
            let _ = surface.try_resolve(());
        }));
    }

    /// 阶段间的失败传递与监听器事件
    fn wire_phases(self: &Arc<Self>) {
        let initialized = Arc::clone(self);
        let failed = Arc::clone(self);
        self.modules_ready.then(
            move |modules| {
                for listeners in initialized.plugins.listeners(ListenerCategory::ContextInit) {
                    listeners.context_init(modules);
                }
            },
            move |error| {
                failed.fail_phase(
                    &failed.objects_created,
                    "module loading failed",
                    WireError::ModuleLoadingFailed {
                        source: Arc::new(error.clone()),
                    },
                );
            },
        );

        let failed = Arc::clone(self);
        let progress: Weak<ScopeInner> = Arc::downgrade(self);
        self.objects_created.then_with(
            Continuation::new()
                .on_reject(move |error: &WireError| {
                    failed.fail_phase(
                        &failed.context_ready,
                        "object creation failed",
                        WireError::ObjectCreationFailed {
                            source: Arc::new(error.clone()),
                        },
                    );
                    Ok(None)
                })
                .on_progress(move |status: &Value| {
                    if let (Some(scope), Some(object)) = (progress.upgrade(), status.get("object")) {
                        let spec = status
                            .get("spec")
                            .and_then(Value::to_json)
                            .unwrap_or(JsonValue::Null);
                        scope.fire_object(ListenerCategory::ObjectCreated, object, &spec);
                    }
                    Ok(())
                }),
        );

        let ready = Arc::clone(self);
        self.context_ready.on_resolved(move |bindings| {
            for listeners in ready.plugins.listeners(ListenerCategory::ContextReady) {
                listeners.context_ready(bindings);
            }
        });
    }

    /// 继承父作用域当前的绑定，并在父作用域销毁时销毁自己
    fn inherit_parent(self: &Arc<Self>) {
        let Some(parent) = &self.parent else {
            return;
        };
        let inherited = parent.bindings();
        self.bindings.lock().extend(inherited);

        // 父作用域销毁前一直持有子作用域
        let child = Arc::clone(self);
        parent.context_destroyed.on_resolved(move |_| {
            if !child.destroy_requested.load(Ordering::SeqCst) {
                debug!("父作用域已销毁，级联销毁: {}", child.info.name);
                child.destroy();
            }
        });
    }

    /// 一次性批量加载规格中出现的全部模块
    fn load_modules(self: &Arc<Self>, spec: &JsonValue) {
        let config = self.config();
        let mut names = config.default_modules.clone();
        for name in collect_module_names(spec, &config.keys) {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        if names.is_empty() {
            self.modules_loaded(Ok(Vec::new()));
            return;
        }

        debug!("作用域 {} 加载模块: {:?}", self.info.name, names);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let scope = Arc::clone(self);
                let loader = Arc::clone(&self.settings.loader);
                runtime.spawn(async move {
                    let loaded = loader.load(&names).await;
                    scope.modules_loaded(loaded);
                });
            }
            Err(_) => {
                let _ = self.modules_ready.try_reject(WireError::NoRuntime);
            }
        }
    }

    fn modules_loaded(&self, loaded: Result<Vec<Module>, WireError>) {
        match loaded {
            Ok(loaded) => {
                let mut modules = Vec::with_capacity(loaded.len() + 1);
                modules.push(base_module(&self.config().default_resolver));
                modules.extend(loaded);

                {
                    let mut values = self.modules.lock();
                    for module in &modules {
                        values.insert(module.name.clone(), module.value.clone());
                    }
                }
                self.plugins.scan(&modules);
                debug!("作用域 {} 模块就绪: {} 个", self.info.name, modules.len());
                let _ = self.modules_ready.try_resolve(modules);
            }
            Err(error) => {
                warn!("作用域 {} 模块加载失败: {}", self.info.name, error);
                let _ = self.modules_ready.try_reject(error);
            }
        }
    }

    pub(crate) fn module_value(&self, name: &str) -> Result<Value, WireError> {
        self.modules
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| WireError::ModuleNotLoaded {
                name: name.to_string(),
            })
    }

    // ---- 绑定 ----

    pub(crate) fn bindings(&self) -> Bindings {
        self.bindings.lock().clone()
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings.lock().get(name).cloned()
    }

    /// 登记一个尚未解析完成的顶层键
    pub(crate) fn expect_binding(&self, key: &str) {
        self.pending
            .lock()
            .entry(key.to_string())
            .or_insert_with(Deferred::new);
    }

    pub(crate) fn await_binding(&self, key: &str) -> Option<Promise<Value>> {
        self.pending.lock().get(key).map(Deferred::promise)
    }

    pub(crate) fn bind(&self, key: &str, value: Value) {
        self.bindings.lock().insert(key.to_string(), value.clone());
        let waiter = self.pending.lock().remove(key);
        if let Some(waiter) = waiter {
            let _ = waiter.try_resolve(value);
        }
    }

    pub(crate) fn fail_binding(&self, key: &str, error: &WireError) {
        let waiter = self.pending.lock().remove(key);
        if let Some(waiter) = waiter {
            let _ = waiter.try_reject(error.clone());
        }
    }

    // ---- 计数 ----

    pub(crate) fn begin_object(&self, module: &str) -> usize {
        {
            let mut counters = self.counters.lock();
            counters.to_create += 1;
            counters.to_init += 1;
        }
        let mut records = self.records.lock();
        records.push(ObjectRecord::new(module));
        records.len() - 1
    }

    pub(crate) fn count_created(&self) {
        let mut counters = self.counters.lock();
        counters.created += 1;
        counters.expansions += 1;
    }

    /// 一个已创建对象的嵌套解析已全部发出
    pub(crate) fn expansion_done(&self) {
        let created = {
            let mut counters = self.counters.lock();
            counters.expansions = counters.expansions.saturating_sub(1);
            counters.expansions == 0 && counters.created == counters.to_create
        };
        if created {
            let bindings = self.bindings();
            if self.objects_created.try_resolve(bindings).is_ok() {
                debug!("作用域 {} 对象创建完成", self.info.name);
            }
        }
    }

    pub(crate) fn count_initialized(self: &Arc<Self>) {
        self.counters.lock().initialized += 1;
        self.check_ready();
    }

    fn root_resolved(self: &Arc<Self>) {
        self.counters.lock().root_parsed = true;
        self.check_ready();
    }

    /// 根规格已解析且所有对象都已初始化时，等待对象创建完成（有对象时还要
    /// 等待界面就绪）后解析上下文就绪
    fn check_ready(self: &Arc<Self>) {
        let needs_surface = {
            let mut counters = self.counters.lock();
            if !counters.root_parsed
                || counters.initialized != counters.to_init
                || counters.ready_scheduled
            {
                return;
            }
            counters.ready_scheduled = true;
            counters.to_init > 0
        };

        let scope = Arc::clone(self);
        self.objects_created.on_resolved(move |_| {
            if needs_surface {
                let ready = Arc::clone(&scope);
                scope.surface_ready.on_resolved(move |_| ready.finish_ready());
            } else {
                scope.finish_ready();
            }
        });
    }

    fn finish_ready(&self) {
        let bindings = self.bindings();
        let _ = self.context_ready.try_resolve(bindings);
    }

    // ---- 失败 ----

    /// 拒绝阶段延迟值；首次拒绝时触发 context-error
    pub(crate) fn fail_phase<T>(&self, phase: &Deferred<T>, message: &str, error: WireError)
    where
        T: Clone + Send + 'static,
    {
        if phase.try_reject(error.clone()).is_ok() {
            warn!("作用域 {} {}: {}", self.info.name, message, error);
            let bindings = self.bindings();
            for listeners in self.plugins.listeners(ListenerCategory::ContextError) {
                listeners.context_error(&bindings, message, &error);
            }
        }
    }

    pub(crate) fn fail_ready(&self, message: &str, error: WireError) {
        self.fail_phase(&self.context_ready, message, error);
    }

    // ---- 对象记录与事件 ----

    pub(crate) fn advance_record(&self, index: usize, to: ObjectState) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(index) {
            if let Err(error) = record.state.advance(to) {
                warn!("对象 {} 生命周期异常: {}", record.module, error);
            }
        }
    }

    pub(crate) fn records(&self) -> Vec<ObjectRecord> {
        self.records.lock().clone()
    }

    pub(crate) fn fire_object(&self, category: ListenerCategory, object: &Value, spec: &JsonValue) {
        for listeners in self.plugins.listeners(category) {
            listeners.object_event(category, object, spec);
        }
    }

    // ---- 销毁 ----

    pub(crate) fn push_destroyer(&self, destroyer: Destroyer) {
        self.destroyers.lock().push(destroyer);
    }

    /// 等待上下文就绪后按登记顺序执行销毁动作
    ///
    /// 重复调用只记录警告，返回同一个销毁延迟值。
    pub(crate) fn destroy(self: &Arc<Self>) -> Deferred<()> {
        if self.destroy_requested.swap(true, Ordering::SeqCst) {
            warn!("作用域 {} 重复销毁，忽略", self.info.name);
            return self.context_destroyed.clone();
        }

        let scope = Arc::clone(self);
        let aborted = self.context_destroyed.clone();
        self.context_ready.then(
            move |bindings| scope.run_destroyers(bindings),
            move |error| {
                let _ = aborted.try_reject(WireError::DestroyAborted {
                    source: Arc::new(error.clone()),
                });
            },
        );
        self.context_destroyed.clone()
    }

    fn run_destroyers(&self, bindings: &Bindings) {
        let destroyers = std::mem::take(&mut *self.destroyers.lock());
        info!("销毁作用域: {} ({} 个销毁动作)", self.info.name, destroyers.len());
        for destroyer in destroyers {
            destroyer();
        }

        let _ = self.context_destroyed.try_resolve(());
        for listeners in self.plugins.listeners(ListenerCategory::ContextDestroy) {
            listeners.context_destroy(bindings);
        }
        self.bindings.lock().clear();
    }

    pub(crate) fn plugin_context(self: &Arc<Self>) -> Arc<dyn PluginContext> {
        Arc::new(ScopeProxy {
            scope: Arc::clone(self),
        })
    }
}

/// 已就绪作用域的句柄
#[derive(Clone)]
pub struct Context {
    scope: Arc<ScopeInner>,
}

impl Context {
    /// 作用域标识
    pub fn info(&self) -> &ScopeInfo {
        &self.scope.info
    }

    /// 按名称取绑定
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scope.lookup(name)
    }

    /// 全部绑定的快照
    pub fn bindings(&self) -> Bindings {
        self.scope.bindings()
    }

    /// 以当前作用域为父作用域装配子规格
    pub fn wire(&self, spec: &JsonValue) -> Promise<Context> {
        self.scope.child().wire(spec)
    }

    /// 解析名称，支持 `tag!name` 形式
    pub fn resolve(&self, name: &str) -> Promise<Value> {
        self.scope.resolve_name(name).promise()
    }

    /// 销毁作用域
    pub fn destroy(&self) -> Promise<()> {
        self.scope.destroy().promise()
    }

    /// 是否已销毁
    pub fn is_destroyed(&self) -> bool {
        matches!(self.scope.context_destroyed.outcome(), Some(Ok(())))
    }

    /// 作用域中各创建节点的生命周期记录，按发现顺序
    pub fn object_states(&self) -> Vec<ObjectRecord> {
        self.scope.records()
    }

    /// 插件视角的作用域能力
    pub fn plugin_context(&self) -> Arc<dyn PluginContext> {
        self.scope.plugin_context()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.scope.info.name)
            .field("bindings", &self.scope.bindings().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 交给插件的作用域代理
struct ScopeProxy {
    scope: Arc<ScopeInner>,
}

impl PluginContext for ScopeProxy {
    fn scope(&self) -> ScopeInfo {
        self.scope.info.clone()
    }

    fn modules_ready(&self) -> Promise<Vec<Module>> {
        self.scope.modules_ready.promise()
    }

    fn objects_created(&self) -> Promise<Bindings> {
        self.scope.objects_created.promise()
    }

    fn context_ready(&self) -> Promise<Bindings> {
        self.scope.context_ready.promise()
    }

    fn surface_ready(&self) -> Promise<()> {
        self.scope.surface_ready.promise()
    }

    fn context_destroyed(&self) -> Promise<()> {
        self.scope.context_destroyed.promise()
    }

    fn resolve_name(&self, name: &str) -> Promise<Value> {
        self.scope.resolve_name(name).promise()
    }

    fn resolve_ref(&self, node: &JsonValue) -> Promise<Value> {
        self.scope.resolve_ref(node).promise()
    }

    fn parse(&self, node: &JsonValue) -> Promise<Value> {
        self.scope.parse(node).promise()
    }

    fn set_properties(&self, target: &Value, properties: &JsonValue) -> Promise<Value> {
        match properties.as_object() {
            Some(map) => self.scope.apply_properties(target, map, properties).promise(),
            None => Deferred::rejected(WireError::invalid_spec(format!(
                "属性必须是映射: {properties}"
            )))
            .promise(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.scope.lookup(name)
    }

    fn await_binding(&self, name: &str) -> Option<Promise<Value>> {
        self.scope.await_binding(name)
    }
}
