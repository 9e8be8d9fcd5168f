//! 对象生命周期
//!
//! 每个创建节点依次经过：构造 → 属性赋值 → 初始化，并在初始化开始时
//! 登记销毁动作。创建完成即解析节点的延迟值，初始化独立推进并更新
//! 作用域的初始化计数。

use crate::parser::{into_args, join, method_entries, Directives};
use crate::plugins::SetterCache;
use crate::scope::ScopeInner;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use wire_abstractions::ListenerCategory;
use wire_common::{Deferred, ObjectState, Value, WireError};

impl ScopeInner {
    /// 解析创建节点，对象创建完成时解析
    pub(crate) fn create_object(self: &Arc<Self>, node: &JsonValue) -> Deferred<Value> {
        let object = Deferred::new();
        let directives = match Directives::read(node, &self.config().keys) {
            Ok(directives) => directives,
            Err(error) => {
                self.fail_creation(&object, error);
                return object;
            }
        };

        let index = self.begin_object(&directives.module);
        debug!("发现创建节点: {} (#{})", directives.module, index);

        let scope = Arc::clone(self);
        let target = object.clone();
        let on_error = object.clone();
        self.modules_ready.then(
            move |_| scope.construct(directives, index, target),
            move |error| {
                let _ = on_error.try_reject(error.clone());
            },
        );
        object
    }

    fn construct(self: &Arc<Self>, directives: Directives, index: usize, object: Deferred<Value>) {
        let module_value = match self.module_value(&directives.module) {
            Ok(value) => value,
            Err(error) => return self.fail_creation(&object, error),
        };

        let constructor = match &module_value {
            Value::Constructor(constructor) if directives.construct => Some(Arc::clone(constructor)),
            _ => None,
        };
        let Some(constructor) = constructor else {
            return self.object_created(directives, index, module_value, object);
        };

        let args_node = directives
            .args
            .clone()
            .unwrap_or_else(|| JsonValue::Array(Vec::new()));
        let args = self.parse(&args_node);

        let scope = Arc::clone(self);
        let failed = Arc::clone(self);
        let on_error = object.clone();
        args.then(
            move |resolved| {
                let module = directives.module.clone();
                match constructor.construct(into_args(resolved.clone())) {
                    Ok(instance) => scope.object_created(directives, index, instance, object),
                    Err(error) => scope.fail_creation(
                        &object,
                        WireError::Construction {
                            module,
                            message: error.to_string(),
                        },
                    ),
                }
            },
            move |error| failed.fail_creation(&on_error, error.clone()),
        );
    }

    /// 构造失败：显式拒绝对象创建阶段，再拒绝对象自身，兄弟对象不受影响
    fn fail_creation(&self, object: &Deferred<Value>, error: WireError) {
        warn!("对象创建失败: {}", error);
        let _ = self.objects_created.try_reject(error.clone());
        let _ = object.try_reject(error);
    }

    fn object_created(
        self: &Arc<Self>,
        directives: Directives,
        index: usize,
        instance: Value,
        object: Deferred<Value>,
    ) {
        self.count_created();
        self.advance_record(index, ObjectState::Created);
        debug!("对象已创建: {} (#{})", directives.module, index);

        let mut status = BTreeMap::new();
        status.insert("object".to_string(), instance.clone());
        status.insert("spec".to_string(), Value::from(&directives.spec));
        self.objects_created.progress(&Value::Map(status));

        let _ = object.try_resolve(instance.clone());
        self.initialize(directives, index, instance);
        self.expansion_done();
    }

    /// 登记销毁动作，应用属性，解析初始化参数；属性全部完成后调用初始化方法
    fn initialize(self: &Arc<Self>, directives: Directives, index: usize, instance: Value) {
        if let Some(destroy) = &directives.destroy {
            self.register_destroyer(index, &instance, destroy, &directives.spec);
        }

        let properties_applied = match &directives.properties {
            Some(properties) => self.apply_properties(&instance, properties, &directives.spec),
            None => Deferred::resolved(instance.clone()),
        };

        let methods: Vec<(String, JsonValue)> = method_entries(directives.init.as_ref())
            .into_iter()
            .filter(|(method, _)| {
                let callable = instance
                    .as_object()
                    .map_or(false, |object| object.has_method(method));
                if !callable {
                    debug!("初始化方法不存在，跳过: {}.{}", directives.module, method);
                }
                callable
            })
            .collect();
        let init_args = join(methods.iter().map(|(_, args)| self.parse(args)).collect());

        let scope = Arc::clone(self);
        properties_applied.on_resolved(move |_| {
            scope.advance_record(index, ObjectState::PropertiesSet);
            let invoker = Arc::clone(&scope);
            init_args.then(
                move |resolved| invoker.invoke_init(&directives, index, &instance, &methods, resolved),
                move |error| scope.fail_ready("initialization failed", error.clone()),
            );
        });
    }

    fn invoke_init(
        self: &Arc<Self>,
        directives: &Directives,
        index: usize,
        instance: &Value,
        methods: &[(String, JsonValue)],
        resolved: &[Value],
    ) {
        if let Some(object) = instance.as_object() {
            for ((method, _), args) in methods.iter().zip(resolved) {
                debug!("调用初始化方法: {}.{}", directives.module, method);
                if let Err(error) = object.invoke(method, into_args(args.clone())) {
                    self.fail_ready(
                        "initialization failed",
                        WireError::InitFailed {
                            method: method.clone(),
                            message: error.to_string(),
                        },
                    );
                    return;
                }
            }
        }

        self.advance_record(index, ObjectState::Initialized);
        self.fire_object(ListenerCategory::ObjectInitialized, instance, &directives.spec);
        self.count_initialized();
    }

    /// 对目标应用属性映射
    ///
    /// 每个属性值独立解析，解析完成即用第一个接受它的设置器赋值。
    /// 解析失败或没有设置器接受都会拒绝上下文就绪。
    pub(crate) fn apply_properties(
        self: &Arc<Self>,
        target: &Value,
        properties: &Map<String, JsonValue>,
        spec: &JsonValue,
    ) -> Deferred<Value> {
        let applied = Deferred::new();
        let cache = SetterCache::new();
        let parts: Vec<Deferred<Value>> = properties
            .iter()
            .map(|(name, node)| {
                let parsed = self.parse(node);
                let assigned = Deferred::new();
                let scope = Arc::clone(self);
                let failed = Arc::clone(self);
                let on_value = assigned.clone();
                let on_error = assigned.clone();
                let target = target.clone();
                let name = name.clone();
                let cache = cache.clone();
                parsed.then(
                    move |value| match scope.plugins.assign(&cache, &target, &name, value) {
                        Ok(()) => {
                            let _ = on_value.try_resolve(Value::Null);
                        }
                        Err(error) => {
                            scope.fail_ready("property assignment failed", error.clone());
                            let _ = on_value.try_reject(error);
                        }
                    },
                    move |error| {
                        failed.fail_ready("property assignment failed", error.clone());
                        let _ = on_error.try_reject(error.clone());
                    },
                );
                assigned
            })
            .collect();

        let scope = Arc::clone(self);
        let on_value = applied.clone();
        let on_error = applied.clone();
        let target = target.clone();
        let spec = spec.clone();
        join(parts).then(
            move |_| {
                scope.fire_object(ListenerCategory::PropertiesApplied, &target, &spec);
                let _ = on_value.try_resolve(target);
            },
            move |error| {
                let _ = on_error.try_reject(error.clone());
            },
        );
        applied
    }

    fn register_destroyer(
        self: &Arc<Self>,
        index: usize,
        instance: &Value,
        destroy: &JsonValue,
        spec: &JsonValue,
    ) {
        let methods: Vec<String> = method_entries(Some(destroy))
            .into_iter()
            .map(|(method, _)| method)
            .collect();
        let scope: Weak<ScopeInner> = Arc::downgrade(self);
        let instance = instance.clone();
        let spec = spec.clone();

        self.push_destroyer(Box::new(move || {
            if let Some(object) = instance.as_object() {
                for method in methods.iter().filter(|method| object.has_method(method)) {
                    debug!("调用销毁方法: {}", method);
                    if let Err(error) = object.invoke(method, Vec::new()) {
                        warn!("销毁方法调用失败: {}, 原因: {}", method, error);
                    }
                }
            }
            if let Some(scope) = scope.upgrade() {
                scope.advance_record(index, ObjectState::Destroyed);
                scope.fire_object(ListenerCategory::ObjectDestroyed, &instance, &spec);
            }
        }));
    }
}
