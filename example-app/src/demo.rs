//! 演示模块

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use wire_abstractions::{Listeners, Module, Plugin, PluginContext, ResolveCallback};
use wire_common::{Component, Value, WireError};
use wire_impl::StaticModuleLoader;

/// 问候服务
#[derive(Debug)]
pub struct Greeter {
    greeting: Mutex<String>,
    audience: Mutex<Vec<String>>,
}

impl Greeter {
    fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: Mutex::new(greeting.into()),
            audience: Mutex::new(Vec::new()),
        }
    }

    /// 生成问候语
    pub fn greet(&self) -> String {
        let audience = self.audience.lock();
        if audience.is_empty() {
            return self.greeting.lock().clone();
        }
        format!("{}, {}", self.greeting.lock(), audience.join(" & "))
    }
}

impl Component for Greeter {
    fn name(&self) -> &str {
        "Greeter"
    }

    fn set_property(&self, name: &str, value: Value) -> bool {
        match name {
            "greeting" => value.as_str().map_or(false, |greeting| {
                *self.greeting.lock() = greeting.to_string();
                true
            }),
            "audience" => match value.as_array() {
                Some(items) => {
                    *self.audience.lock() = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "start" | "stop")
    }

    fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<(), WireError> {
        match method {
            "start" => info!("Greeter 启动: {}", self.greet()),
            "stop" => info!("Greeter 停止"),
            other => {
                return Err(WireError::MethodNotFound {
                    method: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// 时钟解析器：`clock!now` 解析为当前 UTC 时间，`clock!date` 解析为日期
fn clock_plugin() -> Module {
    Module::plugin(
        "demo/clock",
        Plugin::new().resolver_fn(
            "clock",
            |_: Arc<dyn PluginContext>, name: &str, _: &serde_json::Value, callback: ResolveCallback| {
                let now = chrono::Utc::now();
                match name {
                    "now" => callback.resolve(Value::from(now.to_rfc3339())),
                    "date" => callback.resolve(Value::from(now.format("%Y-%m-%d").to_string())),
                    _ => callback.unresolved(),
                }
            },
        ),
    )
}

/// 把对象生命周期事件写入日志
fn trace_plugin() -> Module {
    Module::plugin(
        "demo/trace",
        Plugin::new().with_listeners(
            Listeners::new()
                .on_object_created(|object, _| info!("对象已创建: {:?}", object))
                .on_object_initialized(|object, _| info!("对象已初始化: {:?}", object))
                .on_object_destroyed(|object, _| info!("对象已销毁: {:?}", object))
                .on_context_error(|_, message, error| tracing::error!("装配失败 ({}): {}", message, error)),
        ),
    )
}

/// 注册全部演示模块
pub fn register(loader: &StaticModuleLoader) {
    loader.register(Module::new(
        "demo/greeter",
        Value::constructor(|args: Vec<Value>| -> Result<Value, WireError> {
            let greeting = args.first().and_then(Value::as_str).unwrap_or("Hello");
            Ok(Value::object(Greeter::new(greeting)))
        }),
    ));
    loader.register(clock_plugin());
    loader.register(trace_plugin());
}
