//! 装配引擎跨 crate 集中集成测试
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wire_abstractions::{Module, ModuleLoader, Plugin, PluginContext, ResolveCallback};
use wire_common::{Component, ObjectState, Value, WireError};
use wire_composition::{WireBuilder, Wiring};
use wire_impl::ManualGate;

/// 带延迟的异步模块加载器
struct DelayedLoader {
    modules: HashMap<String, Module>,
    delay: Duration,
}

#[async_trait]
impl ModuleLoader for DelayedLoader {
    async fn load(&self, names: &[String]) -> Result<Vec<Module>, WireError> {
        tokio::time::sleep(self.delay).await;
        names
            .iter()
            .map(|name| {
                self.modules.get(name).cloned().ok_or_else(|| WireError::ModuleLoad {
                    name: name.clone(),
                    message: "not found".to_string(),
                })
            })
            .collect()
    }
}

/// 测试组件：连接池
#[derive(Debug, Default)]
struct Pool {
    url: Mutex<Option<String>>,
    size: Mutex<i64>,
    events: Mutex<Vec<String>>,
}

impl Component for Pool {
    fn name(&self) -> &str {
        "Pool"
    }

    fn set_property(&self, name: &str, value: Value) -> bool {
        match (name, &value) {
            ("url", Value::String(url)) => {
                *self.url.lock() = Some(url.clone());
                true
            }
            ("size", _) => value.as_i64().map_or(false, |size| {
                *self.size.lock() = size;
                true
            }),
            _ => false,
        }
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "open" | "close")
    }

    fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<(), WireError> {
        self.events.lock().push(method.to_string());
        Ok(())
    }
}

/// 测试组件：仓储，依赖连接池
#[derive(Debug, Default)]
struct Repository {
    pool: Mutex<Option<Value>>,
    table: Mutex<String>,
}

impl Component for Repository {
    fn set_property(&self, name: &str, value: Value) -> bool {
        match name {
            "pool" => {
                *self.pool.lock() = Some(value);
                true
            }
            "table" => value.as_str().map_or(false, |table| {
                *self.table.lock() = table.to_string();
                true
            }),
            _ => false,
        }
    }
}

/// 从内存表解析 `env!NAME` 的插件，解析在后台任务中完成
fn env_plugin(vars: &[(&str, &str)]) -> Module {
    let vars: Arc<HashMap<String, String>> = Arc::new(
        vars.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    );
    Module::plugin(
        "test/env",
        Plugin::new().resolver_fn(
            "env",
            move |_: Arc<dyn PluginContext>, name: &str, _: &serde_json::Value, callback: ResolveCallback| {
                let vars = Arc::clone(&vars);
                let name = name.to_string();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    match vars.get(&name) {
                        Some(value) => callback.resolve(Value::from(value.as_str())),
                        None => callback.unresolved(),
                    }
                });
            },
        ),
    )
}

/// 别名插件：`alias!x` 交回作用域按名称解析
fn alias_plugin() -> Module {
    Module::plugin(
        "test/alias",
        Plugin::new().resolver_fn("alias", |context: Arc<dyn PluginContext>, name: &str, _: &serde_json::Value, callback: ResolveCallback| {
            let on_error = callback.clone();
            context.resolve_name(name).then(
                move |value: &Value| callback.resolve(value.clone()),
                move |error| on_error.reject(error.clone()),
            );
        }),
    )
}

fn modules() -> HashMap<String, Module> {
    let mut modules = HashMap::new();
    for module in [
        Module::new(
            "app/pool",
            Value::constructor(|_: Vec<Value>| -> Result<Value, WireError> {
                Ok(Value::object(Pool::default()))
            }),
        ),
        Module::new(
            "app/repository",
            Value::constructor(|_: Vec<Value>| -> Result<Value, WireError> {
                Ok(Value::object(Repository::default()))
            }),
        ),
        env_plugin(&[("DATABASE_URL", "postgres://localhost/wire")]),
        alias_plugin(),
    ] {
        modules.insert(module.name.clone(), module);
    }
    modules
}

fn wiring(gate: Option<ManualGate>) -> anyhow::Result<Wiring> {
    let mut builder = WireBuilder::new().with_loader(Arc::new(DelayedLoader {
        modules: modules(),
        delay: Duration::from_millis(5),
    }));
    if let Some(gate) = gate {
        builder = builder.with_gate(Arc::new(gate));
    }
    Ok(builder.build()?)
}

fn application_spec() -> serde_json::Value {
    json!({
        "plugins": [{"module": "test/env"}, {"module": "test/alias"}],
        "repository": {
            "create": "app/repository",
            "properties": {"pool": {"$ref": "pool"}, "table": "users"}
        },
        "pool": {
            "create": "app/pool",
            "properties": {"url": {"$ref": "env!DATABASE_URL"}, "size": 8},
            "init": "open",
            "destroy": "close"
        },
        "primary": {"$ref": "alias!pool"}
    })
}

#[tokio::test]
async fn test_application_graph_wires_end_to_end() -> anyhow::Result<()> {
    let context = wiring(None)?.wire(&application_spec()).await?;

    let pool_value = context.get("pool").expect("pool 已绑定");
    let pool = pool_value.downcast::<Pool>().expect("Pool 组件");
    assert_eq!(pool.url.lock().as_deref(), Some("postgres://localhost/wire"));
    assert_eq!(*pool.size.lock(), 8);
    assert_eq!(*pool.events.lock(), vec!["open".to_string()]);

    let repository = context
        .get("repository")
        .and_then(|value| value.downcast::<Repository>())
        .expect("Repository 组件");
    assert_eq!(repository.pool.lock().clone(), Some(pool_value.clone()));
    assert_eq!(*repository.table.lock(), "users");
    assert_eq!(context.get("primary"), Some(pool_value));

    context.destroy().await?;
    assert_eq!(*pool.events.lock(), vec!["open".to_string(), "close".to_string()]);
    assert!(context
        .object_states()
        .iter()
        .any(|record| record.module == "app/pool" && record.state == ObjectState::Destroyed));
    Ok(())
}

#[tokio::test]
async fn test_child_scope_uses_parent_plugins_and_bindings() -> anyhow::Result<()> {
    let parent = wiring(None)?.wire(&application_spec()).await?;

    let child = parent
        .wire(&json!({
            "url": {"$ref": "env!DATABASE_URL"},
            "shared": {"$ref": "pool"},
            "local": {"create": "app/pool", "properties": {"url": "sqlite::memory:"}}
        }))
        .await?;

    assert_eq!(child.get("url"), Some(Value::from("postgres://localhost/wire")));
    assert_eq!(child.get("shared"), parent.get("pool"));
    assert!(child.get("repository").is_some());
    assert!(parent.get("local").is_none());

    parent.destroy().await?;
    assert!(child.is_destroyed());
    Ok(())
}

#[tokio::test]
async fn test_unknown_env_var_is_unresolved() -> anyhow::Result<()> {
    let err = wiring(None)?
        .wire(&json!({
            "env": {"module": "test/env"},
            "missing": {"$ref": "env!NOPE"}
        }))
        .await
        .unwrap_err();

    assert!(matches!(err, WireError::UnresolvedReference { ref name } if name == "env!NOPE"));
    Ok(())
}

#[tokio::test]
async fn test_surface_gate_holds_context_ready() -> anyhow::Result<()> {
    let gate = ManualGate::new();
    let wiring = wiring(Some(gate.clone()))?;
    let pending = wiring.wire(&application_spec());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(pending.is_pending());

    gate.fire();
    let context = pending.await?;
    context.destroy().await?;
    assert!(context.is_destroyed());
    Ok(())
}

#[tokio::test]
async fn test_process_wide_entry_point() -> anyhow::Result<()> {
    WireBuilder::new()
        .with_loader(Arc::new(DelayedLoader {
            modules: modules(),
            delay: Duration::from_millis(1),
        }))
        .with_root_spec(json!({"env": {"module": "test/env"}, "shared": {"create": "app/pool"}}))
        .install()?;

    let first = wire_composition::wire(&json!({"url": {"$ref": "env!DATABASE_URL"}}));
    let second = wire_composition::wire(&json!({"pool": {"$ref": "shared"}}));
    let (first, second) = (first.await?, second.await?);

    assert_eq!(first.get("url"), Some(Value::from("postgres://localhost/wire")));
    assert_eq!(second.get("pool"), wire_composition::root().and_then(|root| root.get("shared")));

    wire_composition::reset().await?;
    assert!(first.is_destroyed() && second.is_destroyed());
    Ok(())
}
