//! 装配引擎的集成测试

use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use wire_abstractions::{Listeners, Module, Plugin, ResolveCallback};
use wire_common::{Component, ObjectState, Value, WireError};
use wire_impl::{Engine, ManualGate, StaticModuleLoader};

static INIT: Once = Once::new();

fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

type Journal = Arc<Mutex<Vec<String>>>;

/// 测试组件：接受任意属性（`reject` 开头的除外），记录方法调用
#[derive(Debug)]
struct Service {
    label: String,
    args: Vec<Value>,
    journal: Journal,
    properties: Mutex<BTreeMap<String, Value>>,
}

impl Service {
    fn property(&self, name: &str) -> Option<Value> {
        self.properties.lock().get(name).cloned()
    }
}

impl Component for Service {
    fn name(&self) -> &str {
        &self.label
    }

    fn set_property(&self, name: &str, value: Value) -> bool {
        if name.starts_with("reject") {
            return false;
        }
        self.properties.lock().insert(name.to_string(), value);
        true
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "configure" | "start" | "stop" | "close" | "explode")
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), WireError> {
        self.journal
            .lock()
            .push(format!("{}.{}({})", self.label, method, args.len()));
        if method == "explode" {
            return Err(WireError::custom("boom"));
        }
        Ok(())
    }
}

struct Fixture {
    loader: StaticModuleLoader,
    journal: Journal,
    constructed: Arc<AtomicUsize>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        init_test_logger();
        let fixture = Self {
            loader: StaticModuleLoader::new(),
            journal: Arc::new(Mutex::new(Vec::new())),
            constructed: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(Mutex::new(Vec::new())),
        };
        for name in ["app/db", "app/svc", "app/pool"] {
            fixture.loader.register(fixture.service_module(name));
        }
        fixture.loader.register(Module::new(
            "app/broken",
            Value::constructor(|_: Vec<Value>| -> Result<Value, WireError> {
                Err(WireError::custom("constructor exploded"))
            }),
        ));
        fixture.loader.register(Module::new(
            "app/config",
            Value::from(json!({"host": "localhost", "port": 5432})),
        ));

        let errors = Arc::clone(&fixture.errors);
        fixture.loader.register(Module::plugin(
            "test/errors",
            Plugin::new().with_listeners(Listeners::new().on_context_error(
                move |_, message, _| errors.lock().push(message.to_string()),
            )),
        ));
        fixture
    }

    fn service_module(&self, name: &str) -> Module {
        let label = name.trim_start_matches("app/").to_string();
        let journal = Arc::clone(&self.journal);
        let constructed = Arc::clone(&self.constructed);
        Module::new(
            name,
            Value::constructor(move |args: Vec<Value>| -> Result<Value, WireError> {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(Value::object(Service {
                    label: label.clone(),
                    args,
                    journal: Arc::clone(&journal),
                    properties: Mutex::new(BTreeMap::new()),
                }))
            }),
        )
    }

    fn engine(&self) -> Engine {
        Engine::new(Arc::new(self.loader.clone()))
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

fn service(value: &Value) -> Arc<Service> {
    value.downcast::<Service>().expect("Service 组件")
}

fn record(events: &Mutex<Vec<String>>, kind: &str, object: &Value) {
    if let Some(service) = object.downcast::<Service>() {
        events.lock().push(format!("{kind}:{}", service.label));
    }
}

#[tokio::test]
async fn test_plain_data_passes_through_unchanged() {
    let fixture = Fixture::new();
    let spec = json!({
        "name": "wire",
        "ports": [80, 443, {"tls": true}],
        "nested": {"deep": {"value": null}, "empty": {}},
        "list": []
    });

    let context = fixture.engine().wire(&spec).await.unwrap();

    for (key, node) in spec.as_object().unwrap() {
        assert_eq!(context.get(key), Some(Value::from(node)), "key {key}");
    }
    assert!(fixture.loader.requests().is_empty());
}

#[tokio::test]
async fn test_zero_creation_nodes_ready_without_runtime_work() {
    let fixture = Fixture::new();
    let promise = fixture.engine().wire(&json!({}));
    assert!(!promise.is_pending());
    let context = promise.await.unwrap();
    assert!(context.bindings().is_empty());
    assert!(context.object_states().is_empty());
}

#[tokio::test]
async fn test_constructor_receives_parsed_args_once() {
    let fixture = Fixture::new();
    let spec = json!({"svc": {"module": "app/svc", "create": {"args": [1, 2]}}});

    let context = fixture.engine().wire(&spec).await.unwrap();

    let svc = service(&context.get("svc").unwrap());
    assert_eq!(svc.args, vec![Value::from(1), Value::from(2)]);
    assert_eq!(fixture.constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_single_argument_is_wrapped_and_references_resolved() {
    let fixture = Fixture::new();
    let spec = json!({
        "config": {"module": "app/config"},
        "db": {"create": {"module": "app/db", "args": {"$ref": "config"}}}
    });

    let context = fixture.engine().wire(&spec).await.unwrap();

    let db = service(&context.get("db").unwrap());
    assert_eq!(db.args.len(), 1);
    assert_eq!(db.args[0].get("port").and_then(Value::as_i64), Some(5432));
}

#[tokio::test]
async fn test_module_without_create_is_bound_as_is() {
    let fixture = Fixture::new();
    let spec = json!({"factory": {"module": "app/svc"}, "settings": {"module": "app/config"}});

    let context = fixture.engine().wire(&spec).await.unwrap();

    assert!(context.get("factory").unwrap().is_constructor());
    assert_eq!(
        context.get("settings").unwrap().get("host").and_then(Value::as_str),
        Some("localhost")
    );
    assert_eq!(fixture.constructed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_modules_loaded_once_with_unique_names() {
    let fixture = Fixture::new();
    let spec = json!({
        "a": {"create": "app/svc"},
        "b": {"create": "app/svc", "properties": {"pool": {"create": "app/pool"}}},
        "c": [{"create": "app/db"}, {"create": "app/pool"}]
    });

    fixture.engine().wire(&spec).await.unwrap();

    assert_eq!(
        fixture.loader.requests(),
        vec![vec!["app/svc".to_string(), "app/pool".to_string(), "app/db".to_string()]]
    );
}

#[tokio::test]
async fn test_sibling_references_in_either_order() {
    let fixture = Fixture::new();
    let spec = json!({
        "alias": {"$ref": "db"},
        "svc": {"create": "app/svc", "properties": {"dep": {"$ref": "db"}}},
        "db": {"create": "app/db"}
    });

    let context = fixture.engine().wire(&spec).await.unwrap();

    let db = context.get("db").unwrap();
    assert_eq!(context.get("alias"), Some(db.clone()));
    assert_eq!(service(&context.get("svc").unwrap()).property("dep"), Some(db));
}

#[tokio::test]
async fn test_unknown_resolver_tag_without_parent_rejects() {
    let fixture = Fixture::new();
    let spec = json!({"missing": {"$ref": "vault!secret"}});

    let err = fixture.engine().wire(&spec).await.unwrap_err();

    assert!(matches!(err, WireError::UnresolvedReference { ref name } if name.contains("secret")));
    assert!(err.to_string().contains("cannot resolve reference"));
}

#[tokio::test]
async fn test_unbound_name_rejects() {
    let fixture = Fixture::new();
    let err = fixture
        .engine()
        .wire(&json!({"x": {"$ref": "nowhere"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, WireError::UnresolvedReference { ref name } if name == "nowhere"));
}

/// 装配四元素序列，引用按 `order` 给出的下标顺序完成
async fn wire_list_completing_in(order: &[usize]) -> Option<Value> {
    let fixture = Fixture::new();
    let parked: Arc<Mutex<Vec<(String, ResolveCallback)>>> = Arc::new(Mutex::new(Vec::new()));
    let park = Arc::clone(&parked);
    fixture.loader.register(Module::plugin(
        "test/later",
        Plugin::new().resolver_fn("later", move |_, name, _, callback| {
            park.lock().push((name.to_string(), callback));
        }),
    ));

    let spec = json!({
        "hook": {"module": "test/later"},
        "list": [{"$ref": "later!a"}, {"$ref": "later!b"}, {"$ref": "later!c"}, {"$ref": "later!d"}]
    });
    let promise = fixture.engine().wire(&spec);

    for _ in 0..100 {
        if parked.lock().len() == 4 {
            break;
        }
        tokio::task::yield_now().await;
    }
    let mut pending: Vec<_> = parked.lock().drain(..).collect();
    assert_eq!(pending.len(), 4);
    pending.sort_by(|left, right| left.0.cmp(&right.0));
    let mut callbacks: Vec<_> = pending.into_iter().map(Some).collect();
    for &index in order {
        assert!(promise.is_pending());
        let (name, callback) = callbacks[index].take().expect("每个引用只完成一次");
        callback.resolve(Value::from(name.to_uppercase()));
    }

    promise.await.unwrap().get("list")
}

fn expected_list() -> Option<Value> {
    Some(Value::Array(vec![
        Value::from("A"),
        Value::from("B"),
        Value::from("C"),
        Value::from("D"),
    ]))
}

#[tokio::test]
async fn test_sequence_order_preserved_when_resolved_in_reverse() {
    assert_eq!(wire_list_completing_in(&[3, 2, 1, 0]).await, expected_list());
}

#[tokio::test]
async fn test_sequence_order_preserved_when_resolved_shuffled() {
    assert_eq!(wire_list_completing_in(&[2, 0, 3, 1]).await, expected_list());
}

#[tokio::test]
async fn test_init_methods_run_in_directive_order_after_properties() {
    let fixture = Fixture::new();
    let spec = json!({
        "svc": {
            "create": "app/svc",
            "properties": {"name": "primary"},
            "init": {"configure": ["a", "b"], "missing": [], "start": "now"}
        },
        "db": {"create": "app/db", "init": "start"}
    });

    let context = fixture.engine().wire(&spec).await.unwrap();

    let journal = fixture.journal();
    let svc_calls: Vec<_> = journal.iter().filter(|entry| entry.starts_with("svc.")).collect();
    assert_eq!(svc_calls, vec!["svc.configure(2)", "svc.start(1)"]);
    assert!(journal.contains(&"db.start(0)".to_string()));
    assert_eq!(
        service(&context.get("svc").unwrap()).property("name"),
        Some(Value::from("primary"))
    );
    assert!(context
        .object_states()
        .iter()
        .all(|record| record.state == ObjectState::Initialized));
}

#[tokio::test]
async fn test_nested_creation_in_properties_is_counted() {
    let fixture = Fixture::new();
    let spec = json!({
        "svc": {
            "create": "app/svc",
            "properties": {"pool": {"create": "app/pool", "init": "start"}},
            "init": "start"
        }
    });

    let context = fixture.engine().wire(&spec).await.unwrap();

    let states = context.object_states();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|record| record.state == ObjectState::Initialized));
    let pool = service(&context.get("svc").unwrap()).property("pool").unwrap();
    assert_eq!(service(&pool).label, "pool");
    let mut journal = fixture.journal();
    journal.sort();
    assert_eq!(journal, vec!["pool.start(0)", "svc.start(0)"]);
}

#[tokio::test]
async fn test_empty_properties_mapping_completes() {
    let fixture = Fixture::new();
    let spec = json!({"svc": {"create": "app/svc", "properties": {}, "init": "start"}});
    let context = fixture.engine().wire(&spec).await.unwrap();
    assert_eq!(fixture.journal(), vec!["svc.start(0)"]);
    assert_eq!(context.object_states()[0].state, ObjectState::Initialized);
}

#[tokio::test]
async fn test_destroy_runs_each_thunk_once_in_registration_order() {
    let fixture = Fixture::new();
    let spec = json!({
        "first": {"create": "app/svc", "destroy": "stop"},
        "second": {"create": "app/db", "destroy": {"close": [], "stop": []}},
        "third": {"create": "app/pool"}
    });

    let context = fixture.engine().wire(&spec).await.unwrap();
    context.destroy().await.unwrap();
    context.destroy().await.unwrap();

    assert_eq!(fixture.journal(), vec!["svc.stop(0)", "db.close(0)", "db.stop(0)"]);
    let states: Vec<_> = context.object_states().into_iter().map(|record| record.state).collect();
    assert_eq!(
        states,
        vec![ObjectState::Destroyed, ObjectState::Destroyed, ObjectState::Initialized]
    );
    assert!(context.is_destroyed());
    assert!(context.get("first").is_none());
}

#[tokio::test]
async fn test_parent_destroy_reaches_dropped_child() {
    let fixture = Fixture::new();
    let parent = fixture.engine().wire(&json!({"value": 1})).await.unwrap();
    let child = parent
        .wire(&json!({"closer": {"create": "app/svc", "destroy": "close"}}))
        .await
        .unwrap();
    drop(child);

    parent.destroy().await.unwrap();
    assert_eq!(fixture.journal(), vec!["svc.close(0)"]);
}

#[tokio::test]
async fn test_child_destroyed_first_is_not_destroyed_again() {
    let fixture = Fixture::new();
    let parent = fixture.engine().wire(&json!({"value": 1})).await.unwrap();
    let child = parent
        .wire(&json!({"closer": {"create": "app/svc", "destroy": "close"}}))
        .await
        .unwrap();

    child.destroy().await.unwrap();
    parent.destroy().await.unwrap();
    assert_eq!(fixture.journal(), vec!["svc.close(0)"]);
    assert!(child.is_destroyed());
}

#[tokio::test]
async fn test_destroy_without_thunks_resolves() {
    let fixture = Fixture::new();
    let context = fixture.engine().wire(&json!({"value": 1})).await.unwrap();
    context.destroy().await.unwrap();
    assert!(context.is_destroyed());
}

#[tokio::test]
async fn test_construction_failure_rejects_context() {
    let fixture = Fixture::new();
    let spec = json!({
        "errors": {"module": "test/errors"},
        "ok": {"create": "app/svc", "init": "start"},
        "bad": {"create": "app/broken"}
    });

    let err = fixture.engine().wire(&spec).await.unwrap_err();

    match err {
        WireError::ObjectCreationFailed { source } => {
            assert!(matches!(*source, WireError::Construction { ref module, .. } if module == "app/broken"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*fixture.errors.lock(), vec!["object creation failed".to_string()]);
    assert_eq!(fixture.constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_module_load_failure_rejects_every_phase() {
    let fixture = Fixture::new();
    let spec = json!({"ghost": {"create": "app/ghost"}});

    let err = fixture.engine().wire(&spec).await.unwrap_err();

    match err {
        WireError::ObjectCreationFailed { source } => {
            assert!(matches!(*source, WireError::ModuleLoadingFailed { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_default_modules_are_loaded_with_spec_modules() {
    let fixture = Fixture::new();
    let engine = fixture.engine().with_config(wire_common::WireConfig {
        default_modules: vec!["test/errors".to_string()],
        ..Default::default()
    });

    let result = engine
        .wire(&json!({"svc": {"create": "app/svc", "init": "explode"}}))
        .await;

    assert!(result.is_err());
    assert_eq!(
        fixture.loader.requests(),
        vec![vec!["test/errors".to_string(), "app/svc".to_string()]]
    );
    assert_eq!(*fixture.errors.lock(), vec!["initialization failed".to_string()]);
}

#[tokio::test]
async fn test_property_without_setter_rejects_context_ready() {
    let fixture = Fixture::new();
    let spec = json!({"svc": {"create": "app/svc", "properties": {"rejected": 1}}});

    let err = fixture.engine().wire(&spec).await.unwrap_err();
    assert!(matches!(err, WireError::NoSetter { ref property } if property == "rejected"));
}

#[tokio::test]
async fn test_property_value_failure_rejects_context_ready() {
    let fixture = Fixture::new();
    let spec = json!({"svc": {"create": "app/svc", "properties": {"dep": {"$ref": "nope"}}}});

    let err = fixture.engine().wire(&spec).await.unwrap_err();
    assert!(matches!(err, WireError::UnresolvedReference { .. }));
}

#[tokio::test]
async fn test_init_failure_rejects_context_ready() {
    let fixture = Fixture::new();
    let spec = json!({
        "errors": {"module": "test/errors"},
        "svc": {"create": "app/svc", "init": {"configure": [], "explode": [], "start": []}}
    });

    let err = fixture.engine().wire(&spec).await.unwrap_err();

    assert!(matches!(err, WireError::InitFailed { ref method, .. } if method == "explode"));
    assert_eq!(fixture.journal(), vec!["svc.configure(0)", "svc.explode(0)"]);
    assert_eq!(*fixture.errors.lock(), vec!["initialization failed".to_string()]);
}

#[tokio::test]
async fn test_invalid_root_spec() {
    let fixture = Fixture::new();
    let err = fixture.engine().wire(&json!("just a string")).await.unwrap_err();
    assert!(matches!(err, WireError::InvalidSpec { .. }));
}

#[tokio::test]
async fn test_sequence_root_binds_indices() {
    let fixture = Fixture::new();
    let context = fixture
        .engine()
        .wire(&json!([{"create": "app/db"}, "plain"]))
        .await
        .unwrap();
    assert!(context.get("0").unwrap().as_object().is_some());
    assert_eq!(context.get("1"), Some(Value::from("plain")));
}

#[tokio::test]
async fn test_listeners_observe_object_lifecycle() {
    let fixture = Fixture::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (created, applied, initialized, ready, destroyed) = (
        Arc::clone(&events),
        Arc::clone(&events),
        Arc::clone(&events),
        Arc::clone(&events),
        Arc::clone(&events),
    );
    fixture.loader.register(Module::plugin(
        "test/listeners",
        Plugin::new().with_listeners(
            Listeners::new()
                .on_object_created(move |object, _| record(&created, "created", object))
                .on_properties_applied(move |object, _| record(&applied, "applied", object))
                .on_object_initialized(move |object, _| record(&initialized, "initialized", object))
                .on_context_ready(move |bindings| {
                    ready.lock().push(format!("ready:{}", bindings.len()))
                })
                .on_object_destroyed(move |object, spec| {
                    record(&destroyed, &format!("destroyed:{}", spec["destroy"]), object)
                }),
        ),
    ));

    let spec = json!({
        "listeners": {"module": "test/listeners"},
        "svc": {"create": "app/svc", "properties": {"name": "x"}, "destroy": "stop"}
    });
    let context = fixture.engine().wire(&spec).await.unwrap();
    context.destroy().await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            "created:svc".to_string(),
            "applied:svc".to_string(),
            "initialized:svc".to_string(),
            "ready:2".to_string(),
            "destroyed:\"stop\":svc".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_plugin_on_load_runs_once_across_scopes() {
    let fixture = Fixture::new();
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    fixture.loader.register(Module::plugin(
        "test/hooked",
        Plugin::new().on_load(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    ));

    let engine = fixture.engine();
    let spec = json!({"hook": {"module": "test/hooked"}});
    let context = engine.wire(&spec).await.unwrap();
    context.wire(&spec).await.unwrap();
    engine.wire(&spec).await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_surface_gate_holds_context_ready() {
    let fixture = Fixture::new();
    let gate = ManualGate::new();
    let engine = fixture.engine().with_gate(Arc::new(gate.clone()));

    let promise = engine.wire(&json!({"svc": {"create": "app/svc", "init": "start"}}));
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fixture.journal(), vec!["svc.start(0)"]);
    assert!(promise.is_pending());

    gate.fire();
    assert!(promise.await.is_ok());
}

#[tokio::test]
async fn test_zero_init_work_skips_surface_gate() {
    let fixture = Fixture::new();
    let gate = ManualGate::new();
    let engine = fixture.engine().with_gate(Arc::new(gate.clone()));

    let context = engine.wire(&json!({"a": 1})).await.unwrap();
    assert_eq!(context.get("a"), Some(Value::from(1)));
    assert!(!gate.is_fired());
}

#[tokio::test]
async fn test_context_resolve_by_name() {
    let fixture = Fixture::new();
    let context = fixture
        .engine()
        .wire(&json!({"db": {"create": "app/db"}}))
        .await
        .unwrap();

    let db = context.resolve("db").await.unwrap();
    assert_eq!(Some(db), context.get("db"));
    assert!(context.resolve("nothing").await.is_err());
}

#[tokio::test]
async fn test_independent_roots_wire_concurrently() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let specs: Vec<_> = (0..4)
        .map(|index| json!({"svc": {"create": "app/svc", "args": [index]}}))
        .collect();

    let contexts = futures::future::join_all(specs.iter().map(|spec| engine.wire(spec))).await;

    let mut ids = Vec::new();
    for (index, context) in contexts.into_iter().enumerate() {
        let context = context.unwrap();
        let svc = service(&context.get("svc").unwrap());
        assert_eq!(svc.args, vec![Value::from(index as i64)]);
        ids.push(context.info().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(fixture.loader.requests().len(), 4);
}
