//! 规格解析器
//!
//! 递归遍历规格节点，按形状分派：
//! 序列和普通映射并行展开，创建节点交给对象生命周期，引用节点交给
//! 引用解析，标量原样返回。

use crate::scope::ScopeInner;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;
use wire_common::{Deferred, ReservedKeys, Value, WireError};

/// 创建节点中的指令
#[derive(Debug, Clone)]
pub(crate) struct Directives {
    pub module: String,
    pub construct: bool,
    pub args: Option<JsonValue>,
    pub properties: Option<Map<String, JsonValue>>,
    pub init: Option<JsonValue>,
    pub destroy: Option<JsonValue>,
    pub spec: JsonValue,
}

/// 是否为创建节点
pub(crate) fn is_creation(map: &Map<String, JsonValue>, keys: &ReservedKeys) -> bool {
    map.contains_key(&keys.create) || map.contains_key(&keys.module)
}

/// 创建节点的模块名：`create` 为字符串时取它，为映射时取其中的模块键，
/// 否则取节点上的模块键
pub(crate) fn creation_module(map: &Map<String, JsonValue>, keys: &ReservedKeys) -> Option<String> {
    let from_create = match map.get(&keys.create) {
        Some(JsonValue::String(name)) => Some(name.as_str()),
        Some(JsonValue::Object(create)) => create.get(&keys.module).and_then(JsonValue::as_str),
        _ => None,
    };
    from_create
        .or_else(|| map.get(&keys.module).and_then(JsonValue::as_str))
        .map(str::to_string)
}

impl Directives {
    /// 读取创建节点的指令，节点上的指令优先于 `create` 映射中的同名指令
    pub(crate) fn read(node: &JsonValue, keys: &ReservedKeys) -> Result<Self, WireError> {
        let map = node
            .as_object()
            .ok_or_else(|| WireError::invalid_spec("创建节点必须是映射"))?;
        let module = creation_module(map, keys)
            .ok_or_else(|| WireError::invalid_spec(format!("创建节点缺少模块名: {node}")))?;
        let create = map.get(&keys.create).and_then(JsonValue::as_object);
        let directive = |key: &str| {
            map.get(key)
                .or_else(|| create.and_then(|create| create.get(key)))
                .cloned()
        };

        let properties = match directive(keys.properties.as_str()) {
            None => None,
            Some(JsonValue::Object(properties)) => Some(properties),
            Some(other) => {
                return Err(WireError::invalid_spec(format!(
                    "模块 {module} 的属性指令必须是映射: {other}"
                )))
            }
        };

        Ok(Self {
            construct: map.contains_key(&keys.create),
            args: directive(keys.args.as_str()),
            init: directive(keys.init.as_str()),
            destroy: directive(keys.destroy.as_str()),
            properties,
            module,
            spec: node.clone(),
        })
    }
}

/// 方法指令：单个方法名，或方法名到参数规格的映射
pub(crate) fn method_entries(directive: Option<&JsonValue>) -> Vec<(String, JsonValue)> {
    match directive {
        Some(JsonValue::String(method)) => vec![(method.clone(), JsonValue::Array(Vec::new()))],
        Some(JsonValue::Object(methods)) => methods
            .iter()
            .map(|(method, args)| (method.clone(), args.clone()))
            .collect(),
        Some(other) => {
            debug!("忽略无法识别的方法指令: {}", other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// 解析结果转为位置参数，非序列结果包装成单元素列表
pub(crate) fn into_args(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// 预扫描规格中出现的所有模块名，按文档顺序去重
///
/// 遍历路径与解析一致：引用节点内部不扫描，创建节点只扫描参数、
/// 属性值和初始化参数。
pub fn collect_module_names(spec: &JsonValue, keys: &ReservedKeys) -> Vec<String> {
    let mut names = Vec::new();
    collect_into(spec, keys, &mut names);
    names
}

fn collect_into(node: &JsonValue, keys: &ReservedKeys, names: &mut Vec<String>) {
    match node {
        JsonValue::Array(items) => {
            for item in items {
                collect_into(item, keys, names);
            }
        }
        JsonValue::Object(map) if is_creation(map, keys) => {
            let Ok(directives) = Directives::read(node, keys) else {
                return;
            };
            if !names.contains(&directives.module) {
                names.push(directives.module.clone());
            }
            if let Some(args) = &directives.args {
                collect_into(args, keys, names);
            }
            if let Some(properties) = &directives.properties {
                for value in properties.values() {
                    collect_into(value, keys, names);
                }
            }
            for (_, args) in method_entries(directives.init.as_ref()) {
                collect_into(&args, keys, names);
            }
        }
        JsonValue::Object(map) if map.contains_key(&keys.reference) => {}
        JsonValue::Object(map) => {
            for value in map.values() {
                collect_into(value, keys, names);
            }
        }
        _ => {}
    }
}

/// 等待所有延迟值完成，结果按输入位置排列
///
/// 第一个失败拒绝整体，之后的失败被忽略。
pub(crate) fn join(parts: Vec<Deferred<Value>>) -> Deferred<Vec<Value>> {
    let joined = Deferred::new();
    if parts.is_empty() {
        joined.resolve(Vec::new());
        return joined;
    }

    let slots = Arc::new(Mutex::new(JoinSlots {
        values: vec![None; parts.len()],
        remaining: parts.len(),
    }));

    for (index, part) in parts.into_iter().enumerate() {
        let slots = Arc::clone(&slots);
        let on_value = joined.clone();
        let on_error = joined.clone();
        part.then(
            move |value| {
                let complete = {
                    let mut slots = slots.lock();
                    slots.values[index] = Some(value.clone());
                    slots.remaining -= 1;
                    if slots.remaining == 0 {
                        Some(slots.values.drain(..).map(Option::unwrap_or_default).collect())
                    } else {
                        None
                    }
                };
                if let Some(values) = complete {
                    let _ = on_value.try_resolve(values);
                }
            },
            move |error| {
                let _ = on_error.try_reject(error.clone());
            },
        );
    }
    joined
}

struct JoinSlots {
    values: Vec<Option<Value>>,
    remaining: usize,
}

impl ScopeInner {
    /// 解析任意规格节点
    pub(crate) fn parse(self: &Arc<Self>, node: &JsonValue) -> Deferred<Value> {
        let keys = &self.config().keys;
        match node {
            JsonValue::Array(items) => {
                let parts = items.iter().map(|item| self.parse(item)).collect();
                map_result(join(parts), Value::Array)
            }
            JsonValue::Object(map) if is_creation(map, keys) => self.create_object(node),
            JsonValue::Object(map) if map.contains_key(&keys.reference) => self.resolve_ref(node),
            JsonValue::Object(map) => {
                let names: Vec<String> = map.keys().cloned().collect();
                let parts = map.values().map(|value| self.parse(value)).collect();
                map_result(join(parts), move |values| {
                    Value::Map(names.into_iter().zip(values).collect())
                })
            }
            scalar => Deferred::resolved(Value::from(scalar)),
        }
    }

    /// 解析根规格，每个顶层键解析完成后立即写入作用域绑定
    ///
    /// 根规格为序列时，绑定键为元素下标。
    pub(crate) fn parse_root(self: &Arc<Self>, spec: &JsonValue) -> Deferred<Value> {
        let entries: Vec<(String, &JsonValue)> = match spec {
            JsonValue::Object(map) => map.iter().map(|(key, node)| (key.clone(), node)).collect(),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, node)| (index.to_string(), node))
                .collect(),
            other => {
                return Deferred::rejected(WireError::invalid_spec(format!(
                    "根规格必须是映射或序列: {other}"
                )))
            }
        };

        for (key, _) in &entries {
            self.expect_binding(key);
        }

        let mut parts = Vec::with_capacity(entries.len());
        for (key, node) in entries {
            let part = self.parse(node);
            let scope = Arc::clone(self);
            let failed = Arc::clone(self);
            let bound_key = key.clone();
            part.then(
                move |value| scope.bind(&key, value.clone()),
                move |error| failed.fail_binding(&bound_key, error),
            );
            parts.push(part);
        }

        let sequence = spec.is_array();
        let scope = Arc::clone(self);
        map_result(join(parts), move |values| {
            if sequence {
                Value::Array(values)
            } else {
                Value::Map(scope.bindings())
            }
        })
    }
}

/// 转换延迟值的结果
pub(crate) fn map_result<T, F>(source: Deferred<T>, transform: F) -> Deferred<Value>
where
    T: Clone + Send + 'static,
    F: FnOnce(T) -> Value + Send + 'static,
{
    let target = Deferred::new();
    let on_value = target.clone();
    let on_error = target.clone();
    source.then(
        move |value| {
            let _ = on_value.try_resolve(transform(value.clone()));
        },
        move |error| {
            let _ = on_error.try_reject(error.clone());
        },
    );
    target
}
