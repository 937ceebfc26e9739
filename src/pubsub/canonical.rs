use std::any::{Any, TypeId};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::HubError;

/// Каноническое сообщение структурированного хаба.
pub type CanonicalMap = Map<String, Value>;

/// Приводит произвольные данные к каноническому словарю.
///
/// Данные сериализуются в `serde_json::Value`; всё, что не является
/// JSON-объектом, даёт [`HubError::Marshal`].
pub fn to_canonical<D>(data: &D) -> Result<CanonicalMap, HubError>
where
    D: Serialize + ?Sized,
{
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        other => Err(HubError::Marshal(format!(
            "expected a keyed map, got {}",
            value_kind(&other)
        ))),
    }
}

/// Добавляет значения по умолчанию только для отсутствующих ключей.
pub fn merge_annotations(
    message: &mut CanonicalMap,
    annotations: &CanonicalMap,
) {
    for (key, value) in annotations {
        if !message.contains_key(key) {
            message.insert(key.clone(), value.clone());
        }
    }
}

/// Преобразует каноническое сообщение в тип обработчика.
///
/// Для `CanonicalMap` сообщение передаётся как есть, без повторной
/// сериализации.
pub fn from_canonical<T>(message: &CanonicalMap) -> Result<T, HubError>
where
    T: DeserializeOwned + 'static,
{
    if TypeId::of::<T>() == TypeId::of::<CanonicalMap>() {
        let passthrough: Box<dyn Any> = Box::new(message.clone());
        if let Ok(map) = passthrough.downcast::<T>() {
            return Ok(*map);
        }
    }
    serde_json::from_value(Value::Object(message.clone()))
        .map_err(|err| HubError::Unmarshal(err.to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
