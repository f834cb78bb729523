//! Pure normalization helpers over `serde_json` values.
//!
//! An identifiable object (`__typename` + id field) is replaced by
//! `{"__ref": "<typename>:<id>"}` and its fields are merged into the entity
//! table. Reading walks the references back.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key of a reference object.
pub const REF_KEY: &str = "__ref";

/// Entity table: entity id → normalized fields.
pub type Entities = HashMap<String, Map<String, Value>>;

/// Cache id of an object, or `None` if it is not identifiable.
pub fn identify(value: &Value, id_fields: &[String]) -> Option<String> {
    let obj = value.as_object()?;
    let typename = obj.get("__typename")?.as_str()?;
    id_fields.iter().find_map(|field| match obj.get(field) {
        Some(Value::String(id)) => Some(format!("{}:{}", typename, id)),
        Some(Value::Number(id)) => Some(format!("{}:{}", typename, id)),
        _ => None,
    })
}

pub fn reference(id: &str) -> Value {
    let mut obj = Map::new();
    obj.insert(REF_KEY.to_string(), Value::String(id.to_string()));
    Value::Object(obj)
}

/// The referenced id if `obj` is exactly a reference.
pub fn as_reference(obj: &Map<String, Value>) -> Option<&str> {
    if obj.len() != 1 {
        return None;
    }
    obj.get(REF_KEY)?.as_str()
}

/// Normalize `value`, storing identifiable objects in `entities`.
pub fn normalize(value: &Value, id_fields: &[String], entities: &mut Entities) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| normalize(item, id_fields, entities))
                .collect(),
        ),
        Value::Object(obj) => {
            let fields: Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v, id_fields, entities)))
                .collect();
            match identify(value, id_fields) {
                Some(id) => {
                    entities.entry(id.clone()).or_default().extend(fields);
                    reference(&id)
                }
                None => Value::Object(fields),
            }
        }
        other => other.clone(),
    }
}

/// Response keys present in a result, as a tree mirroring its shape.
///
/// Objects map each key to the selection of its value, arrays hold one
/// selection per item and leaves are `null`.
pub fn selection(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), selection(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(selection).collect()),
        _ => Value::Null,
    }
}

/// Resolve references in `value`, keeping only the keys in `selection`.
///
/// Returns `None` if a referenced entity or a selected field is missing.
pub fn project(value: &Value, selection: &Value, entities: &Entities) -> Option<Value> {
    match (value, selection) {
        (Value::Array(items), Value::Array(selections)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match selections.get(i).or(selections.last()) {
                Some(sel) => project(item, sel, entities),
                None => denormalize(item, entities, &mut Vec::new()),
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        (Value::Object(obj), Value::Object(keys)) => {
            let fields = match as_reference(obj) {
                Some(id) => entities.get(id)?,
                None => obj,
            };
            keys.iter()
                .map(|(k, sel)| project(fields.get(k)?, sel, entities).map(|v| (k.clone(), v)))
                .collect::<Option<Map<_, _>>>()
                .map(Value::Object)
        }
        (Value::Object(_), _) | (Value::Array(_), _) => {
            denormalize(value, entities, &mut Vec::new())
        }
        (other, _) => Some(other.clone()),
    }
}

/// Resolve references in `value`.
///
/// Returns `None` if any referenced entity is missing. A reference back to
/// an entity already being resolved is left as a reference.
pub fn denormalize(value: &Value, entities: &Entities, visiting: &mut Vec<String>) -> Option<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| denormalize(item, entities, visiting))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Value::Object(obj) => match as_reference(obj) {
            Some(id) => {
                if visiting.iter().any(|v| v == id) {
                    return Some(value.clone());
                }
                let entity = entities.get(id)?;
                visiting.push(id.to_string());
                let resolved = denormalize_fields(entity, entities, visiting);
                visiting.pop();
                resolved.map(Value::Object)
            }
            None => denormalize_fields(obj, entities, visiting).map(Value::Object),
        },
        other => Some(other.clone()),
    }
}

fn denormalize_fields(
    fields: &Map<String, Value>,
    entities: &Entities,
    visiting: &mut Vec<String>,
) -> Option<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| denormalize(v, entities, visiting).map(|v| (k.clone(), v)))
        .collect()
}
