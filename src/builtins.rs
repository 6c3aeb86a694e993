use std::cmp::Ordering;

use crate::{
    context::Closure,
    error::{InterpreterError, RegistrationError},
    filters::FilterRegistry,
    value::Value,
};

pub(crate) fn register(registry: &mut FilterRegistry) -> Result<(), RegistrationError> {
    registry
        .add_filter("size", size)?
        .add_filter("upcase", |s: String| s.to_uppercase())?
        .add_filter("downcase", |s: String| s.to_lowercase())?
        .add_filter("join", join)?
        .add_filter("default", default)?
        .add_filter("map", map)?
        .add_filter("sort_by", sort_by)?
        .add_filter("where_exp", where_exp)?;
    Ok(())
}

fn size(value: Value) -> i64 {
    value.len().map_or(0, |len| len as i64)
}

fn join(items: Vec<Value>, separator: Option<String>) -> String {
    let separator = separator.unwrap_or_else(|| " ".to_string());
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&separator)
}

fn default(value: Value, fallback: Value) -> Value {
    let empty = match &value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        other => !other.is_truthy(),
    };
    if empty { fallback } else { value }
}

fn map(items: Vec<Value>, property: String) -> Vec<Value> {
    let key = Value::String(property);
    items.iter().map(|item| item.property_value(&key)).collect()
}

/// `items | sort_by: "item", "item.price"`. Items whose key is nil sort last.
fn sort_by(items: Vec<Value>, name: String, key: Closure) -> Result<Vec<Value>, InterpreterError> {
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((key.bind(name.as_str(), item.clone()).evaluate()?, item)))
        .collect::<Result<Vec<_>, InterpreterError>>()?;
    keyed.sort_by(|(a, _), (b, _)| match (a.is_nil(), b.is_nil()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    });
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// `items | where_exp: "item", "item.active"`
fn where_exp(
    items: Vec<Value>,
    name: String,
    condition: Closure,
) -> Result<Vec<Value>, InterpreterError> {
    let mut kept = Vec::new();
    for item in items {
        if condition.bind(name.as_str(), item.clone()).evaluate()?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(kept)
}
