use serde_json::{Number, Value};

use crate::policy::Attributes;

/// Top-level keys of `desired` whose value differs from `live`
///
/// A key missing from live counts as changed unless the desired value is
/// null. Keys only present in live are ignored. Lists compare element by
/// element, so reordering is a change.
pub fn diff(desired: &Attributes, live: &Attributes) -> Vec<String> {
    desired
        .iter()
        .filter(|(key, value)| match live.get(key.as_str()) {
            Some(current) => !same(value, current),
            None => !value.is_null(),
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// Right-biased overlay of `desired` onto `live`; live-only keys survive
pub fn overlay(live: &Attributes, desired: &Attributes) -> Attributes {
    let mut merged = live.clone();
    for (key, value) in desired {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => same_number(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| same(x, y)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly; a float on either side compares by value
fn same_number(x: &Number, y: &Number) -> bool {
    if x.is_f64() || y.is_f64() {
        return x.as_f64() == y.as_f64();
    }
    match (x.as_i64(), y.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => x.as_u64().is_some() && x.as_u64() == y.as_u64(),
    }
}
