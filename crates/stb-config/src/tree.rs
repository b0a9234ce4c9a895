//! JSON tree helpers shared by loading, the secret guard and the unused-key
//! report. Pointers follow RFC 6901 (`~0`, `~1` escapes).

use serde_json::{Map, Value};

/// Every scalar leaf of `root` with its JSON pointer, in document order.
/// A scalar root yields the single pointer `/`.
pub(crate) fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((at, node)) = stack.pop() {
        match node {
            Value::Object(map) => {
                // reversed so the pops come out in key order
                for (key, child) in map.iter().rev() {
                    stack.push((format!("{at}/{}", escape_token(key)), child));
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{at}/{idx}"), child));
                }
            }
            scalar => {
                let at = if at.is_empty() { "/".to_string() } else { at };
                out.push((at, scalar));
            }
        }
    }
    out
}

fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// True when `leaf` is `prefix` itself or sits underneath it.
/// Comparison is per segment: `/roles` covers `/roles/coach`, not `/rolesx`.
pub(crate) fn covers(prefix: &str, leaf: &str) -> bool {
    let want = segments(prefix);
    let have = segments(leaf);
    want.len() <= have.len() && want.iter().zip(&have).all(|(a, b)| a == b)
}

fn segments(pointer: &str) -> Vec<&str> {
    pointer.split('/').filter(|s| !s.is_empty()).collect()
}

/// Overlay `top` onto `base` in place. Objects merge key by key; any other
/// value in `top` replaces what was there.
pub(crate) fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Copy of `v` whose objects are rebuilt in sorted key order at every depth.
pub(crate) fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, child)| (k.clone(), sorted(child)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
