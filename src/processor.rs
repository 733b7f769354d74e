//! Annotation-driven writes into a JSON document.
//!
//! A workload author can set arbitrary fields of the generated API definition by annotating the
//! workload with a typed key, e.g. `num.service.tyk.io/proxy.listen-port: "8080"`.  The prefix
//! picks the coercion, the remainder is a dotted path into the document.  Dashes in the path are
//! written as underscores.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::*;

use crate::errors::{InjectorError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Bool,
    Num,
    Object,
    Array,
}

impl ValueKind {
    const ALL: [ValueKind; 5] = [Self::String, Self::Bool, Self::Num, Self::Object, Self::Array];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::String => "string.service.tyk.io/",
            Self::Bool => "bool.service.tyk.io/",
            Self::Num => "num.service.tyk.io/",
            Self::Object => "object.service.tyk.io/",
            Self::Array => "array.service.tyk.io/",
        }
    }

    /// Split a typed annotation key into its kind and the (still dashed) path.
    pub fn split_key(key: &str) -> Option<(ValueKind, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|kind| key.strip_prefix(kind.prefix()).map(|path| (kind, path)))
    }

    fn coerce(self, key: &str, raw: &str) -> Result<Value> {
        let parse_err = |e: serde_json::Error| InjectorError::Parse { key: key.into(), reason: e.to_string() };
        match self {
            Self::String => Ok(Value::String(raw.into())),
            Self::Bool => {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(InjectorError::UnsupportedValue { key: key.into(), value: raw.into() })
                }
            },
            Self::Num => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| InjectorError::Parse { key: key.into(), reason: e.to_string() }),
            Self::Object => serde_json::from_str::<Map<String, Value>>(raw).map(Value::Object).map_err(parse_err),
            Self::Array => serde_json::from_str::<Vec<Value>>(raw).map(Value::Array).map_err(parse_err),
        }
    }
}

/// Apply every typed annotation onto `document`.
///
/// Keys are visited in lexicographic order (the map is a `BTreeMap`), so when two keys resolve to
/// the same path the lexicographically larger key wins.  Keys without a known prefix are ignored.
/// The first malformed value aborts processing; whatever was written before that point stays in
/// `document`.
pub fn process(annotations: &BTreeMap<String, String>, document: &mut Value) -> Result<()> {
    for (key, raw) in annotations {
        let Some((kind, path)) = ValueKind::split_key(key) else {
            continue;
        };

        let path = path.replace('-', "_");
        if path.is_empty() {
            return Err(InjectorError::Parse { key: key.clone(), reason: "path cannot be empty".into() });
        }

        info!("setting {kind:?} value: {path}");
        let value = kind.coerce(key, raw)?;
        write_path(document, &path, value).map_err(|reason| InjectorError::Parse { key: key.clone(), reason })?;
    }

    Ok(())
}

/// Write `value` at the dotted `path`, creating intermediate objects as needed.  Numeric segments
/// index into existing arrays, and `-1` (or the array length) appends.  An index past the end of
/// the array is rejected.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> Result<()> {
    write_path(document, path, value).map_err(|reason| InjectorError::Parse { key: path.into(), reason })
}

fn write_path(document: &mut Value, path: &str, value: Value) -> std::result::Result<(), String> {
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(document, &segments, value)
}

fn set_segments(current: &mut Value, segments: &[&str], value: Value) -> std::result::Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    if let Value::Array(vec) = current {
        if let Some(idx) = array_index(head, vec.len())? {
            if idx == vec.len() {
                vec.push(Value::Null);
            }
            return set_segments(&mut vec[idx], rest, value);
        }
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    set_segments(&mut current[*head], rest, value)
}

// Non-numeric segments are object keys, even on an array
fn array_index(segment: &str, len: usize) -> std::result::Result<Option<usize>, String> {
    if segment == "-1" {
        return Ok(Some(len));
    }

    let digits = segment.strip_prefix('-').unwrap_or(segment);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    match segment.parse::<usize>() {
        Ok(idx) if idx <= len => Ok(Some(idx)),
        _ => Err(format!("index {segment} is out of bounds for an array of length {len}")),
    }
}
