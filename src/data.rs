//! Loading and reading template data.
//!
//! Templates are YAML on disk but everything downstream works on JSON values
//! with string keys, because the output is a JSON request body and most keys
//! pass through untouched. Key order is preserved end to end.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::{Result, TemplateError};

/// Owned, ordered, string-keyed data map used by every entity.
pub type DataMap = Map<String, Value>;

/// Read a YAML file and normalize it into a JSON value.
pub fn read_yaml(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
    parse_yaml(&source)
}

/// Parse YAML source and normalize it into a JSON value.
pub fn parse_yaml(source: &str) -> Result<Value> {
    let raw: serde_yaml::Value = serde_yaml::from_str(source)?;
    normalize(raw)
}

/// Convert a YAML value into a JSON value with canonical string keys.
///
/// Scalar mapping keys (`1:`, `true:`) become their string form. Tags are
/// dropped and their inner value kept.
pub fn normalize(value: serde_yaml::Value) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => normalize_number(&n)?,
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(normalize)
                .collect::<Result<Vec<_>>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = DataMap::new();
            for (key, value) in mapping {
                map.insert(normalize_key(key)?, normalize(value)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => normalize(tagged.value)?,
    })
}

fn normalize_key(key: serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => normalize_key(tagged.value),
        other => Err(TemplateError::InvalidData(format!(
            "mapping keys must be scalars, got {:?}",
            other
        ))),
    }
}

fn normalize_number(n: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::from(u))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| TemplateError::InvalidData(format!("unrepresentable number {}", n)))
    }
}

/// Text form of a scalar. `None` for null, arrays and objects.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text form of `map[key]`.
pub fn text_at(map: &DataMap, key: &str) -> Option<String> {
    map.get(key).and_then(text)
}

/// Lenient integer read: leading digits of a string, truncated floats,
/// zero for anything else.
pub fn integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => leading_integer(s),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// True when the key is present and not null.
pub fn is_set(map: &DataMap, key: &str) -> bool {
    map.get(key).is_some_and(|v| !v.is_null())
}

/// Borrow a required array out of `map`.
pub fn array<'a>(map: &'a DataMap, context: &'static str, key: &'static str) -> Result<&'a Vec<Value>> {
    match map.get(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(TemplateError::MissingKey { context, key }),
        Some(other) => Err(TemplateError::InvalidData(format!(
            "{}: '{}' must be a list, got {}",
            context, key, other
        ))),
    }
}

/// Borrow a required object out of `map`.
pub fn object<'a>(map: &'a DataMap, context: &'static str, key: &'static str) -> Result<&'a DataMap> {
    match map.get(key) {
        Some(Value::Object(inner)) => Ok(inner),
        Some(Value::Null) | None => Err(TemplateError::MissingKey { context, key }),
        Some(other) => Err(TemplateError::InvalidData(format!(
            "{}: '{}' must be a mapping, got {}",
            context, key, other
        ))),
    }
}

/// Interpret a value as an object, failing with `context` otherwise.
pub fn as_object(value: &Value, context: &'static str) -> Result<DataMap> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(TemplateError::InvalidData(format!(
            "{}: expected a mapping, got {}",
            context, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_scalar_keys() {
        let value = parse_yaml("1: one\ntrue: yes\nname: x\n").unwrap();
        assert_eq!(value, json!({"1": "one", "true": "yes", "name": "x"}));
    }

    #[test]
    fn test_normalize_preserves_key_order() {
        let value = parse_yaml("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_normalize_rejects_sequence_key() {
        let err = parse_yaml("? [a, b]\n: value\n").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidData(_)));
    }

    #[test]
    fn test_integer_is_lenient() {
        assert_eq!(integer(Some(&json!("42"))), 42);
        assert_eq!(integer(Some(&json!("  -7px"))), -7);
        assert_eq!(integer(Some(&json!("abc"))), 0);
        assert_eq!(integer(Some(&json!(12))), 12);
        assert_eq!(integer(Some(&json!(12.9))), 12);
        assert_eq!(integer(Some(&json!(null))), 0);
        assert_eq!(integer(None), 0);
    }

    #[test]
    fn test_text_forms() {
        assert_eq!(text(&json!("a")), Some("a".to_string()));
        assert_eq!(text(&json!(3)), Some("3".to_string()));
        assert_eq!(text(&json!(true)), Some("true".to_string()));
        assert_eq!(text(&json!(null)), None);
        assert_eq!(text(&json!([1])), None);
    }

    #[test]
    fn test_required_keys() {
        let map = json!({"documents": "nope"}).as_object().unwrap().clone();
        assert!(matches!(
            array(&map, "template", "recipients"),
            Err(TemplateError::MissingKey { key: "recipients", .. })
        ));
        assert!(matches!(
            array(&map, "template", "documents"),
            Err(TemplateError::InvalidData(_))
        ));
    }
}
