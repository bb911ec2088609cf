//! Dot-separated key access over a serialized JSON tree.
//!
//! Used by both [`Config`](super::Config) and
//! [`Settings`](crate::settings::Settings) so the CLI can edit nested fields
//! with `section.field` keys. The existing value decides how the new string is
//! parsed.

use serde_json::Value;

use crate::error::ConfigError;

/// Look up a nested value by `a.b.c` path.
pub fn get_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Replace an existing nested value, parsing `value` according to the type
/// already stored there.
///
/// # Errors
/// [`ConfigError::UnknownKey`] if the path does not exist,
/// [`ConfigError::InvalidValue`] if `value` does not parse as the existing type.
pub fn set_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let mut parts = key.split('.').peekable();
    if key.is_empty() {
        return Err(unknown());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            current = current.get_mut(part).ok_or_else(unknown)?;
            continue;
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(part).ok_or_else(unknown)?;

        let new_value = match existing {
            Value::Bool(_) => Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            Value::Number(_) => {
                if let Ok(n) = value.parse::<i64>() {
                    Value::Number(n.into())
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as number")));
                }
            }
            Value::Object(_) | Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            // Optional fields serialize as null; accept JSON, fall back to a string.
            Value::Null => serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.into())),
            Value::String(_) => Value::String(value.into()),
        };

        obj.insert(part.to_string(), new_value);
        return Ok(());
    }

    Err(unknown())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "reprogram": { "debounce_ms": 500, "enabled": true },
            "label": "x",
            "coords": { "latitude": 1.5 }
        })
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let v = sample();
        assert_eq!(get_by_path(&v, "reprogram.debounce_ms"), Some(&json!(500)));
        assert!(get_by_path(&v, "reprogram.missing").is_none());
        assert!(get_by_path(&v, "").is_none());
    }

    #[test]
    fn set_updates_by_existing_type() {
        let mut v = sample();
        set_by_path(&mut v, "reprogram.enabled", "false").unwrap();
        set_by_path(&mut v, "reprogram.debounce_ms", "750").unwrap();
        set_by_path(&mut v, "coords.latitude", "-33.87").unwrap();
        set_by_path(&mut v, "label", "y").unwrap();
        assert_eq!(v["reprogram"]["enabled"], json!(false));
        assert_eq!(v["reprogram"]["debounce_ms"], json!(750));
        assert_eq!(v["coords"]["latitude"], json!(-33.87));
        assert_eq!(v["label"], json!("y"));
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut v = sample();
        assert!(matches!(
            set_by_path(&mut v, "reprogram.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(set_by_path(&mut v, "", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut v = sample();
        assert!(matches!(
            set_by_path(&mut v, "reprogram.enabled", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
