//! Canonical JSON encoding
//!
//! Signing input must not depend on the key order a JSON library happens to
//! use, so plugin sets are written through this encoder. Object keys are
//! emitted in ascending byte order at every depth, with no whitespace.
//! Scalars use serde_json's encoding.

use serde_json::Value;

/// Encode a value as canonical JSON
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Name of a value's JSON type, for error messages
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({
            "zeta": {"b": 1, "a": [{"y": true, "x": null}]},
            "alpha": "first"
        });

        assert_eq!(
            to_canonical_string(&value),
            r#"{"alpha":"first","zeta":{"a":[{"x":null,"y":true}],"b":1}}"#
        );
    }

    #[test]
    fn test_array_order_preserved() {
        let value = json!(["b", "a", 3, 1.5]);
        assert_eq!(to_canonical_string(&value), r#"["b","a",3,1.5]"#);
    }

    #[test]
    fn test_strings_escaped() {
        let value = json!({"say \"hi\"": "line\nbreak"});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"say \"hi\"":"line\nbreak"}"#
        );
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(kind_name(&json!(null)), "null");
        assert_eq!(kind_name(&json!(4)), "number");
        assert_eq!(kind_name(&json!({})), "object");
    }
}
