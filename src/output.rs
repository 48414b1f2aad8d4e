//! JSON text of script values.
//!
//! Arrays and maps take this form inside string concatenation and templates,
//! and the `till` CLI prints results with it. Map keys come out sorted.
//!
//! ```
//! use tillscript::Value;
//! use tillscript::output::to_json;
//!
//! let items = Value::Array(vec![Value::from("Coffee"), Value::Integer(2)]);
//! assert_eq!(to_json(&items), r#"["Coffee",2]"#);
//! ```

use crate::value::Value;

/// Compact JSON, no whitespace.
pub fn to_json(value: &Value) -> String {
    value.to_json_value().to_string()
}

/// Two-space indented JSON, used by `till eval --pretty`.
pub fn to_json_pretty(value: &Value) -> String {
    // Serializing a serde_json::Value cannot fail
    serde_json::to_string_pretty(&value.to_json_value()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn ticket() -> Value {
        Value::Object(HashMap::from([
            ("qty".to_string(), Value::Integer(2)),
            ("item".to_string(), Value::from("Flat \"white\"\n")),
            ("paid".to_string(), Value::Boolean(true)),
        ]))
    }

    #[test]
    fn compact_output_sorts_keys_and_escapes() {
        assert_eq!(
            to_json(&ticket()),
            r#"{"item":"Flat \"white\"\n","paid":true,"qty":2}"#
        );
    }

    #[test]
    fn pretty_output_indents() {
        assert_eq!(
            to_json_pretty(&Value::Array(vec![Value::Integer(1), Value::Null])),
            "[\n  1,\n  null\n]"
        );
    }

    #[test]
    fn dates_render_as_strings() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(to_json(&Value::Array(vec![Value::Date(date)])), r#"["2024-03-01"]"#);
    }
}
