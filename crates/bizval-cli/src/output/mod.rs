pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};
use tracing::debug;

/// Result fields holding the row collections of each command, in the order
/// they are looked up.
const ROW_KEYS: [&str; 4] = ["predictions", "results", "entries", "method_results"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    debug!(?format, "formatting output");
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The `result` object of an envelope, or the value itself.
fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// First row collection found in a result object.
fn rows_of(result: &Map<String, Value>) -> Option<(&'static str, &[Value])> {
    ROW_KEYS.iter().find_map(|key| match result.get(*key) {
        Some(Value::Array(rows)) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
            Some((*key, rows.as_slice()))
        }
        _ => None,
    })
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_lookup_order() {
        let result = json!({
            "method_results": [{"method": "dcf"}],
            "predictions": [{"year": 2025}],
        });
        let (key, rows) = rows_of(result.as_object().unwrap()).unwrap();
        assert_eq!(key, "predictions");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_rows_ignore_scalar_arrays() {
        let result = json!({"results": [1, 2, 3]});
        assert!(rows_of(result.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_result_of_envelope() {
        let v = json!({"result": {"wacc": "0.08"}, "warnings": []});
        assert_eq!(result_of(&v), &json!({"wacc": "0.08"}));
        let bare = json!({"wacc": "0.08"});
        assert_eq!(result_of(&bare), &bare);
    }
}
