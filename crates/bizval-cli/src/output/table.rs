use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_scalar, result_of, rows_of};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    println!("{}", render_table(value));
}

/// Scalar fields become a Field/Value table; the command's row collection
/// (predictions, sweep points, tornado bars, blended methods) becomes a
/// second table. Warnings and methodology follow.
pub fn render_table(value: &Value) -> String {
    let mut out = String::new();
    match result_of(value) {
        Value::Object(result) => {
            out.push_str(&field_table(result));
            if let Some((key, rows)) = rows_of(result) {
                out.push_str(&format!("\n\n{}:\n{}", key, row_table(rows)));
            }
        }
        Value::Array(rows) => out.push_str(&row_table(rows)),
        other => out.push_str(&format_scalar(other)),
    }

    if let Some(envelope) = value.as_object() {
        if let Some(Value::Array(warnings)) = envelope.get("warnings") {
            if !warnings.is_empty() {
                out.push_str("\n\nWarnings:");
                for w in warnings.iter().filter_map(Value::as_str) {
                    out.push_str(&format!("\n  - {}", w));
                }
            }
        }
        if let Some(Value::String(meth)) = envelope.get("methodology") {
            out.push_str(&format!("\n\nMethodology: {}", meth));
        }
    }
    out
}

fn field_table(map: &Map<String, Value>) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if matches!(val, Value::Array(rows) if rows.iter().any(Value::is_object)) {
            continue;
        }
        builder.push_record([key.as_str(), &format_cell(val)]);
    }
    Table::from(builder).to_string()
}

fn row_table(rows: &[Value]) -> String {
    let Some(Value::Object(first)) = rows.first() else {
        return rows.iter().map(format_cell).collect::<Vec<_>>().join("\n");
    };

    let headers: Vec<String> = first
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, _)| k.clone())
        .collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_cell).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    Table::from(builder).to_string()
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Array(arr) => arr.iter().map(format_cell).collect::<Vec<_>>().join(", "),
        other => format_scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forecast_renders_prediction_rows() {
        let v = json!({
            "result": {
                "method": "manual",
                "predictions": [
                    {"year": 2025, "predicted_value": "120.00", "lower_bound": "102.00",
                     "upper_bound": "138.00", "scenario": "base"},
                ],
            },
            "warnings": ["Year 2025: Negative value projected"],
            "methodology": "Manual projections",
        });
        let out = render_table(&v);
        assert!(out.contains("predictions:"));
        assert!(out.contains("2025"));
        assert!(out.contains("138.00"));
        assert!(out.contains("  - Year 2025: Negative value projected"));
        assert!(out.contains("Methodology: Manual projections"));
    }

    #[test]
    fn test_nested_objects_skipped_in_rows() {
        let rows = vec![json!({"method": "dcf", "details": {"x": 1}, "weight": "1"})];
        let out = row_table(&rows);
        assert!(out.contains("method"));
        assert!(!out.contains("details"));
    }
}
