use serde_json::Value;

use super::{format_scalar, result_of};

/// Key answer fields, most specific first.
const PRIORITY_KEYS: [&str; 6] = [
    "final_value",
    "wacc",
    "equity_value",
    "calculated_value",
    "enterprise_value",
    "base_valuation",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", render_minimal(value));
}

/// Well-known result fields in order of priority; a forecast prints one
/// `year: value` line per prediction; otherwise the first field.
pub fn render_minimal(value: &Value) -> String {
    let result = result_of(value);

    let Value::Object(map) = result else {
        return format_scalar(result);
    };

    for key in PRIORITY_KEYS {
        if let Some(val) = map.get(key) {
            if !val.is_null() {
                return format_scalar(val);
            }
        }
    }

    if let Some(Value::Array(predictions)) = map.get("predictions") {
        return predictions
            .iter()
            .map(|p| format!("{}: {}", format_scalar(&p["year"]), format_scalar(&p["predicted_value"])))
            .collect::<Vec<_>>()
            .join("\n");
    }

    match map.iter().next() {
        Some((key, val)) => format!("{}: {}", key, format_scalar(val)),
        None => String::new(),
    }
}
