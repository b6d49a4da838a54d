use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_json(stdout.lock(), value) {
        eprintln!("JSON output error: {}", e);
    }
}

/// Pretty JSON followed by a newline, so piped output ends cleanly.
pub fn write_json<W: Write>(mut writer: W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_strings_survive() {
        let mut buf = Vec::new();
        write_json(&mut buf, &json!({"result": {"final_value": "2151317.88"}})).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.ends_with("}\n"));
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back["result"]["final_value"], "2151317.88");
    }
}
