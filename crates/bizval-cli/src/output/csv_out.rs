use serde_json::{Map, Value};
use std::io::{self, Write};

use super::{format_scalar, result_of, rows_of};

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_csv(stdout.lock(), value) {
        eprintln!("CSV output error: {}", e);
    }
}

/// Rows of the command's row collection when present, otherwise
/// two-column `field,value` records of the result.
pub fn write_csv<W: Write>(writer: W, value: &Value) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    match result_of(value) {
        Value::Object(result) => match rows_of(result) {
            Some((_, rows)) => write_rows(&mut wtr, rows)?,
            None => write_fields(&mut wtr, result)?,
        },
        Value::Array(rows) => write_rows(&mut wtr, rows)?,
        other => wtr.write_record([format_scalar(other)])?,
    }

    wtr.flush()?;
    Ok(())
}

fn write_fields<W: Write>(
    wtr: &mut csv::Writer<W>,
    map: &Map<String, Value>,
) -> Result<(), csv::Error> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in map {
        wtr.write_record([key.as_str(), &format_scalar(val)])?;
    }
    Ok(())
}

fn write_rows<W: Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> Result<(), csv::Error> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([format_scalar(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    wtr.write_record(&headers)?;
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_scalar).unwrap_or_default())
                .collect();
            wtr.write_record(&row)?;
        }
    }
    Ok(())
}
