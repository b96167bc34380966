use serde_json::Value;
use std::io::{self, Write};

/// Write output as CSV to stdout. Projection sections (arrays of yearly
/// rows) become one record per year; anything else is `field,value`.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let target = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let written = match target {
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        Value::Object(map) => {
            let mut rows = Vec::new();
            flatten("", target, &mut rows);
            if map.is_empty() {
                Ok(())
            } else {
                write_field_rows(&mut wtr, &rows)
            }
        }
        _ => wtr.write_record([format_csv_value(target)]),
    };

    if let Err(e) = written.and_then(|_| wtr.flush().map_err(csv::Error::from)) {
        eprintln!("CSV output error: {}", e);
    }
}

fn write_field_rows<W: Write>(
    wtr: &mut csv::Writer<W>,
    rows: &[(String, String)],
) -> Result<(), csv::Error> {
    wtr.write_record(["field", "value"])?;
    for (field, value) in rows {
        wtr.write_record([field, value])?;
    }
    Ok(())
}

fn write_array_csv<W: Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) -> Result<(), csv::Error> {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            wtr.write_record([format_csv_value(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    wtr.write_record(&headers)?;
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect();
            wtr.write_record(&row)?;
        }
    }
    Ok(())
}

/// Dotted paths to every scalar, e.g. `year1.noi`, `sale_analysis.0.gross_sale_price`.
fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten(&join(key.as_str()), val, rows);
            }
        }
        Value::Array(arr) => {
            for (i, val) in arr.iter().enumerate() {
                flatten(&join(i.to_string().as_str()), val, rows);
            }
        }
        _ => rows.push((prefix.to_string(), format_csv_value(value))),
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
