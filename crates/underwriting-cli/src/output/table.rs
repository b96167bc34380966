use colored::Colorize;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Render the envelope as tables: scalar fields first, then one table per
/// nested section, then warnings and methodology.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => {
                print_section(None, result);
                print_envelope_notes(map);
            }
            None => print_section(None, value),
        },
        _ => print_section(None, value),
    }
}

fn print_section(title: Option<&str>, value: &Value) {
    match value {
        Value::Object(map) => print_object(title, map),
        Value::Array(arr) => print_array(title, arr),
        _ => println!("{}", format_value(value)),
    }
}

fn print_object(title: Option<&str>, map: &Map<String, Value>) {
    let (scalars, nested): (Vec<_>, Vec<_>) = map.iter().partition(|(_, v)| is_scalar(v));

    if !scalars.is_empty() {
        print_title(title);
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in scalars {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }

    for (key, val) in nested {
        let heading = match title {
            Some(t) => format!("{t}.{key}"),
            None => key.clone(),
        };
        print_section(Some(&heading), val);
    }
}

/// Arrays of objects become one row per element; the sensitivity matrix
/// (arrays of arrays) becomes a grid.
fn print_array(title: Option<&str>, arr: &[Value]) {
    print_title(title);
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    match arr.first() {
        Some(Value::Object(first)) => {
            let headers: Vec<String> = first
                .iter()
                .filter(|(_, v)| is_scalar(v))
                .map(|(k, _)| k.clone())
                .collect();
            let mut builder = Builder::default();
            builder.push_record(&headers);
            for item in arr {
                if let Value::Object(map) = item {
                    let row: Vec<String> = headers
                        .iter()
                        .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                        .collect();
                    builder.push_record(row);
                }
            }
            println!("{}", Table::from(builder));
        }
        Some(Value::Array(_)) => {
            let mut builder = Builder::default();
            for row in arr {
                if let Value::Array(cells) = row {
                    builder.push_record(cells.iter().map(format_value));
                }
            }
            println!("{}", Table::from(builder));
        }
        _ => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            println!("{}", items.join(", "));
        }
    }
}

fn print_title(title: Option<&str>) {
    if let Some(t) = title {
        println!("\n{}", t.bold());
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_renders_as_dash() {
        assert_eq!(format_value(&Value::Null), "-");
        assert_eq!(format_value(&json!(["0.05", "0.06"])), "0.05, 0.06");
    }

    #[test]
    fn test_scalar_detection() {
        assert!(is_scalar(&json!("1200.00")));
        assert!(is_scalar(&Value::Null));
        assert!(!is_scalar(&json!({ "noi": "1" })));
        assert!(!is_scalar(&json!([])));
    }
}
