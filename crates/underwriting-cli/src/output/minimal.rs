use serde_json::Value;

/// Paths to the headline number of each command, most specific first.
const HEADLINE_PATHS: &[&[&str]] = &[
    &["irr_cash_flows", "hold_period", "irr"],
    &["irr_cash_flows", "five_year", "irr"],
    &["year1", "noi"],
    &["noi"],
    &["irr"],
    &["lp_irr"],
    &["monthly_payment"],
    &["fingerprint"],
    &["base_case_position"],
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match headline(result_obj) {
        Some(val) => println!("{}", format_minimal(val)),
        None => match result_obj {
            Value::Object(map) => match map.iter().next() {
                Some((key, val)) => println!("{}: {}", key, format_minimal(val)),
                None => println!("{{}}"),
            },
            _ => println!("{}", format_minimal(result_obj)),
        },
    }
}

/// First non-null value found along `HEADLINE_PATHS`.
fn headline(result: &Value) -> Option<&Value> {
    HEADLINE_PATHS.iter().find_map(|path| {
        path.iter()
            .try_fold(result, |node, key| node.get(*key))
            .filter(|v| !v.is_null())
    })
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
