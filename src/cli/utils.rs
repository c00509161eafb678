use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print a value as JSON, or as rows of text built by `render`
pub fn output_value<F>(output_format: &OutputFormat, value: &Value, render: F) -> anyhow::Result<()>
where
    F: Fn(&Value) -> Vec<String>,
{
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => {
            for line in render(value) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("[]"),
        OutputFormat::Text => println!("{}", message),
    }
    Ok(())
}

/// `value[key]` as display text; empty for missing values
pub fn field(value: &Value, key: &str) -> String {
    match &value[key] {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_renders_strings_without_quotes() {
        let v = json!({"name": "Kitchen", "revision": 3});
        assert_eq!(field(&v, "name"), "Kitchen");
        assert_eq!(field(&v, "revision"), "3");
        assert_eq!(field(&v, "missing"), "");
    }
}
