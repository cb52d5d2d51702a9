//! Filters chart templates can use on top of MiniJinja's builtins
//!
//! Names and behaviour follow the Helm helpers chart authors already know:
//! `toyaml`, `tojson`, `b64encode`, `quote`, `indent`, `nindent`, `required`.

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};

fn invalid(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(invalid)
}

/// `{{ values.config | toyaml }}`, without the leading document marker
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(invalid)?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// `{{ values.config | tojson }}`, compact
pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(invalid)
}

#[must_use]
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Wrap in double quotes, escaping backslashes and quotes
#[must_use]
pub fn quote(value: Value) -> String {
    let text = value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string());
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// [`indent`] preceded by a newline
#[must_use]
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Prefix every non-empty line with `spaces` spaces
#[must_use]
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{}{}", pad, line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail rendering when the value is undefined, none or an empty string
///
/// `{{ values.body.name | required("body.name must be set") }}`
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);

    if !missing {
        return Ok(value);
    }
    Err(invalid(message.as_deref().unwrap_or("a required value is missing")))
}
