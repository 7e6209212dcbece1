//! Structured edits of JSON documents.
//!
//! Key order survives the parse/serialize cycle (`serde_json` is built with
//! `preserve_order`). Output reuses the indentation unit, newline convention
//! and trailing newline of the input.

use crate::engine::errors::TransformError;
use crate::engine::lines::Newline;
use crate::engine::operation::ReplaceFn;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

const DEFAULT_INDENT: &str = "  ";

/// Shallow copy of `value` without `keys`. Non-objects are returned as is.
pub fn omit(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub(crate) fn edit_json(content: &str, replace: &ReplaceFn) -> Result<String, TransformError> {
    let document: Value = serde_json::from_str(content).map_err(TransformError::Parse)?;
    let edited = replace(document, omit).map_err(TransformError::Callback)?;
    let mut out = to_string_styled(&edited, &detect_indent(content))?;

    if Newline::detect(content) == Newline::CrLf {
        out = out.replace('\n', "\r\n");
    }
    if content.ends_with('\n') {
        out.push_str(Newline::detect(content).as_str());
    }
    Ok(out)
}

/// Indentation unit of the first indented line, or two spaces.
pub fn detect_indent(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start_matches([' ', '\t']);
            (&line[..line.len() - trimmed.len()], trimmed)
        })
        .find(|(indent, rest)| !indent.is_empty() && !rest.is_empty())
        .map(|(indent, _)| indent.to_string())
        .unwrap_or_else(|| DEFAULT_INDENT.to_string())
}

fn to_string_styled(value: &Value, indent: &str) -> Result<String, TransformError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(TransformError::Serialize)?;
    Ok(String::from_utf8(buffer)?)
}
