//! Key=value text serialization with optional per-level colorization.

use serde_json::Value;

use crate::level::Level;

/// ANSI code applied to the level value when color is enabled.
///
/// # Arguments
///
/// * `level` - The entry level selecting the color
///
/// # Returns
///
/// ANSI color code as a string
pub fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => "35",
        Level::Info => "32",
        Level::Warn => "33",
        Level::Error => "31",
        Level::Fatal | Level::Panic => "91",
        Level::Nil => "0",
    }
}

/// Wraps text in an ANSI escape sequence.
pub fn colorize(text: &str, code: &str) -> String {
    format!("\x1b[{}m{}\x1b[0m", code, text)
}

/// Serialize a composed field list as one newline-terminated key=value line.
///
/// Values that contain characters outside the plain token set are quoted
/// with escaped quotes. When `color` is set, the value of the `level` key is
/// wrapped in the matching ANSI code.
pub fn format_text(kv: &[(String, Value)], color: Option<Level>) -> Vec<u8> {
    let mut out = String::with_capacity(kv.len() * 16);
    for (i, (key, value)) in kv.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(key);
        out.push('=');
        let rendered = render_value(value);
        if key == "level" {
            if let Some(level) = color {
                out.push_str(&colorize(&rendered, level_color(level)));
                continue;
            }
        }
        out.push_str(&rendered);
    }
    out.push('\n');
    out.into_bytes()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote_if_needed(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(render_scalar).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Object(_) => quote_if_needed(&value.to_string()),
        other => other.to_string(),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quote_if_needed(s: &str) -> String {
    if !needs_quoting(s) {
        return s.to_string();
    }
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    !s.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || c == '-'
            || c == '.'
            || c == '_'
            || c == '/'
            || c == '@'
            || c == '^'
            || c == '+'
    })
}
