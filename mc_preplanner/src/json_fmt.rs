//! Custom JSON rendering for preplan output (§4.F "Output").
//!
//! Floats are emitted with at most two fractional digits and trailing
//! zeros trimmed; non-finite values render as the quoted strings `"NaN"`,
//! `"Infinity"`, `"-Infinity"` rather than failing to serialize (JSON has
//! no native representation for them).

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum Json {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Json>),
    /// Sorted-key object; callers build these pre-sorted to keep output
    /// canonical (matters for the cache's content hash, §4.F "Cache").
    Object(Vec<(String, Json)>),
}

pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "\"NaN\"".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 {
            "\"Infinity\"".to_string()
        } else {
            "\"-Infinity\"".to_string()
        };
    }

    let rounded = format!("{f:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn escape_str(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

pub fn render(value: &Json) -> String {
    let mut out = String::new();
    render_into(value, &mut out);
    out
}

fn render_into(value: &Json, out: &mut String) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Json::Float(f) => out.push_str(&format_float(*f)),
        Json::Str(s) => escape_str(s, out),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_into(item, out);
            }
            out.push(']');
        }
        Json::Object(entries) => {
            out.push('{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                escape_str(key, out);
                out.push(':');
                render_into(val, out);
            }
            out.push('}');
        }
    }
}
