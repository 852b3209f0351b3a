//! In-place field merging for serialized block payloads
//!
//! A block payload is semi-structured markup carrying embedded JSON
//! fragments of the shape `{"name": "...", "data": {...}}`. Merging a new
//! value into a named field must leave every byte outside the targeted
//! fragment untouched, and must never half-rewrite a payload it cannot
//! fully understand.
//!
//! Three tiers, first success wins:
//! 1. structural: locate each embedded fragment with a balanced-brace scan,
//!    decode it, overwrite the field in the decoded tree, re-encode with
//!    HTML-sensitive escaping and splice the fragment's exact byte range;
//! 2. direct path pattern: a regex that finds the `"key": value` occurrence
//!    for the target path and replaces only the captured value;
//! 3. give up and return the payload unchanged.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::field_path::FieldRef;

/// Merge `value` into the field addressed by `field` inside `payload`.
///
/// `image_url` is the already-resolved public URL of an image asset; it is
/// `Some` only when the caller determined the field is image-named and the
/// new value is a numeric asset reference. When present, a companion
/// `<field>_url` entry is written next to the updated field.
///
/// Returns the payload byte-identical when the field cannot be located.
pub fn merge(payload: &str, field: &FieldRef, value: &Value, image_url: Option<&str>) -> String {
    // Tier 1: structural fragment decoding.
    let fragments = find_fragments(payload);
    if !fragments.is_empty() {
        let mut out = String::with_capacity(payload.len());
        let mut cursor = 0usize;
        let mut modified = false;

        for (start, end, mut tree) in fragments {
            if update_tree(&mut tree, field, value, image_url) {
                out.push_str(&payload[cursor..start]);
                out.push_str(&encode_block_json(&tree));
                cursor = end;
                modified = true;
                trace!(?field, "field updated via structural pass");
            }
        }

        // A decodable fragment set is authoritative even when nothing
        // matched; falling through to pattern replacement here could touch
        // bytes the structural pass deliberately left alone.
        if modified {
            out.push_str(&payload[cursor..]);
            return out;
        }
        debug!(?field, "no structural fragment contained the field");
        return payload.to_string();
    }

    // Tier 2: direct path pattern against the raw payload.
    if let Some(updated) = replace_by_path(payload, field, value, image_url) {
        return updated;
    }

    // Tier 3: nothing recognized the field.
    debug!(?field, "no merge strategy applied, payload unchanged");
    payload.to_string()
}

/// Locate and decode every self-contained `{"name": ..., "data": {...}}`
/// fragment. Returns `(start, end, decoded)` triples in payload order.
fn find_fragments(payload: &str) -> Vec<(usize, usize, Value)> {
    let bytes = payload.as_bytes();
    let mut found = Vec::new();
    let mut at = 0usize;

    while let Some(rel) = payload[at..].find(r#"{"name""#) {
        let start = at + rel;
        match balanced_object_end(bytes, start) {
            Some(end) => match serde_json::from_str::<Value>(&payload[start..end]) {
                Ok(tree) if tree.get("data").is_some_and(Value::is_object) => {
                    found.push((start, end, tree));
                    at = end;
                }
                _ => at = start + 1,
            },
            None => at = start + 1,
        }
    }
    found
}

/// Index one past the `}` closing the object that opens at `start`, or
/// `None` when braces never balance. String literals and escapes are
/// honored so braces inside values do not count.
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Overwrite the addressed field inside a decoded fragment.
///
/// Only pre-existing keys are overwritten; a missing group, an index past
/// the end of a repeater or an absent subfield key all leave the tree
/// untouched. Returns whether a write happened.
fn update_tree(tree: &mut Value, field: &FieldRef, value: &Value, image_url: Option<&str>) -> bool {
    let Some(data) = tree.get_mut("data").and_then(Value::as_object_mut) else {
        return false;
    };

    match field {
        FieldRef::Flat { field_id } => {
            if !data.contains_key(field_id) {
                return false;
            }
            data.insert(field_id.clone(), value.clone());
            if let Some(url) = image_url {
                data.insert(field.url_companion_key(), Value::String(url.to_string()));
            }
            true
        }
        FieldRef::Repeater {
            group,
            index,
            subfield,
        } => {
            let Some(entry) = data
                .get_mut(group)
                .and_then(Value::as_array_mut)
                .and_then(|items| items.get_mut(*index))
                .and_then(Value::as_object_mut)
            else {
                return false;
            };
            if !entry.contains_key(subfield) {
                return false;
            }
            entry.insert(subfield.clone(), value.clone());
            if let Some(url) = image_url {
                entry.insert(field.url_companion_key(), Value::String(url.to_string()));
            }
            true
        }
    }
}

/// Tier 2: regex location of the exact `"key": value` occurrence.
///
/// Returns `None` when the path does not match; returns the payload
/// unchanged (as `Some`) when the captured value is an array or object,
/// which this tier refuses to rewrite.
fn replace_by_path(
    payload: &str,
    field: &FieldRef,
    value: &Value,
    image_url: Option<&str>,
) -> Option<String> {
    let pattern = path_pattern(field);
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(payload)?;
    let captured = caps.get(1)?;

    if !captured.as_str().starts_with('"') {
        // Array/object value: structural knowledge is required, bail out.
        debug!(?field, "direct path hit a non-string value, skipping");
        return Some(payload.to_string());
    }

    let encoded = serde_json::to_string(value).unwrap_or_default();
    let mut updated = String::with_capacity(payload.len());
    updated.push_str(&payload[..captured.start()]);
    updated.push_str(&encoded);
    updated.push_str(&payload[captured.end()..]);
    trace!(?field, "field updated via direct path pass");

    // Best-effort companion URL rewrite; absence is not an error.
    if let Some(url) = image_url {
        if let Some(with_url) = replace_url_sibling(&updated, field, url) {
            return Some(with_url);
        }
    }
    Some(updated)
}

fn replace_url_sibling(payload: &str, field: &FieldRef, url: &str) -> Option<String> {
    let pattern = match field {
        FieldRef::Flat { field_id } => {
            format!(r#""{}_url"\s*:\s*(".*?")"#, regex::escape(field_id))
        }
        FieldRef::Repeater {
            group,
            index,
            subfield,
        } => format!(
            r#""{}"\s*:\s*\[\s*(?:[^\]]*,\s*){{{}}}\s*\{{\s*(?:[^}}]*,\s*)*"{}_url"\s*:\s*(".*?")"#,
            regex::escape(group),
            index,
            regex::escape(subfield),
        ),
    };
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(payload)?;
    let captured = caps.get(1)?;

    let mut updated = String::with_capacity(payload.len());
    updated.push_str(&payload[..captured.start()]);
    updated.push_str(&serde_json::to_string(url).unwrap_or_default());
    updated.push_str(&payload[captured.end()..]);
    Some(updated)
}

fn path_pattern(field: &FieldRef) -> String {
    match field {
        FieldRef::Flat { field_id } => {
            format!(r#""{}"\s*:\s*(["\[].*?["\]])"#, regex::escape(field_id))
        }
        FieldRef::Repeater {
            group,
            index,
            subfield,
        } => format!(
            r#""{}"\s*:\s*\[\s*(?:[^\]]*,\s*){{{}}}\s*\{{\s*(?:[^}}]*,\s*)*"{}"\s*:\s*(["\[].*?["\]])"#,
            regex::escape(group),
            index,
            regex::escape(subfield),
        ),
    }
}

/// Re-encode a fragment the way the host stores block attributes: compact,
/// key order preserved, HTML-sensitive characters (`" & < > '`) written as
/// `\u00xx` escapes, non-ASCII text left raw.
fn encode_block_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(map, out),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut String) {
    out.push('{');
    for (i, (key, item)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(item, out);
    }
    out.push('}');
}

static HEX: &[u8; 16] = b"0123456789abcdef";

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\u0022"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let code = c as u32;
                out.push_str("\\u00");
                out.push(HEX[(code >> 4) as usize] as char);
                out.push(HEX[(code & 0xf) as usize] as char);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
