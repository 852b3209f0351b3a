//! Text hygiene for row values
//!
//! Spreadsheet cells arrive as untrusted text. Titles and meta values are
//! reduced to plain text; body-bound values keep a safe HTML subset and
//! get their entities decoded back to raw characters so the merge engine
//! re-escapes them uniformly on output.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws pattern is valid"));

const DISALLOWED_ELEMENTS: [&str; 6] = ["script", "style", "iframe", "object", "embed", "form"];

// Elements removed together with their content, one pattern per tag name
// (the regex engine has no backreferences to pair open and close tags).
static DISALLOWED_BLOCK_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DISALLOWED_ELEMENTS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("disallowed block pattern is valid")
        })
        .collect()
});
// Stray unclosed disallowed openers/closers.
static DISALLOWED_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(script|style|iframe|object|embed|form)\b[^>]*>")
        .expect("disallowed tag pattern is valid")
});
// Inline event handlers and javascript: URL attributes.
static EVENT_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("event attr pattern is valid")
});
static JS_URL_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+(href|src)\s*=\s*("javascript:[^"]*"|'javascript:[^']*')"#)
        .expect("js url pattern is valid")
});

/// Reduce a cell to a single line of plain text: tags stripped, entities
/// decoded, control characters dropped, whitespace runs collapsed.
pub fn plain_text(input: &str) -> String {
    let stripped = TAG_RE.replace_all(input, "");
    let decoded = decode_entities(&stripped);
    // Controls become spaces so newline-separated words stay separated.
    let no_ctrl: String = decoded
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WS_RE.replace_all(no_ctrl.trim(), " ").to_string()
}

/// Keep a safe HTML subset and decode entities to raw characters.
///
/// Disallowed elements are removed with their content; event-handler and
/// `javascript:` attributes are dropped from whatever remains.
pub fn rich_text(input: &str) -> String {
    let mut without_blocks = input.to_string();
    for re in DISALLOWED_BLOCK_RES.iter() {
        without_blocks = re.replace_all(&without_blocks, "").into_owned();
    }
    let without_tags = DISALLOWED_TAG_RE.replace_all(&without_blocks, "");
    let without_events = EVENT_ATTR_RE.replace_all(&without_tags, "");
    let cleaned = JS_URL_ATTR_RE.replace_all(&without_events, "");
    decode_entities(&cleaned)
}

/// Encode `& < > " '` as HTML entities; used to build the alternate
/// title form for lookups against stores that kept entity-encoded titles.
pub fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Single-pass decode of named and numeric HTML entities. Unknown
/// entities are left verbatim; decoding never cascades (`&amp;lt;`
/// becomes `&lt;`, not `<`).
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';') {
            // Entities are short; anything else is a bare ampersand.
            Some(semi) if semi <= 10 => {
                let entity = &tail[1..semi];
                if let Some(decoded) = decode_one(entity) {
                    out.push(decoded);
                } else {
                    out.push_str(&tail[..=semi]);
                }
                rest = &tail[semi + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_one(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}
