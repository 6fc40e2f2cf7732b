//! Best-effort extraction of the search trigger the assistant embeds in its
//! natural-language replies, e.g.
//! `Great! {"type":"ready_for_search","criteria":{"skills":["React"]}}`.
//!
//! Model output is free-form, so every stage is tolerant: a fragment that
//! cannot be parsed is still removed from the displayed text, and nothing
//! here panics on malformed input.

use crate::session::SearchCriteria;
use serde_json::Value;

pub const SEARCH_TRIGGER_TYPE: &str = "ready_for_search";

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Reply text with every trigger fragment removed, trimmed.
    pub text: String,
    /// Criteria from the first well-formed trigger, if any.
    pub extracted: Option<SearchCriteria>,
}

impl ParsedReply {
    pub fn is_search_trigger(&self) -> bool {
        self.extracted.is_some()
    }
}

#[must_use]
pub fn parse_assistant_reply(reply: &str) -> ParsedReply {
    let mut extracted = None;

    let text = strip_fenced_blocks(reply, &mut extracted);
    let text = strip_balanced_objects(&text, &mut extracted);
    let text = strip_dangling_openings(&text);
    let text = strip_stray_markers(&text);

    // Only text that lost fragments gets its whitespace reflowed.
    let text = if text == reply {
        reply.trim().to_string()
    } else {
        tidy_whitespace(&text)
    };
    ParsedReply { text, extracted }
}

/// Remove ```` ``` ```` blocks that mention the trigger; an unterminated
/// fence swallows the rest of the text.
fn strip_fenced_blocks(input: &str, extracted: &mut Option<SearchCriteria>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(open_rel) = input[cursor..].find(FENCE) {
        let open = cursor + open_rel;
        let body_start = open + FENCE.len();
        let (body_end, block_end) = match input[body_start..].find(FENCE) {
            Some(close_rel) => (body_start + close_rel, body_start + close_rel + FENCE.len()),
            None => (input.len(), input.len()),
        };
        let body = &input[body_start..body_end];

        if body.contains(SEARCH_TRIGGER_TYPE) {
            out.push_str(&input[cursor..open]);
            let json = body
                .trim_start_matches(|c: char| c.is_ascii_alphabetic())
                .trim();
            if extracted.is_none() {
                *extracted = criteria_from_json(json);
            }
        } else {
            out.push_str(&input[cursor..block_end]);
        }
        cursor = block_end;
    }

    out.push_str(&input[cursor..]);
    out
}

/// Byte index one past the `}` closing the object opened at `open`,
/// honouring JSON strings and escapes. `None` when the object never closes.
fn matching_brace(input: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in input[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove every balanced `{...}` that mentions the trigger. Braces after the
/// last mention are never scanned.
fn strip_balanced_objects(input: &str, extracted: &mut Option<SearchCriteria>) -> String {
    let Some(last_marker) = input.rfind(SEARCH_TRIGGER_TYPE) else {
        return input.to_string();
    };
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    let mut scan = 0;

    while let Some(open_rel) = input[scan..].find('{') {
        let open = scan + open_rel;
        if open > last_marker {
            break;
        }
        let Some(close) = matching_brace(input, open) else {
            scan = open + 1;
            continue;
        };

        let candidate = &input[open..close];
        if candidate.contains(SEARCH_TRIGGER_TYPE) {
            if extracted.is_none() {
                *extracted = criteria_from_json(candidate);
            }
            out.push_str(&input[cursor..open]);
            cursor = close;
        }
        scan = close;
    }

    out.push_str(&input[cursor..]);
    out
}

/// Whether `rest` (just after a `{`) opens `"type": "ready_for_search"`.
fn opens_trigger(rest: &str) -> bool {
    let rest = rest.trim_start();
    let Some(rest) = rest
        .strip_prefix("\"type\"")
        .or_else(|| rest.strip_prefix("'type'"))
        .or_else(|| rest.strip_prefix("type"))
    else {
        return false;
    };
    let Some(rest) = rest.trim_start().strip_prefix(':') else {
        return false;
    };
    let rest = rest.trim_start().trim_start_matches(['"', '\'']);
    !rest.is_empty()
        && (SEARCH_TRIGGER_TYPE.starts_with(rest) || rest.starts_with(SEARCH_TRIGGER_TYPE))
}

/// A trigger object that never closes (truncated output): drop everything
/// from its opening brace onwards.
fn strip_dangling_openings(input: &str) -> String {
    let mut scan = 0;
    while let Some(open_rel) = input[scan..].find('{') {
        let open = scan + open_rel;
        if opens_trigger(&input[open + 1..]) {
            return input[..open].to_string();
        }
        scan = open + 1;
    }
    input.to_string()
}

/// Last resort: any remaining mention of the trigger takes its enclosing
/// brace (or, without one, its line) with it.
fn strip_stray_markers(input: &str) -> String {
    let mut text = input.to_string();
    while let Some(pos) = text.find(SEARCH_TRIGGER_TYPE) {
        let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
        match text[line_start..pos].rfind('{') {
            Some(brace_rel) => text.truncate(line_start + brace_rel),
            None => {
                let line_end = text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1);
                text.replace_range(line_start..line_end, "");
            }
        }
    }
    text
}

fn tidy_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut blank_run = 0;
    for line in input.trim().lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

fn criteria_from_json(candidate: &str) -> Option<SearchCriteria> {
    let value: Value = match serde_json::from_str(candidate.trim()) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!("Discarding malformed search trigger JSON: {error}");
            return None;
        }
    };

    if value.get("type").and_then(Value::as_str) != Some(SEARCH_TRIGGER_TYPE) {
        return None;
    }

    let criteria = value.get("criteria").unwrap_or(&Value::Null);
    Some(SearchCriteria {
        skills: string_list(criteria.get("skills")),
        role_type: non_empty_str(
            criteria
                .get("roleType")
                .or_else(|| criteria.get("role_type")),
        ),
        field: non_empty_str(criteria.get("field")),
    })
}

/// Accepts `["a", "b"]` or `"a, b"`.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
