//! Turning free-form model replies into a JSON document

use serde_json::{Map, Value, json};
use tracing::debug;

/// Group name used when a flat `features` list is lifted into groups
pub const LEGACY_GROUP_NAME: &str = "General";

const MAX_CANDIDATES: usize = 8;

/// What a model reply turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// `{"question": "..."}` and nothing else
    Clarification(String),
    Document(Value),
    /// No JSON object could be salvaged; carries the last parse error
    Unparseable(String),
}

/// Parse a reply with deterministic salvage
///
/// Tries the raw text, the contents of a markdown fence, then balanced
/// `{...}` spans found inside either, in that order.
pub fn parse_reply(text: &str) -> ParsedReply {
    debug!(len = text.len(), "parse_reply: called");
    let mut candidates: Vec<String> = Vec::new();
    push_unique(&mut candidates, text.trim());
    if let Some(inner) = strip_fences(text) {
        push_unique(&mut candidates, &inner);
    }

    let mut idx = 0;
    while idx < candidates.len() && candidates.len() < MAX_CANDIDATES {
        let current = candidates[idx].clone();
        for (start, ch) in current.char_indices() {
            if ch == '{'
                && let Some(span) = balanced_object(&current, start)
            {
                push_unique(&mut candidates, span);
                if candidates.len() >= MAX_CANDIDATES {
                    break;
                }
            }
        }
        idx += 1;
    }

    let mut last_err = String::from("empty reply");
    for candidate in &candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => {
                if let Some(question) = clarification_question(&value) {
                    return ParsedReply::Clarification(question);
                }
                return ParsedReply::Document(value);
            }
            Ok(other) => last_err = format!("expected a JSON object, found {}", type_name(&other)),
            Err(e) => last_err = e.to_string(),
        }
    }
    debug!(error = %last_err, "parse_reply: no JSON object found");
    ParsedReply::Unparseable(last_err)
}

/// The question text when the value is a clarification-only object
pub fn clarification_question(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("question").and_then(Value::as_str).map(|q| q.to_string())
}

/// Bring a document into canonical shape
///
/// Lifts a legacy flat `features` list into a single group and fills a
/// missing `request` from the caller. Returns true when anything changed.
pub fn normalize(value: &mut Value, request: Option<&str>) -> bool {
    let Some(obj) = value.as_object_mut() else {
        return false;
    };
    let mut changed = false;

    if !obj.contains_key("feature_groups")
        && let Some(features) = obj.remove("features")
    {
        debug!("normalize: lifting flat features list into a group");
        obj.insert(
            "feature_groups".to_string(),
            json!([{
                "name": LEGACY_GROUP_NAME,
                "description": "",
                "features": features,
            }]),
        );
        changed = true;
    }

    if let Some(request) = request
        && !obj.get("request").is_some_and(Value::is_string)
    {
        obj.insert("request".to_string(), Value::String(request.to_string()));
        changed = true;
    }

    changed
}

/// Wrap a request with an empty document skeleton
pub fn empty_document(request: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("request".into(), Value::String(request.to_string()));
    obj.insert("feature_groups".into(), Value::Array(Vec::new()));
    Value::Object(obj)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn push_unique(candidates: &mut Vec<String>, candidate: impl Into<String>) {
    let candidate = candidate.into();
    if !candidate.is_empty() && !candidates.contains(&candidate) {
        candidates.push(candidate);
    }
}

fn strip_fences(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}
