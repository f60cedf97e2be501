//! Response normalization - many upstream shapes in, one [`QueryResult`] out.
//!
//! Answer text is looked up in this order, first non-empty match wins:
//!
//! 1. `choices[0].message.content` (OpenAI-style)
//! 2. `message.content`
//! 3. `content`
//! 4. `response`
//! 5. `message` as a plain string
//! 6. `text`
//!
//! Failures stay distinguishable: an empty body or an answer field that is
//! present but empty is [`ClientError::EmptyResponse`]; a body that is not
//! JSON is [`ClientError::InvalidJsonResponse`]; JSON with none of the fields
//! is [`ClientError::UnrecognizedResponse`].

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};
use crate::utils::sanitize::truncate_for_log;

use super::types::{Citation, QueryResult};

pub const DEFAULT_CITATION_TITLE: &str = "Untitled source";

/// Where each answer candidate lives, in priority order.
const TEXT_CANDIDATES: &[(&str, &str)] = &[
    ("choices[0].message.content", "/choices/0/message/content"),
    ("message.content", "/message/content"),
    ("content", "/content"),
    ("response", "/response"),
    ("message", "/message"),
    ("text", "/text"),
];

const CITATION_FIELDS: &[&str] = &["attributions", "citations"];
const RETRIEVAL_FIELDS: &[&str] = &["retrieval_contents", "retrieval_info"];
const STRUCTURED_FIELDS: &[&str] = &["structured_output", "structured_data", "structured_response"];

const ID_KEYS: &[&str] = &["id", "content_id", "citation_id"];
const TITLE_KEYS: &[&str] = &["title", "doc_name", "document_title", "name"];
const URL_KEYS: &[&str] = &["url", "link", "source_url", "uri"];
const SNIPPET_KEYS: &[&str] = &["snippet", "content_text", "text", "content"];
const RELEVANCE_KEYS: &[&str] = &["relevance", "score", "relevance_score"];

enum TextLookup {
    Found(String),
    /// A recognized field was present but empty; holds the field name
    Empty(&'static str),
    Missing,
}

/// Normalize a raw (non-streaming) 2xx body.
pub fn normalize_body(raw: &str) -> Result<QueryResult> {
    if raw.trim().is_empty() {
        return Err(ClientError::EmptyResponse(
            "upstream returned an empty body".to_string(),
        ));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ClientError::InvalidJsonResponse(format!("{}: {}", e, truncate_for_log(raw))))?;
    normalize(&value)
}

/// Normalize a parsed JSON body.
pub fn normalize(value: &Value) -> Result<QueryResult> {
    let Some(obj) = value.as_object() else {
        return Err(ClientError::UnrecognizedResponse(format!(
            "expected a JSON object, got {}",
            json_type(value)
        )));
    };

    let text = match extract_text(value) {
        TextLookup::Found(text) => text,
        TextLookup::Empty(field) => {
            return Err(ClientError::EmptyResponse(format!(
                "field '{}' was empty",
                field
            )))
        }
        TextLookup::Missing => {
            let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            keys.sort_unstable();
            return Err(ClientError::UnrecognizedResponse(format!(
                "no recognized answer field (keys: [{}])",
                keys.join(", ")
            )));
        }
    };

    let mut result = QueryResult::text(text);
    fill_metadata(&mut result, obj);
    Ok(result)
}

/// Normalize a streamed (SSE) body by concatenating deltas.
///
/// Bodies without any `data:` line are treated as a regular JSON body.
pub fn normalize_stream_body(raw: &str) -> Result<QueryResult> {
    let data_lines: Vec<&str> = raw
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data_lines.is_empty() {
        return normalize_body(raw);
    }

    let mut text = String::new();
    let mut merged = Map::new();
    for payload in data_lines {
        if payload == "[DONE]" {
            break;
        }
        let Ok(event) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        let event = match event.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => event,
        };
        if let Some(delta) = extract_delta(&event) {
            text.push_str(&delta);
        }
        if let Some(obj) = event.as_object() {
            for (k, v) in obj {
                if !matches!(k.as_str(), "delta" | "choices" | "content" | "event" | "type") {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
    }

    if text.trim().is_empty() {
        return Err(ClientError::EmptyResponse(
            "stream produced no content".to_string(),
        ));
    }

    let mut result = QueryResult::text(text);
    fill_metadata(&mut result, &merged);
    Ok(result)
}

fn extract_delta(event: &Value) -> Option<String> {
    if let Some(s) = event.pointer("/choices/0/delta/content").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    match event.get("delta") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Object(d)) => {
            if let Some(s) = d.get("content").or_else(|| d.get("text")).and_then(Value::as_str) {
                return Some(s.to_string());
            }
        }
        _ => {}
    }
    event
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn extract_text(value: &Value) -> TextLookup {
    let mut first_empty: Option<&'static str> = None;
    for (name, pointer) in TEXT_CANDIDATES {
        match value.pointer(pointer) {
            None => {}
            Some(Value::Null) => {
                first_empty.get_or_insert(name);
            }
            Some(Value::String(s)) => {
                if s.trim().is_empty() {
                    first_empty.get_or_insert(name);
                } else {
                    return TextLookup::Found(s.clone());
                }
            }
            // Content-part arrays: [{"type":"text","text":"..."}]
            Some(Value::Array(parts)) => {
                let joined: String = parts
                    .iter()
                    .filter_map(|p| p.as_str().or_else(|| p.get("text").and_then(Value::as_str)))
                    .collect();
                if joined.trim().is_empty() {
                    first_empty.get_or_insert(name);
                } else {
                    return TextLookup::Found(joined);
                }
            }
            // `message` as an object is handled by the `message.content` candidate
            Some(_) => {}
        }
    }
    match first_empty {
        Some(name) => TextLookup::Empty(name),
        None => TextLookup::Missing,
    }
}

fn fill_metadata(result: &mut QueryResult, obj: &Map<String, Value>) {
    result.message_id = string_field(obj, &["message_id", "id"]);
    result.conversation_id = string_field(obj, &["conversation_id"]);
    result.session_id = string_field(obj, &["session_id"]);
    result.model = string_field(obj, &["model"]);
    result.usage = obj.get("usage").and_then(Value::as_object).cloned();
    result.structured_data = STRUCTURED_FIELDS
        .iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
        .cloned();
    result.created_at = obj
        .get("created_at")
        .or_else(|| obj.get("created"))
        .and_then(parse_timestamp);
    result.citations = extract_citations(obj);
}

/// Map attributions and retrieval contents into one citation list.
///
/// Retrieval entries with the id of an existing citation fill in its blanks
/// instead of being appended.
pub fn extract_citations(obj: &Map<String, Value>) -> Vec<Citation> {
    let mut citations: Vec<Citation> = first_array(obj, CITATION_FIELDS)
        .map(|items| items.iter().filter_map(citation_from).collect())
        .unwrap_or_default();

    if let Some(items) = first_array(obj, RETRIEVAL_FIELDS) {
        for candidate in items.iter().filter_map(citation_from) {
            match citations
                .iter_mut()
                .find(|c| !c.id.is_empty() && c.id == candidate.id)
            {
                Some(existing) => merge_citation(existing, candidate),
                None => citations.push(candidate),
            }
        }
    }

    for (i, c) in citations.iter_mut().enumerate() {
        if c.id.is_empty() {
            c.id = format!("citation-{}", i + 1);
        }
    }
    citations
}

fn first_array<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_array))
}

fn citation_from(item: &Value) -> Option<Citation> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(Citation {
            id: String::new(),
            title: DEFAULT_CITATION_TITLE.to_string(),
            url: String::new(),
            snippet: s.clone(),
            relevance: 0.0,
        }),
        Value::Object(map) => {
            let id = string_field(map, ID_KEYS).or_else(|| {
                map.get("content_ids")
                    .and_then(Value::as_array)
                    .and_then(|ids| ids.first())
                    .and_then(scalar_to_string)
            });
            Some(Citation {
                id: id.unwrap_or_default(),
                title: string_field(map, TITLE_KEYS)
                    .unwrap_or_else(|| DEFAULT_CITATION_TITLE.to_string()),
                url: string_field(map, URL_KEYS).unwrap_or_default(),
                snippet: string_field(map, SNIPPET_KEYS).unwrap_or_default(),
                relevance: RELEVANCE_KEYS
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_f64))
                    .map(clamp_relevance)
                    .unwrap_or(0.0),
            })
        }
        _ => None,
    }
}

fn merge_citation(existing: &mut Citation, other: Citation) {
    if existing.title == DEFAULT_CITATION_TITLE {
        existing.title = other.title;
    }
    if existing.url.is_empty() {
        existing.url = other.url;
    }
    if existing.snippet.is_empty() {
        existing.snippet = other.snippet;
    }
    if existing.relevance == 0.0 {
        existing.relevance = other.relevance;
    }
}

fn clamp_relevance(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(scalar_to_string))
        .filter(|s| !s.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
