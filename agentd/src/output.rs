//! Incremental output extraction and result parsing.
//!
//! Pure functions applied to every incoming chunk: URL and file-path tokens
//! are extracted against the task's already-seen sets, so re-running
//! extraction on already-seen output never grows them. Matches spanning
//! chunk boundaries may be missed; an accepted approximation.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // A scheme token up to the first whitespace, quote, or bracket.
    Regex::new(r#"[A-Za-z][A-Za-z0-9+.-]*://[^\s"'`<>()\[\]{}]+"#)
        .expect("url extraction regex must compile")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Absolute-path-like tokens ending in a .extension suffix.
    Regex::new(r"(?:/[A-Za-z0-9._\-]+)+\.[A-Za-z0-9._\-]+")
        .expect("path extraction regex must compile")
});

/// Extract URLs from `text` that are not already in `seen`.
///
/// Dedup is case-sensitive exact-string comparison; insertion order of the
/// returned vector follows first occurrence in `text`.
pub fn extract_urls(text: &str, seen: &[String]) -> Vec<String> {
    extract(&URL_RE, text, seen)
}

/// Extract absolute file paths from `text` that are not already in `seen`.
pub fn extract_paths(text: &str, seen: &[String]) -> Vec<String> {
    extract(&PATH_RE, text, seen)
}

fn extract(pattern: &Regex, text: &str, seen: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in pattern.find_iter(text) {
        let token = m.as_str();
        if !seen.iter().any(|s| s == token) && !found.iter().any(|s| s == token) {
            found.push(token.to_string());
        }
    }
    found
}

/// Structured result derived from the trailing stdout JSON block.
#[derive(Debug, Clone)]
pub struct ResultSummary {
    pub meta: Value,
    pub result_text: Option<String>,
    pub num_turns: Option<u64>,
}

/// Attempt to parse the full trimmed stdout as a JSON result object.
///
/// Only attempted when the trimmed content starts with `{`. Parse failures
/// are logged and yield `None`; the task still completes with whatever
/// partial data was gathered.
pub fn parse_result(stdout: &str) -> Option<ResultSummary> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let meta: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("result JSON parse error: {e}");
            return None;
        }
    };

    let num_turns = meta
        .get("num_turns")
        .or_else(|| meta.get("numTurns"))
        .and_then(Value::as_u64);
    if let Some(turns) = num_turns {
        tracing::info!(turns, "agent result turn count");
    }
    if let Some(ms) = meta
        .get("duration_ms")
        .or_else(|| meta.get("durationMs"))
        .and_then(Value::as_u64)
    {
        tracing::info!(duration_ms = ms, "agent-reported duration");
    }
    if let Some(cost) = meta.get("total_cost_usd").and_then(Value::as_f64) {
        tracing::info!(cost_usd = cost, "agent-reported cost");
    }

    let result_text = result_text_from(&meta);

    Some(ResultSummary {
        meta,
        result_text,
        num_turns,
    })
}

/// Derive a human-readable result string: a string `result` field, or the
/// concatenated text content across a `messages` array.
fn result_text_from(meta: &Value) -> Option<String> {
    if let Some(s) = meta.get("result").and_then(Value::as_str) {
        return Some(s.to_string());
    }

    let messages = meta.get("messages")?.as_array()?;
    let text = messages
        .iter()
        .map(message_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn message_text(message: &Value) -> String {
    if let Some(entries) = message.get("content").and_then(Value::as_array) {
        entries
            .iter()
            .map(|entry| entry.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
    } else if let Some(s) = message.get("content").and_then(Value::as_str) {
        s.to_string()
    } else if let Some(s) = message.get("text").and_then(Value::as_str) {
        s.to_string()
    } else {
        String::new()
    }
}
