//! ResponseParser - decode the extraction stage's JSON into ordered tasks
//!
//! The walk is a prefix scan: `Task 1`, `Task 2`, ... until the first missing
//! index. Tasks after a gap are dropped, so the result never has holes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::DecodeError;

/// Time value used when a task has no matching `Time required T{i}`
pub const NOT_AVAILABLE: &str = "N/A";

/// One decoded microtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTask {
    /// 1-based position in the breakdown
    pub index: usize,
    pub task: String,
    /// Free-text estimate such as "20 minutes", or [`NOT_AVAILABLE`]
    pub time: String,
}

impl ExtractedTask {
    pub fn has_time(&self) -> bool {
        self.time != NOT_AVAILABLE
    }
}

fn task_key(i: usize) -> String {
    format!("Task {}", i)
}

fn time_key(i: usize) -> String {
    format!("Time required T{}", i)
}

// Misspelling found in older extraction prompts
fn legacy_time_key(i: usize) -> String {
    format!("Time require T{}", i)
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')
}

/// Remove a surrounding markdown code fence, with or without a language tag
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // A tag is only a tag when something that cannot continue it follows
    let tag_len = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
    let after_tag = &rest[tag_len..];
    let body = match after_tag.chars().next() {
        None => after_tag,
        Some(c) if c.is_whitespace() || c == '{' || c == '[' => after_tag,
        Some(_) => rest,
    };

    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Decode extraction output into an ordered, gap-free task list
pub fn parse(raw: &str) -> Result<Vec<ExtractedTask>, DecodeError> {
    debug!(raw_len = raw.len(), "parse: called");
    let body = strip_fences(raw);
    let value: serde_json::Value = serde_json::from_str(body)?;
    let map = match value {
        serde_json::Value::Object(map) => map,
        other => {
            debug!(kind = kind(&other), "parse: not an object");
            return Err(DecodeError::NotAnObject(kind(&other)));
        }
    };

    let mut tasks = Vec::new();
    for i in 1.. {
        let Some(task) = map.get(&task_key(i)) else {
            break;
        };
        let time = map
            .get(&time_key(i))
            .or_else(|| map.get(&legacy_time_key(i)))
            .map(value_text)
            .unwrap_or_else(|| {
                warn!(index = i, "parse: task has no time estimate");
                NOT_AVAILABLE.to_string()
            });
        tasks.push(ExtractedTask {
            index: i,
            task: value_text(task),
            time,
        });
    }

    let task_keys = map.keys().filter(|k| k.starts_with("Task ")).count();
    if task_keys > tasks.len() {
        debug!(
            parsed = tasks.len(),
            task_keys, "parse: dropped tasks after a gap in numbering"
        );
    }
    debug!(count = tasks.len(), "parse: done");
    Ok(tasks)
}
