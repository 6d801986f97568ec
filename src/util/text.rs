use chrono::{DateTime, Utc};
use serde_json::Value;

/// Flatten a Jira description into plain text.
///
/// REST v2 returns a plain string; v3 and some custom fields return Atlassian
/// Document Format, where each block node becomes its own line.
pub fn description_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            let mut lines = Vec::new();
            collect_blocks(value, &mut lines);
            lines.join("\n")
        }
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn collect_blocks(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Array(nodes) => nodes.iter().for_each(|n| collect_blocks(n, lines)),
        Value::Object(obj) => {
            let Some(content) = obj.get("content") else {
                return;
            };
            let has_inline = content
                .as_array()
                .is_some_and(|nodes| nodes.iter().any(is_inline));
            if has_inline {
                let mut line = String::new();
                inline_text(content, &mut line);
                lines.push(line);
            } else {
                collect_blocks(content, lines);
            }
        }
        _ => {}
    }
}

fn is_inline(node: &Value) -> bool {
    matches!(
        node.get("type").and_then(|t| t.as_str()),
        Some("text" | "hardBreak" | "mention" | "emoji" | "inlineCard")
    )
}

fn inline_text(value: &Value, out: &mut String) {
    match value {
        Value::Array(nodes) => nodes.iter().for_each(|n| inline_text(n, out)),
        Value::Object(obj) => match obj.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(t) = obj.get("text").and_then(|t| t.as_str()) {
                    out.push_str(t);
                }
            }
            Some("hardBreak") => out.push('\n'),
            Some("mention") => {
                if let Some(t) = obj.get("attrs").and_then(|a| a.get("text")).and_then(|t| t.as_str()) {
                    out.push_str(t);
                }
            }
            _ => {
                if let Some(content) = obj.get("content") {
                    inline_text(content, out);
                }
            }
        },
        _ => {}
    }
}

/// Split the configured query block into individual JQL queries.
/// Blank lines and `//` comment lines are dropped.
pub fn parse_queries(block: &str) -> Vec<String> {
    block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("//"))
        .map(String::from)
        .collect()
}

/// Parse a Jira timestamp such as `2024-03-01T09:15:00.000+0000`.
pub fn parse_jira_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
