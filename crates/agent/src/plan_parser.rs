//! Plan parser: turn raw model output into a `Plan`.
//!
//! Model output is unreliable: it may be wrapped in markdown fences, may use
//! any of three shapes, and may name actions that do not exist. Shapes are
//! tried in order:
//!
//! 1. `{ "plan": "...", "actions": [ ... ] }`
//! 2. `[ action, action, ... ]`
//! 3. `{ "action": "...", ... }`
//!
//! Anything else, and any action with an unknown tag or a missing path, is a
//! `PlanParseError` carrying the raw text.

use deo_core::action::{ActionKind, ActionSpec, Plan};
use deo_core::error::PlanParseError;
use serde::Deserialize;
use serde_json::Value;

/// An action tag as the model wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTag {
    Known(ActionKind),
    Unrecognized(String),
}

impl ActionTag {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match ActionKind::from_tag(trimmed) {
            Some(kind) => Self::Known(kind),
            None => Self::Unrecognized(trimmed.to_string()),
        }
    }
}

/// One action object before validation.
#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

/// Remove markdown code fences and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse model output into a plan.
pub fn parse_plan(raw: &str) -> Result<Plan, PlanParseError> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(PlanParseError::new("model returned no output", raw));
    }

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| PlanParseError::new(format!("invalid JSON: {e}"), raw))?;

    let (description, items) = match value {
        Value::Object(mut obj) if obj.contains_key("actions") => {
            let description = match obj.remove("plan") {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            };
            match obj.remove("actions") {
                Some(Value::Array(items)) => (description, items),
                _ => return Err(PlanParseError::new("'actions' must be an array", raw)),
            }
        }
        Value::Array(items) => (None, items),
        Value::Object(obj) if obj.contains_key("action") => (None, vec![Value::Object(obj)]),
        _ => {
            return Err(PlanParseError::new(
                "expected a plan object, an action array, or a single action object",
                raw,
            ));
        }
    };

    if items.is_empty() {
        return Err(PlanParseError::new("plan contains no actions", raw));
    }

    let actions = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| decode_action(index, item).map_err(|reason| PlanParseError::new(reason, raw)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Plan::new(description, actions))
}

fn decode_action(index: usize, item: Value) -> Result<ActionSpec, String> {
    let raw: RawAction =
        serde_json::from_value(item).map_err(|e| format!("action #{}: not an action object ({e})", index + 1))?;

    let tag = raw
        .action
        .as_deref()
        .map(ActionTag::parse)
        .ok_or_else(|| format!("action #{}: missing 'action' field", index + 1))?;

    let kind = match tag {
        ActionTag::Known(kind) => kind,
        ActionTag::Unrecognized(name) => {
            return Err(format!("action #{}: unrecognized action '{name}'", index + 1));
        }
    };

    let path = raw.path.map(|p| p.trim().to_string()).unwrap_or_default();
    if kind.requires_path() && path.is_empty() {
        return Err(format!("action #{}: {kind} requires a non-empty 'path'", index + 1));
    }
    let content = raw.content.map(content_text);

    Ok(match kind {
        ActionKind::CreateFolder => ActionSpec::CreateFolder { path },
        ActionKind::CreateFile => ActionSpec::CreateFile {
            path,
            content: content.unwrap_or_default(),
        },
        ActionKind::EditFile => ActionSpec::EditFile {
            path,
            content: content.unwrap_or_default(),
        },
        ActionKind::InsertCode => match content {
            Some(content) if !content.is_empty() => ActionSpec::InsertCode { content },
            _ => return Err(format!("action #{}: insert_code requires 'content'", index + 1)),
        },
        ActionKind::Done => ActionSpec::Done,
    })
}

/// Models sometimes emit JSON file content as a nested object.
fn content_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}
