//! Field-by-field validation of untyped snippet input.
//!
//! Create input is checked in *full* mode: `title` and `code` are mandatory.
//! Update input is checked in *partial* mode: a field is only checked when it
//! is present. Every problem is collected so the caller sees them all at once.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::{NewSnippet, SnippetPatch};

impl NewSnippet {
    /// Parse and validate a create payload.
    pub fn from_json(input: &Value) -> Result<Self, ValidationError> {
        let obj = as_object(input)?;
        let mut problems = Vec::new();

        let title = required_string(obj, "title", "Title", &mut problems);
        let code = required_string(obj, "code", "Code", &mut problems);
        let language = optional_string(obj, "language", "Language", &mut problems).flatten();
        let framework = optional_string(obj, "framework", "Framework", &mut problems).flatten();
        let summary = optional_string(obj, "summary", "Summary", &mut problems).flatten();
        let tags = tags_field(obj, &mut problems);

        if !problems.is_empty() {
            return Err(ValidationError::new(problems));
        }

        let draft = NewSnippet {
            title: title.unwrap_or_default(),
            code: code.unwrap_or_default(),
            language,
            framework,
            tags,
            summary,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Check invariants on an already-typed create input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();
        check_title(&self.title, &mut problems);
        check_code(&self.code, &mut problems);
        finish(problems)
    }
}

impl SnippetPatch {
    /// Parse and validate an update payload.
    pub fn from_json(input: &Value) -> Result<Self, ValidationError> {
        let obj = as_object(input)?;
        let mut problems = Vec::new();

        let title = if obj.contains_key("title") {
            required_string(obj, "title", "Title", &mut problems)
        } else {
            None
        };
        let code = if obj.contains_key("code") {
            required_string(obj, "code", "Code", &mut problems)
        } else {
            None
        };
        let patch = SnippetPatch {
            title,
            code,
            language: optional_string(obj, "language", "Language", &mut problems),
            framework: optional_string(obj, "framework", "Framework", &mut problems),
            summary: optional_string(obj, "summary", "Summary", &mut problems),
            tags: tags_field(obj, &mut problems),
        };

        if !problems.is_empty() {
            return Err(ValidationError::new(problems));
        }
        patch.validate()?;
        Ok(patch)
    }

    /// Check invariants on the fields the patch sets.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();
        if let Some(title) = &self.title {
            check_title(title, &mut problems);
        }
        if let Some(code) = &self.code {
            check_code(code, &mut problems);
        }
        finish(problems)
    }
}

/// Reject blank owner identifiers before they reach a key or a query.
pub fn owner_id(owner_id: &str) -> Result<&str, ValidationError> {
    if owner_id.trim().is_empty() {
        return Err(ValidationError::single("Owner id must not be empty"));
    }
    Ok(owner_id)
}

fn as_object(input: &Value) -> Result<&Map<String, Value>, ValidationError> {
    input
        .as_object()
        .ok_or_else(|| ValidationError::single("Snippet data must be a JSON object"))
}

fn required_string(
    obj: &Map<String, Value>,
    key: &str,
    label: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => {
            problems.push(format!("{label} must be a string"));
            None
        }
    }
}

/// `None`: absent. `Some(None)`: explicit null. `Some(Some(_))`: a string.
fn optional_string(
    obj: &Map<String, Value>,
    key: &str,
    label: &str,
    problems: &mut Vec<String>,
) -> Option<Option<String>> {
    match obj.get(key) {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            problems.push(format!("{label} must be a string"));
            None
        }
    }
}

fn tags_field(obj: &Map<String, Value>, problems: &mut Vec<String>) -> Option<Vec<String>> {
    match obj.get("tags") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            let mut tags = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => tags.push(s.clone()),
                    _ => {
                        problems.push("Tags must be an array of strings".to_string());
                        return None;
                    }
                }
            }
            Some(tags)
        }
        Some(_) => {
            problems.push("Tags must be an array of strings".to_string());
            None
        }
    }
}

fn check_title(title: &str, problems: &mut Vec<String>) {
    if title.trim().is_empty() {
        problems.push("Title must not be empty".to_string());
    }
}

fn check_code(code: &str, problems: &mut Vec<String>) {
    if code.trim().is_empty() {
        problems.push("Code must not be empty".to_string());
    }
}

fn finish(problems: Vec<String>) -> Result<(), ValidationError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(problems))
    }
}
