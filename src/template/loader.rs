//! Parses and validates a workflow template document.
//!
//! The loader is pure: it takes bytes plus a path (used only to enrich
//! error messages) and returns either a validated `Template` or a
//! `LaneError` with `kind` in `{parse, schema}`. It performs no I/O.

use std::path::Path;

use crate::error::LaneError;
use crate::template::types::{ContextAction, Template};

/// Parses `bytes` as a YAML workflow document and validates it against the
/// seven structural rules. `path` is used only for error-message context.
pub fn load(bytes: &[u8], path: &Path) -> Result<Template, LaneError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LaneError::parse(format!("{}: not valid UTF-8: {e}", path.display())))?;

    let template: Template = serde_yaml::from_str(text)
        .map_err(|e| LaneError::parse(format!("{}: {e}", path.display())))?;

    validate(&template)?;
    Ok(template)
}

fn validate(template: &Template) -> Result<(), LaneError> {
    // Rule 1: name and description are non-empty.
    if template.name.trim().is_empty() {
        return Err(LaneError::schema("template 'name' must not be empty"));
    }
    if template.description.trim().is_empty() {
        return Err(LaneError::schema("template 'description' must not be empty"));
    }

    // Rule 2: steps is non-empty; each step has a unique id.
    if template.steps.is_empty() {
        return Err(LaneError::schema("template must declare at least one step"));
    }
    let mut seen_step_ids = std::collections::HashSet::new();
    for step in &template.steps {
        if !seen_step_ids.insert(step.id.as_str()) {
            return Err(LaneError::schema(format!("duplicate step id '{}'", step.id)));
        }
    }

    for step in &template.steps {
        // Rule 3: type is one of the three enumerated kinds.
        match step.step_type.as_str() {
            "action" => {}
            "loop" => {
                // Rule 4: every loop step has a corresponding non-empty
                // loops entry; sub-step ids within it are unique.
                let sub_steps = template.loops.get(&step.id).ok_or_else(|| {
                    LaneError::schema(format!("loop step '{}' has no entry in 'loops'", step.id))
                })?;
                if sub_steps.is_empty() {
                    return Err(LaneError::schema(format!(
                        "loop step '{}' has an empty sub-step list",
                        step.id
                    )));
                }
                let mut seen_sub_ids = std::collections::HashSet::new();
                for sub in sub_steps {
                    if !seen_sub_ids.insert(sub.id.as_str()) {
                        return Err(LaneError::schema(format!(
                            "duplicate sub-step id '{}' in loop '{}'",
                            sub.id, step.id
                        )));
                    }
                    // Rule 7: agents referenced by sub-steps must exist.
                    if let Some(agent) = &sub.agent {
                        if !template.agents.contains_key(agent) {
                            return Err(LaneError::schema(format!(
                                "sub-step '{}' references unknown agent '{}'",
                                sub.id, agent
                            )));
                        }
                    }
                    // Rule 6: context, where present, is clear or compact.
                    validate_context(sub.context.as_deref())?;
                }
            }
            "ralph" => {
                // Rule 5: every ralph step has integer n >= 1.
                match step.n {
                    Some(n) if n >= 1 => {}
                    Some(n) => {
                        return Err(LaneError::schema(format!(
                            "ralph step '{}' has n={n}, must be >= 1",
                            step.id
                        )));
                    }
                    None => {
                        return Err(LaneError::schema(format!(
                            "ralph step '{}' is missing required field 'n'",
                            step.id
                        )));
                    }
                }
            }
            other => {
                return Err(LaneError::schema(format!(
                    "step '{}' has unknown type '{other}'",
                    step.id
                )));
            }
        }

        // Rule 6: context, where present, is one of {clear, compact}.
        validate_context(step.context.as_deref())?;
    }

    Ok(())
}

fn validate_context(context: Option<&str>) -> Result<(), LaneError> {
    if let Some(s) = context {
        if ContextAction::parse(s).is_none() {
            return Err(LaneError::schema(format!(
                "invalid context directive '{s}', expected 'clear' or 'compact'"
            )));
        }
    }
    Ok(())
}
