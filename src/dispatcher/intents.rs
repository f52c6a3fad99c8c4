//! `session_create` / `session_clear`: pure side-effects that drop an
//! *intent file* for an external collaborator to act on. Neither touches
//! workflow state — session lifecycle lives outside this core's scope;
//! these two tools only sanitize input and write a JSON document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::LaneError;

const ALLOWED_EXTRA: [char; 4] = ['_', '-', '.', '/'];

fn sanitize(input: &str) -> Option<String> {
    let filtered: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ALLOWED_EXTRA.contains(c))
        .collect();
    if filtered.is_empty() { None } else { Some(filtered) }
}

fn write_intent(dir: &Path, file_stem: &str, doc: &Value) -> Result<PathBuf, LaneError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{file_stem}.json"));
    let body = serde_json::to_string_pretty(doc)?;
    std::fs::write(&path, body)?;
    Ok(path)
}

pub struct SessionCreateArgs<'a> {
    pub name: &'a str,
    pub source_branch: &'a str,
    pub prompt: Option<&'a str>,
    pub workflow: Option<&'a str>,
}

pub fn session_create(repo_root: &Path, args: SessionCreateArgs) -> Result<Value, LaneError> {
    let Some(name) = sanitize(args.name) else {
        return Ok(json!({"success": false, "error": format!("invalid session name: '{}'", args.name)}));
    };
    let Some(branch) = sanitize(args.source_branch) else {
        return Ok(json!({"success": false, "error": format!("invalid source branch: '{}'", args.source_branch)}));
    };

    let ms = Utc::now().timestamp_millis();
    let dir = repo_root.join(".lanes").join("pending-sessions");
    let stem = format!("{name}-{ms}");

    let mut doc = json!({
        "requestedAt": Utc::now().to_rfc3339(),
        "name": name,
        "sourceBranch": branch,
    });
    if let Some(prompt) = args.prompt {
        doc["prompt"] = json!(prompt);
    }
    if let Some(workflow) = args.workflow {
        doc["workflow"] = json!(workflow);
    }

    let config_path = write_intent(&dir, &stem, &doc)?;
    Ok(json!({"success": true, "configPath": config_path.to_string_lossy()}))
}

/// Extracts `<sessionName>` from a worktree path of the form
/// `.../.worktrees/<sessionName>`, rejecting anything that doesn't match
/// that shape or whose name is `.`/`..`.
fn session_name_from_worktree(worktree: &Path) -> Result<String, LaneError> {
    let as_str = worktree.to_string_lossy();
    let marker = ".worktrees/";
    let bad_structure = || {
        LaneError::argument(format!(
            "Invalid worktree path structure: {}. Expected path within .worktrees/ directory.",
            worktree.display()
        ))
    };
    let idx = as_str.rfind(marker).ok_or_else(bad_structure)?;
    let after = &as_str[idx + marker.len()..];
    let name = after.split('/').next().unwrap_or("");
    if name.is_empty() || name == "." || name == ".." {
        return Err(bad_structure());
    }
    Ok(name.to_string())
}

pub fn session_clear(repo_root: &Path, worktree: &Path) -> Result<Value, LaneError> {
    let name = session_name_from_worktree(worktree)?;

    let ms = Utc::now().timestamp_millis();
    let dir = repo_root.join(".lanes").join("clear-requests");
    let stem = format!("{name}-{ms}");

    let doc = json!({
        "requestedAt": Utc::now().to_rfc3339(),
        "sessionName": name,
    });

    write_intent(&dir, &stem, &doc)?;
    Ok(json!({"success": true, "message": format!("clear requested for session '{name}'")}))
}
