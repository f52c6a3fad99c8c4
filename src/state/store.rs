//! Durable persistence for `State`: write-then-rename so a reader observing
//! the target path always sees either a complete old file or a complete new
//! one, never a torn write. Grounded on the same write-tmp/rename-over
//! pattern this codebase family uses for its own resumable run state
//! (coordinator event persistence writes whole-file via `fs::write` before
//! swapping in updated content) — here the swap is made atomic with a
//! same-directory `rename`, and the temp name carries the writer's pid so
//! concurrent writers never collide on one temp file.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::LaneError;

use super::types::State;

/// Persists `state` to `path` atomically. Safe to call from multiple
/// processes pointed at the same path; the store itself does not
/// coordinate writers — last-writer-wins is acceptable.
pub fn save(path: &Path, state: &State) -> Result<(), LaneError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(state)?;
    let pid = std::process::id();
    let tmp_name = format!(
        "{}.tmp.{pid}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("workflow-state.json")
    );
    let tmp_path = path.with_file_name(tmp_name);

    debug!(?tmp_path, "state::save: writing temp file");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        if let Err(e) = file.sync_all() {
            warn!(error = %e, "state::save: fsync failed, proceeding with rename anyway");
        }
    }

    fs::rename(&tmp_path, path)?;
    debug!(?path, "state::save: renamed into place");
    Ok(())
}

/// Loads `State` from `path`. Returns `Ok(None)` if the file does not
/// exist. A malformed-but-present file is a `parse` error, never silently
/// discarded.
pub fn load(path: &Path) -> Result<Option<State>, LaneError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let state: State = serde_json::from_str(&content)
        .map_err(|e| LaneError::parse(format!("{}: {e}", path.display())))?;
    Ok(Some(state))
}
