//! CLI argument surface for the dispatcher entry point.

use std::path::PathBuf;

use clap::Parser;

const WORKFLOW_SUFFIX: &str = ".workflow.yml";

/// `lanes` — stdio tool dispatcher for a scripted workflow run.
#[derive(Parser, Debug)]
#[command(name = "lanes", about = "Deterministic workflow orchestration core", version)]
pub struct Cli {
    /// Absolute path to the worktree whose state this dispatcher owns.
    #[arg(long)]
    pub worktree: PathBuf,

    /// Absolute path to the workflow template, must end in `.workflow.yml`.
    #[arg(long)]
    pub workflow_path: PathBuf,

    /// Absolute path to the repository root (where `.lanes/` intent files live).
    #[arg(long)]
    pub repo_root: PathBuf,
}

impl Cli {
    /// Validates the three startup paths: all absolute, `workflow_path`
    /// ending in the workflow suffix. Returns a one-line diagnostic on the
    /// first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.worktree.is_absolute() {
            return Err(format!("--worktree must be an absolute path, got '{}'", self.worktree.display()));
        }
        if !self.repo_root.is_absolute() {
            return Err(format!("--repo-root must be an absolute path, got '{}'", self.repo_root.display()));
        }
        if !self.workflow_path.is_absolute() {
            return Err(format!(
                "--workflow-path must be an absolute path, got '{}'",
                self.workflow_path.display()
            ));
        }
        let path_str = self.workflow_path.to_string_lossy();
        if !path_str.ends_with(WORKFLOW_SUFFIX) {
            return Err(format!(
                "--workflow-path must end in '{WORKFLOW_SUFFIX}', got '{path_str}'"
            ));
        }
        Ok(())
    }
}
