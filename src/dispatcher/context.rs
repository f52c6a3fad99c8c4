//! The dispatcher's single mutable slot: a lazily-reconstructed
//! `StateMachine` plus the three startup paths every tool call needs.
//! Owned by the dispatcher loop and initialised lazily on first use,
//! in place of a module-level singleton.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LaneError;
use crate::state::{store, StateMachine};
use crate::template::{self, Template};

pub const STATE_FILE_NAME: &str = "workflow-state.json";

pub struct DispatcherContext {
    pub worktree: PathBuf,
    pub workflow_path: PathBuf,
    pub repo_root: PathBuf,
    template: Option<Template>,
    machine: Option<StateMachine>,
}

impl DispatcherContext {
    pub fn new(worktree: PathBuf, workflow_path: PathBuf, repo_root: PathBuf) -> Self {
        Self {
            worktree,
            workflow_path,
            repo_root,
            template: None,
            machine: None,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.worktree.join(STATE_FILE_NAME)
    }

    fn load_template(&mut self) -> Result<Template, LaneError> {
        if let Some(t) = &self.template {
            return Ok(t.clone());
        }
        let bytes = std::fs::read(&self.workflow_path)?;
        let template = template::load(&bytes, &self.workflow_path)?;
        self.template = Some(template.clone());
        Ok(template)
    }

    /// `workflow_start`'s reconstruction rule: resume from disk if a state
    /// file exists (embedding the snapshot if present), otherwise build and
    /// start a fresh machine from the template.
    pub fn start_or_resume(&mut self) -> Result<(), LaneError> {
        let template = self.load_template()?;
        let state_path = self.state_path();
        match store::load(&state_path)? {
            Some(state) => {
                debug!(path = ?state_path, "DispatcherContext::start_or_resume: resuming from disk");
                self.machine = Some(StateMachine::from_state(template, state));
            }
            None => {
                debug!("DispatcherContext::start_or_resume: starting fresh machine");
                let mut machine = StateMachine::new(template);
                machine.start();
                self.machine = Some(machine);
            }
        }
        Ok(())
    }

    /// Lazily loads the machine from disk if it is not already in memory.
    /// Used by every tool other than `workflow_start`, which are not
    /// permitted to implicitly create a fresh run.
    pub fn ensure_machine(&mut self) -> Result<&mut StateMachine, LaneError> {
        if self.machine.is_none() {
            let template = self.load_template()?;
            let state_path = self.state_path();
            match store::load(&state_path)? {
                Some(state) => self.machine = Some(StateMachine::from_state(template, state)),
                None => return Err(LaneError::not_started("no workflow has been started in this worktree")),
            }
        }
        Ok(self.machine.as_mut().expect("just ensured machine is Some"))
    }

    pub fn machine_mut(&mut self) -> Option<&mut StateMachine> {
        self.machine.as_mut()
    }

    pub fn persist(&self) -> Result<(), LaneError> {
        let machine = self.machine.as_ref().expect("persist called with no active machine");
        store::save(&self.state_path(), machine.state())
    }

    pub fn worktree_root(&self) -> &Path {
        &self.worktree
    }
}
