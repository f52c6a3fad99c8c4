//! The state machine: all legal advancement for a workflow run.
//!
//! `StateMachine` owns a `State` and a `Template` (either the one it was
//! constructed with, or the snapshot embedded in a reloaded `State` — see
//! `from_state`). It performs no I/O; every method here is synchronous and
//! deterministic.

use std::path::Path;

use tracing::debug;

use crate::error::LaneError;
use crate::template::{Step, StepKind, Template};

use super::types::{ArtefactPartition, State, StatusResponse, Status, StepTypeWire, Task, TaskCursor, TaskStatus};

const RUNNING_REMINDER: &str = " When this step is complete, call `workflow_advance` with your output.";

pub struct StateMachine {
    template: Template,
    state: State,
}

impl StateMachine {
    /// Creates a fresh machine positioned at the template's first step,
    /// already in `running` status. `new` does the positioning; `start`
    /// (below) is the idempotent confirmation step the dispatcher calls,
    /// which is also where the `workflow_definition` snapshot gets taken.
    pub fn new(template: Template) -> Self {
        let first = template
            .typed_steps()
            .into_iter()
            .next()
            .expect("validated template has at least one step");
        let mut state = State {
            status: Status::Running,
            step: String::new(),
            step_type: StepTypeWire::Action,
            sub_step: None,
            task: None,
            ralph_iteration: None,
            ralph_total: None,
            tasks: Default::default(),
            outputs: Default::default(),
            artefacts: Vec::new(),
            summary: None,
            context_action_executed: false,
            workflow_definition: None,
        };
        let mut machine = Self {
            template,
            state: {
                // placeholder until position_state_at fills in the cursor
                state.step = first.id.clone();
                state
            },
        };
        machine.position_state_at(&first);
        machine
    }

    /// Rebinds an existing `State` to a machine. When the state carries a
    /// `workflow_definition` snapshot it takes precedence over `template` —
    /// this is what keeps a resumed run stable across template edits.
    pub fn from_state(template: Template, state: State) -> Self {
        let effective = state.workflow_definition.clone().unwrap_or(template);
        Self {
            template: effective,
            state,
        }
    }

    /// Idempotent: confirms `running` status and takes the template
    /// snapshot on first call. Safe to call on an already-started machine.
    pub fn start(&mut self) -> StatusResponse {
        debug!(step = %self.state.step, "StateMachine::start");
        self.state.status = Status::Running;
        self.ensure_snapshot();
        self.get_status()
    }

    fn ensure_snapshot(&mut self) {
        if self.state.workflow_definition.is_none() {
            self.state.workflow_definition = Some(self.template.clone());
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    fn current_step(&self) -> Step {
        self.template.step(&self.state.step).unwrap_or_else(|| {
            panic!(
                "state cursor references step '{}' not present in its template",
                self.state.step
            )
        })
    }

    fn ensure_not_terminal(&self) -> Result<(), LaneError> {
        match self.state.status {
            Status::Running => Ok(()),
            Status::Complete | Status::Failed => Err(LaneError::terminal(format!(
                "workflow is {:?}; no further advancement is possible",
                self.state.status
            ))),
        }
    }

    // ---- query operations --------------------------------------------

    pub fn get_status(&self) -> StatusResponse {
        let step = self.current_step();
        StatusResponse {
            status: self.state.status,
            step: self.state.step.clone(),
            step_type: StepTypeWire::from(&step.kind),
            sub_step: self.state.sub_step.clone(),
            task: self.state.task.clone(),
            ralph_iteration: self.state.ralph_iteration,
            ralph_total: self.state.ralph_total,
            progress: self.compute_progress(&step),
            instructions: self.compose_instructions(&step),
            artefacts: self.state.artefacts.clone(),
            summary: self.state.summary.clone(),
        }
    }

    pub fn get_context(&self) -> std::collections::HashMap<String, String> {
        self.state.outputs.clone()
    }

    /// Returns the context directive declared on the current sub-step (if
    /// any, taking precedence) or step, unless it was already executed.
    pub fn get_context_action_if_needed(&self) -> Option<crate::template::ContextAction> {
        if self.state.context_action_executed {
            return None;
        }
        let step = self.current_step();
        if let StepKind::Loop { loop_id } = &step.kind {
            if let Some(sub_id) = &self.state.sub_step {
                if let Some(action) = self
                    .template
                    .loops
                    .get(loop_id)
                    .and_then(|subs| subs.iter().find(|s| &s.id == sub_id))
                    .and_then(|sub| sub.context_action())
                {
                    return Some(action);
                }
            }
        }
        step.context
    }

    fn compute_progress(&self, step: &Step) -> Option<String> {
        match &step.kind {
            StepKind::Loop { .. } => self.state.task.as_ref().map(|t| format!("Task {}", t.index + 1)),
            StepKind::Ralph { .. } => match (self.state.ralph_iteration, self.state.ralph_total) {
                (Some(i), Some(t)) => Some(format!("Iteration {i}/{t}")),
                _ => None,
            },
            StepKind::Action => None,
        }
    }

    fn compose_instructions(&self, step: &Step) -> String {
        let base = match &step.kind {
            StepKind::Loop { loop_id } => self
                .state
                .sub_step
                .as_ref()
                .and_then(|sub_id| self.template.loops.get(loop_id)?.iter().find(|s| &s.id == sub_id))
                .map(|sub| sub.instructions.clone())
                .or_else(|| step.instructions.clone())
                .unwrap_or_default(),
            _ => step.instructions.clone().unwrap_or_default(),
        };
        if self.state.status == Status::Running {
            format!("{base}{RUNNING_REMINDER}")
        } else {
            base
        }
    }

    // ---- mutating operations -------------------------------------------

    pub fn set_summary(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.state.summary = Some(trimmed.to_string());
        }
    }

    pub fn set_tasks(&mut self, loop_id: &str, tasks: Vec<Task>) -> Result<(), LaneError> {
        let step = self
            .template
            .step(loop_id)
            .ok_or_else(|| LaneError::reference(format!("unknown step id '{loop_id}'")))?;
        if !matches!(step.kind, StepKind::Loop { .. }) {
            return Err(LaneError::reference(format!("step '{loop_id}' is not a loop step")));
        }

        let mut stored = tasks;
        if let Some(first) = stored.first_mut() {
            first.status = TaskStatus::InProgress;
        }
        for t in stored.iter_mut().skip(1) {
            t.status = TaskStatus::Pending;
        }
        self.state.tasks.insert(loop_id.to_string(), stored);
        self.state.context_action_executed = false;

        if self.state.step == loop_id {
            self.apply_loop_entry(loop_id);
        }
        Ok(())
    }

    pub fn register_artefacts(&mut self, paths: &[String], workspace_root: &Path) -> ArtefactPartition {
        let mut partition = ArtefactPartition::default();
        for raw in paths {
            if raw.trim().is_empty() {
                partition.invalid.push(raw.clone());
                continue;
            }
            let candidate = Path::new(raw);
            let resolved = if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                workspace_root.join(candidate)
            };
            if !resolved.exists() {
                partition.invalid.push(raw.clone());
                continue;
            }
            let resolved_str = resolved.to_string_lossy().to_string();
            if self.state.artefacts.contains(&resolved_str) {
                partition.duplicates.push(resolved_str);
            } else {
                self.state.artefacts.push(resolved_str.clone());
                partition.registered.push(resolved_str);
            }
        }
        partition
    }

    pub fn mark_context_action_executed(&mut self) {
        self.state.context_action_executed = true;
    }

    pub fn advance(&mut self, output: String) -> Result<StatusResponse, LaneError> {
        self.ensure_not_terminal()?;
        let step = self.current_step();
        let key = self.output_key(&step);
        debug!(step = %step.id, %key, "StateMachine::advance");
        self.state.outputs.insert(key, output);

        match &step.kind {
            StepKind::Action => self.advance_to_next_top_level_step(),
            StepKind::Ralph { n } => {
                let total = self.state.ralph_total.unwrap_or(*n);
                let iteration = self.state.ralph_iteration.unwrap_or(1);
                if iteration < total {
                    self.state.ralph_iteration = Some(iteration + 1);
                } else {
                    self.advance_to_next_top_level_step();
                }
            }
            StepKind::Loop { loop_id } => self.advance_loop(loop_id),
        }

        self.state.context_action_executed = false;
        Ok(self.get_status())
    }

    /// Detects whether `advance` completed the previous task's last
    /// sub-step, via a before/after snapshot of `state.task`. Exposed so
    /// the dispatcher can fire host-adjacent side effects; the machine
    /// itself makes no use of the result.
    pub fn task_completed_by(task_before: Option<&TaskCursor>, task_after: Option<&TaskCursor>, status: Status) -> bool {
        match task_before {
            None => false,
            Some(before) => task_after.map(|after| after.index != before.index).unwrap_or(true) || status == Status::Complete,
        }
    }

    fn output_key(&self, step: &Step) -> String {
        match &step.kind {
            StepKind::Action => step.id.clone(),
            StepKind::Ralph { .. } => format!("{}.{}", step.id, self.state.ralph_iteration.unwrap_or(1)),
            StepKind::Loop { .. } => {
                let task = self
                    .state
                    .task
                    .as_ref()
                    .expect("advance called on loop step with no active task");
                let sub = self
                    .state
                    .sub_step
                    .as_ref()
                    .expect("advance called on loop step with no active sub-step");
                format!("{}.{}.{}", step.id, task.id, sub)
            }
        }
    }

    fn advance_loop(&mut self, loop_id: &str) {
        let substeps = self
            .template
            .loops
            .get(loop_id)
            .expect("validated template guarantees a loops entry for every loop step")
            .clone();
        let cur_task = self
            .state
            .task
            .clone()
            .expect("advance called on loop step with no active task");
        let cur_sub = self
            .state
            .sub_step
            .clone()
            .expect("advance called on loop step with no active sub-step");
        let sub_idx = substeps
            .iter()
            .position(|s| s.id == cur_sub)
            .expect("active sub-step id not found in its loop body");

        if sub_idx + 1 < substeps.len() {
            self.state.sub_step = Some(substeps[sub_idx + 1].id.clone());
            return;
        }

        let tasks = self.state.tasks.get_mut(loop_id).expect("active task with no tasks entry");
        if let Some(t) = tasks.iter_mut().find(|t| t.id == cur_task.id) {
            t.status = TaskStatus::Done;
        }
        let next_index = cur_task.index + 1;
        if next_index < tasks.len() {
            tasks[next_index].status = TaskStatus::InProgress;
            let next_id = tasks[next_index].id.clone();
            self.state.task = Some(TaskCursor {
                id: next_id,
                index: next_index,
            });
            self.state.sub_step = Some(substeps[0].id.clone());
        } else {
            self.state.task = None;
            self.state.sub_step = None;
            self.advance_to_next_top_level_step();
        }
    }

    fn advance_to_next_top_level_step(&mut self) {
        let steps = self.template.typed_steps();
        let idx = steps
            .iter()
            .position(|s| s.id == self.state.step)
            .expect("state cursor references a step not in its template");
        if idx + 1 < steps.len() {
            let next = steps[idx + 1].clone();
            self.position_state_at(&next);
        } else {
            self.state.status = Status::Complete;
        }
    }

    fn position_state_at(&mut self, step: &Step) {
        self.state.step = step.id.clone();
        self.state.step_type = StepTypeWire::from(&step.kind);
        self.state.sub_step = None;
        self.state.task = None;
        self.state.ralph_iteration = None;
        self.state.ralph_total = None;
        match &step.kind {
            StepKind::Ralph { n } => {
                self.state.ralph_iteration = Some(1);
                self.state.ralph_total = Some(*n);
            }
            StepKind::Loop { loop_id } => self.apply_loop_entry(loop_id),
            StepKind::Action => {}
        }
    }

    /// Applies the cursor effects of entering a loop step: if tasks were
    /// already supplied for this loop (eagerly, before the cursor arrived),
    /// position on the first task's first sub-step, or complete the loop
    /// immediately if the list is empty. Otherwise leaves `task`/`subStep`
    /// unset, awaiting `workflow_set_tasks`.
    fn apply_loop_entry(&mut self, loop_id: &str) {
        let Some(tasks) = self.state.tasks.get(loop_id).cloned() else {
            return;
        };
        if tasks.is_empty() {
            self.advance_to_next_top_level_step();
            return;
        }
        let substeps = self
            .template
            .loops
            .get(loop_id)
            .expect("validated template guarantees a loops entry for every loop step");
        self.state.task = Some(TaskCursor {
            id: tasks[0].id.clone(),
            index: 0,
        });
        self.state.sub_step = Some(substeps[0].id.clone());
    }
}
