//! The durable position (`State`) and the query/response shapes built from
//! it. These are plain data — all behaviour lives in [`super::machine`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::template::{StepKind, Template};

/// Overall workflow lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Complete,
    Failed,
}

/// The wire spelling of a step's kind, carried alongside `step` so a reader
/// doesn't need the template to know what flavour of step it's looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTypeWire {
    Action,
    Loop,
    Ralph,
}

impl From<&StepKind> for StepTypeWire {
    fn from(kind: &StepKind) -> Self {
        match kind {
            StepKind::Action => StepTypeWire::Action,
            StepKind::Loop { .. } => StepTypeWire::Loop,
            StepKind::Ralph { .. } => StepTypeWire::Ralph,
        }
    }
}

/// An executor-supplied unit of work inside a loop step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
}

impl Task {
    /// Builds a task in its initial `pending` status, as supplied by the
    /// executor through `workflow_set_tasks` (which never specifies status).
    pub fn pending(id: impl Into<String>, title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description,
            status: TaskStatus::Pending,
        }
    }
}

/// Points at the task currently being iterated inside a loop step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCursor {
    pub id: String,
    pub index: usize,
}

/// The durable position of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub status: Status,
    pub step: String,
    pub step_type: StepTypeWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskCursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_total: Option<u32>,
    #[serde(default)]
    pub tasks: HashMap<String, Vec<Task>>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub artefacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub context_action_executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "workflow_definition")]
    pub workflow_definition: Option<Template>,
}

/// The partition returned by `register_artefacts`. Exactly one of the three
/// sets contains any given input path.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtefactPartition {
    pub registered: Vec<String>,
    pub duplicates: Vec<String>,
    pub invalid: Vec<String>,
}

/// What `get_status` reports: the current position plus the composed
/// instructions text the executor should follow next.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: Status,
    pub step: String,
    pub step_type: StepTypeWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_iteration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    pub instructions: String,
    pub artefacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
