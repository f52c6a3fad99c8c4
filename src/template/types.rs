//! In-memory template types — the validated, immutable view of a workflow
//! document. These are what `loader::load` produces and what the state
//! machine holds a read-only reference to (or embeds as a snapshot).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A context-reset directive attached to a step or sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextAction {
    Clear,
    Compact,
}

impl ContextAction {
    /// Parses the wire string for a context directive. Kept separate from
    /// `serde`'s derived enum so an invalid value is a `schema` error
    /// raised during `loader::validate`, not a `parse` error raised by
    /// serde mid-deserialization — the wire fields this is used on are
    /// plain `Option<String>`, not `Option<ContextAction>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clear" => Some(ContextAction::Clear),
            "compact" => Some(ContextAction::Compact),
            _ => None,
        }
    }
}

/// An agent persona referenced by step/sub-step instructions. The core does
/// not enforce `tools`/`cannot`; they exist for the executor to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub description: String,
    #[serde(default)]
    pub tools: HashSet<String>,
    #[serde(default)]
    pub cannot: HashSet<String>,
}

/// One unit inside a loop step's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStep {
    pub id: String,
    #[serde(default)]
    pub agent: Option<String>,
    pub instructions: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl SubStep {
    /// The validated `ContextAction`, if any. Panics on a sub-step that was
    /// never passed through `loader::validate` — see `ContextAction::parse`.
    pub fn context_action(&self) -> Option<ContextAction> {
        self.context
            .as_deref()
            .map(|s| ContextAction::parse(s).expect("unvalidated context directive"))
    }
}

/// The wire-shaped representation of a context directive string (`"clear"`,
/// `"compact"`) parsed into a typed value. Only ever called on templates
/// that already passed `loader::validate`.
fn parse_validated_context(raw: Option<&str>) -> Option<ContextAction> {
    raw.map(|s| ContextAction::parse(s).expect("unvalidated context directive in step"))
}

/// The tagged sum type distinguishing the three step kinds. `Loop` carries
/// the loop id even though it is always equal to the owning step's id — the
/// owning step is looked up by id elsewhere, but keeping the id alongside
/// the variant keeps `advance`'s match self-contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Action,
    Loop { loop_id: String },
    Ralph { n: u32 },
}

impl StepKind {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            StepKind::Action => "action",
            StepKind::Loop { .. } => "loop",
            StepKind::Ralph { .. } => "ralph",
        }
    }
}

/// A top-level step in a template's ordered sequence.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub instructions: Option<String>,
    pub context: Option<ContextAction>,
}

/// The immutable, validated definition of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub agents: HashMap<String, Agent>,
    #[serde(default)]
    pub loops: HashMap<String, Vec<SubStep>>,
    pub steps: Vec<RawStepRepr>,
}

/// The wire-shaped representation of a step, flattened for serde. `Template`
/// carries these directly (not the richer `Step`/`StepKind`) so that a
/// `workflow_definition` snapshot round-trips byte-for-byte through
/// serde_json/serde_yaml without a custom (de)serializer for `StepKind`.
/// `Template::steps()` below reconstructs `Step`/`StepKind` views on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStepRepr {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub n: Option<u32>,
}

impl Template {
    /// Reconstructs the typed `Step`/`StepKind` view of `steps`. Panics if
    /// called on a template that was not produced by `loader::load` (i.e.
    /// one whose `step_type`/`n` invariants were never validated) — callers
    /// within this crate only ever hold validated templates.
    pub fn typed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .map(|raw| {
                let kind = match raw.step_type.as_str() {
                    "action" => StepKind::Action,
                    "loop" => StepKind::Loop {
                        loop_id: raw.id.clone(),
                    },
                    "ralph" => StepKind::Ralph {
                        n: raw.n.expect("ralph step without n passed validation"),
                    },
                    other => panic!("unvalidated step type '{other}' in template"),
                };
                Step {
                    id: raw.id.clone(),
                    kind,
                    instructions: raw.instructions.clone(),
                    context: parse_validated_context(raw.context.as_deref()),
                }
            })
            .collect()
    }

    pub fn step(&self, id: &str) -> Option<Step> {
        self.typed_steps().into_iter().find(|s| s.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }
}
