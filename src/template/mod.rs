//! The workflow template model and its loader.
//!
//! A `Template` is the immutable definition of a workflow: a name, a
//! description, an agent roster, a bank of loop bodies, and an ordered
//! sequence of top-level steps. `loader::load` is the only way to produce
//! one — it parses and validates a document in a single pass so that every
//! `Template` value held elsewhere in the crate is known-good.

pub mod loader;
pub mod types;

pub use loader::load;
pub use types::{Agent, ContextAction, Step, StepKind, SubStep, Template};
