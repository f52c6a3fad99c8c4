//! lanes - deterministic workflow orchestration core
//!
//! `lanes` drives a scripted sequence of work items (plain steps, loop
//! steps iterating executor-supplied tasks, and "ralph" steps repeated a
//! fixed number of times) to completion, persists its position atomically
//! so it survives process restarts and session clears, and exposes a small
//! tool surface to a collaborating executor agent over line-delimited
//! stdio JSON.
//!
//! # Modules
//!
//! - [`template`] - workflow document parsing and structural validation
//! - [`state`] - the state machine and its atomic on-disk persistence
//! - [`dispatcher`] - the stdio tool surface built on top of the state machine
//! - [`error`] - the error taxonomy shared by every component
//! - [`cli`] - command-line argument surface for the dispatcher entry point

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod state;
pub mod template;

pub use error::{ErrorKind, LaneError};
pub use state::{ArtefactPartition, State, StateMachine, StatusResponse, Status, StepTypeWire, Task, TaskCursor, TaskStatus};
pub use template::{Agent, ContextAction, Step, StepKind, SubStep, Template};
