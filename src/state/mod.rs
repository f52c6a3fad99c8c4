//! The workflow state machine and its durable persistence.
//!
//! [`machine::StateMachine`] holds the current position and applies every
//! legal transition; [`store`] is the only part of this module that touches
//! disk. Neither performs any networking or scheduling.

pub mod machine;
pub mod store;
pub mod types;

pub use machine::StateMachine;
pub use types::{ArtefactPartition, State, StatusResponse, Status, StepTypeWire, Task, TaskCursor, TaskStatus};
