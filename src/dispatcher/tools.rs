//! Routes the seven tool names to state-machine operations, wrapping every
//! mutating call with a persist step. Each handler returns the JSON
//! payload to wrap in a `Response`; errors propagate as `LaneError` and
//! are converted to an error response by the caller.
//!
//! A corrupted or hand-edited `workflow-state.json` can make the state
//! machine's own invariants (cursor/snapshot agreement, a task cursor
//! pointing at a sub-step no longer in its loop) fail to hold, which the
//! machine surfaces as a `panic!`/`.expect()` rather than a `LaneError` —
//! see spec.md §9's design note. `dispatch` is the dispatcher boundary
//! those panics are caught at, so one bad tool call never takes the whole
//! read loop down.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use serde_json::{json, Value};

use crate::error::LaneError;
use crate::state::Task;
use crate::template::ContextAction;

use super::context::DispatcherContext;
use super::intents::{self, SessionCreateArgs};

const MAX_SUMMARY_CHARS: usize = 100;

fn truncate_summary(input: &str) -> String {
    if input.chars().count() <= MAX_SUMMARY_CHARS {
        return input.to_string();
    }
    let truncated: String = input.chars().take(MAX_SUMMARY_CHARS - 1).collect();
    format!("{truncated}\u{2026}")
}

fn context_action_sentinel(action: ContextAction) -> Value {
    match action {
        ContextAction::Clear => json!({"sessionCleared": true}),
        ContextAction::Compact => json!({"contextAction": "/compact"}),
    }
}

/// Checks whether the current position has an un-executed context
/// directive; if so, marks it executed, persists, and returns the sentinel
/// payload the dispatcher must respond with *instead of* status.
fn take_pending_context_action(ctx: &mut DispatcherContext) -> Result<Option<Value>, LaneError> {
    let machine = ctx.machine_mut().expect("caller ensured a machine exists");
    let Some(action) = machine.get_context_action_if_needed() else {
        return Ok(None);
    };
    machine.mark_context_action_executed();
    ctx.persist()?;
    Ok(Some(context_action_sentinel(action)))
}

fn str_arg<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, LaneError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| LaneError::argument(format!("missing or non-string '{key}' argument")))
}

fn opt_str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}

/// Routes one tool call to its handler, catching any panic raised while
/// doing so (an invariant violation, not a `LaneError`-shaped failure) and
/// turning it into one instead — this is the dispatcher boundary spec.md §9
/// calls for; the caller keeps serving further requests either way.
pub async fn dispatch(ctx: &mut DispatcherContext, name: &str, arguments: Value) -> Result<Value, LaneError> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| dispatch_inner(ctx, name, arguments))) {
        Ok(result) => result,
        Err(payload) => Err(LaneError::io(format!(
            "tool '{name}' hit an invariant violation: {}",
            panic_message(&payload)
        ))),
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn dispatch_inner(ctx: &mut DispatcherContext, name: &str, arguments: Value) -> Result<Value, LaneError> {
    match name {
        "workflow_start" => workflow_start(ctx, arguments),
        "workflow_status" => workflow_status(ctx),
        "workflow_advance" => workflow_advance(ctx, arguments),
        "workflow_set_tasks" => workflow_set_tasks(ctx, arguments),
        "workflow_context" => workflow_context(ctx),
        "register_artefacts" => register_artefacts(ctx, arguments),
        "session_create" => session_create(ctx, arguments),
        "session_clear" => session_clear(ctx),
        other => Err(LaneError::argument(format!("unknown tool '{other}'"))),
    }
}

fn workflow_start(ctx: &mut DispatcherContext, arguments: Value) -> Result<Value, LaneError> {
    ctx.start_or_resume()?;

    if let Some(summary) = opt_str_arg(&arguments, "summary") {
        let truncated = truncate_summary(summary);
        ctx.machine_mut().expect("just started").set_summary(&truncated);
    }
    ctx.persist()?;

    if let Some(sentinel) = take_pending_context_action(ctx)? {
        return Ok(sentinel);
    }
    let status = ctx.machine_mut().expect("just started").get_status();
    Ok(serde_json::to_value(status)?)
}

fn workflow_status(ctx: &mut DispatcherContext) -> Result<Value, LaneError> {
    ctx.ensure_machine()?;
    if let Some(sentinel) = take_pending_context_action(ctx)? {
        return Ok(sentinel);
    }
    let status = ctx.ensure_machine()?.get_status();
    Ok(serde_json::to_value(status)?)
}

fn workflow_advance(ctx: &mut DispatcherContext, arguments: Value) -> Result<Value, LaneError> {
    let output = str_arg(&arguments, "output")?.to_string();
    let machine = ctx.ensure_machine()?;
    machine.advance(output)?;
    ctx.persist()?;

    if let Some(sentinel) = take_pending_context_action(ctx)? {
        return Ok(sentinel);
    }
    let status = ctx.ensure_machine()?.get_status();
    Ok(serde_json::to_value(status)?)
}

fn workflow_set_tasks(ctx: &mut DispatcherContext, arguments: Value) -> Result<Value, LaneError> {
    let loop_id = str_arg(&arguments, "loop_id")?.to_string();
    let raw_tasks = arguments
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| LaneError::argument("missing or non-array 'tasks' argument"))?;

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for (i, raw) in raw_tasks.iter().enumerate() {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LaneError::argument(format!("tasks[{i}] missing string 'id'")))?;
        let title = raw
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| LaneError::argument(format!("tasks[{i}] missing string 'title'")))?;
        let description = raw.get("description").and_then(Value::as_str).map(str::to_string);
        tasks.push(Task::pending(id, title, description));
    }
    let task_count = tasks.len();

    let machine = ctx.ensure_machine()?;
    machine.set_tasks(&loop_id, tasks)?;
    ctx.persist()?;

    Ok(json!({"success": true, "tasksSet": task_count}))
}

fn workflow_context(ctx: &mut DispatcherContext) -> Result<Value, LaneError> {
    let machine = ctx.ensure_machine()?;
    Ok(serde_json::to_value(machine.get_context())?)
}

fn register_artefacts(ctx: &mut DispatcherContext, arguments: Value) -> Result<Value, LaneError> {
    let raw_paths = arguments
        .get("paths")
        .and_then(Value::as_array)
        .ok_or_else(|| LaneError::argument("missing or non-array 'paths' argument"))?;
    let mut paths = Vec::with_capacity(raw_paths.len());
    for (i, raw) in raw_paths.iter().enumerate() {
        let s = raw
            .as_str()
            .ok_or_else(|| LaneError::argument(format!("paths[{i}] is not a string")))?;
        paths.push(s.to_string());
    }

    let worktree = ctx.worktree_root().to_path_buf();
    let machine = ctx.ensure_machine()?;
    let partition = machine.register_artefacts(&paths, &worktree);
    ctx.persist()?;
    Ok(serde_json::to_value(partition)?)
}

fn session_create(ctx: &mut DispatcherContext, arguments: Value) -> Result<Value, LaneError> {
    let name = str_arg(&arguments, "name")?;
    let source_branch = str_arg(&arguments, "sourceBranch")?;
    let prompt = opt_str_arg(&arguments, "prompt");
    let workflow = opt_str_arg(&arguments, "workflow");

    intents::session_create(
        &ctx.repo_root,
        SessionCreateArgs {
            name,
            source_branch,
            prompt,
            workflow,
        },
    )
}

fn session_clear(ctx: &mut DispatcherContext) -> Result<Value, LaneError> {
    let worktree = ctx.worktree_root().to_path_buf();
    intents::session_clear(&ctx.repo_root, &worktree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_template(dir: &Path, yaml: &str) -> std::path::PathBuf {
        let path = dir.join("flow.workflow.yml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    fn new_ctx(dir: &Path, yaml: &str) -> DispatcherContext {
        let workflow_path = write_template(dir, yaml);
        let worktree = dir.join("worktree");
        std::fs::create_dir_all(&worktree).unwrap();
        DispatcherContext::new(worktree, workflow_path, dir.to_path_buf())
    }

    #[tokio::test]
    async fn workflow_start_then_status_then_advance() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: plan\n    type: action\n    instructions: plan it\n  - id: ship\n    type: action\n    instructions: ship it\n",
        );

        let start = dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
        assert_eq!(start["step"], "plan");

        let status = dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap();
        assert_eq!(status["step"], "plan");

        let advanced = dispatch(&mut ctx, "workflow_advance", json!({"output": "planned"}))
            .await
            .unwrap();
        assert_eq!(advanced["step"], "ship");
    }

    #[tokio::test]
    async fn workflow_status_before_start_is_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: a\n    type: action\n",
        );
        let err = dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "not_started");
    }

    #[tokio::test]
    async fn workflow_start_with_context_clear_returns_sentinel_not_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: a\n    type: action\n    instructions: do it\n    context: clear\n",
        );
        let resp = dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
        assert_eq!(resp["sessionCleared"], true);
        assert!(resp.get("step").is_none());

        let status = dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap();
        assert_eq!(status["step"], "a");
    }

    #[tokio::test]
    async fn set_tasks_then_context_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nloops:\n  impl:\n    - id: code\n      instructions: write\nsteps:\n  - id: impl\n    type: loop\n",
        );
        dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
        let set = dispatch(
            &mut ctx,
            "workflow_set_tasks",
            json!({"loop_id": "impl", "tasks": [{"id": "A", "title": "A"}]}),
        )
        .await
        .unwrap();
        assert_eq!(set["tasksSet"], 1);

        dispatch(&mut ctx, "workflow_advance", json!({"output": "done"}))
            .await
            .unwrap();
        let context = dispatch(&mut ctx, "workflow_context", json!({})).await.unwrap();
        assert_eq!(context["impl.A.code"], "done");
    }

    #[tokio::test]
    async fn register_artefacts_reports_partition() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: a\n    type: action\n",
        );
        dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();

        let existing = ctx.worktree_root().join("out.txt");
        std::fs::write(&existing, "x").unwrap();

        let resp = dispatch(&mut ctx, "register_artefacts", json!({"paths": ["out.txt", "missing.txt"]}))
            .await
            .unwrap();
        assert_eq!(resp["registered"].as_array().unwrap().len(), 1);
        assert_eq!(resp["invalid"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_create_and_clear_write_intent_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: a\n    type: action\n",
        );
        // session_create/session_clear don't require an active machine.
        let resp = dispatch(
            &mut ctx,
            "session_create",
            json!({"name": "feature-x", "sourceBranch": "main"}),
        )
        .await
        .unwrap();
        assert_eq!(resp["success"], true);
        assert!(dir.path().join(".lanes").join("pending-sessions").exists());
    }

    #[tokio::test]
    async fn a_corrupted_state_file_yields_an_error_response_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = new_ctx(
            dir.path(),
            "name: x\ndescription: x\nsteps:\n  - id: a\n    type: action\n",
        );

        // Hand-corrupt the persisted state: a cursor pointing at a step the
        // template doesn't have, the kind of damage an out-of-process editor
        // or an older buggy writer could leave behind.
        std::fs::write(
            ctx.state_path(),
            r#"{"status":"running","step":"bogus","stepType":"action","tasks":{},"outputs":{},"artefacts":[],"contextActionExecuted":false}"#,
        )
        .unwrap();

        let err = dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "io");

        // The dispatcher is still usable afterwards; nothing took the
        // process down.
        let err2 = dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap_err();
        assert_eq!(err2.kind().as_str(), "io");
    }
}
