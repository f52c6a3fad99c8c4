//! End-to-end tests driving the dispatcher's tool surface directly (not
//! through its stdio framing), covering the six concrete scenarios the
//! state machine's contract is built around.

use lanes::dispatcher::tools;
use lanes::dispatcher::DispatcherContext;
use serde_json::json;
use tempfile::TempDir;

fn setup(yaml: &str) -> (TempDir, DispatcherContext) {
    let dir = TempDir::new().expect("tempdir");
    let workflow_path = dir.path().join("flow.workflow.yml");
    std::fs::write(&workflow_path, yaml).unwrap();
    let worktree = dir.path().join(".worktrees").join("sess1");
    std::fs::create_dir_all(&worktree).unwrap();
    let ctx = DispatcherContext::new(worktree, workflow_path, dir.path().to_path_buf());
    (dir, ctx)
}

#[tokio::test]
async fn two_step_linear_workflow_completes_and_records_outputs() {
    let (_dir, mut ctx) = setup(
        r#"
name: ship-it
description: linear
steps:
  - id: plan
    type: action
    instructions: write the plan
  - id: ship
    type: action
    instructions: ship it
"#,
    );

    let start = tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
    assert_eq!(start["step"], "plan");

    let after_plan = tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "planned"}))
        .await
        .unwrap();
    assert_eq!(after_plan["step"], "ship");

    let after_ship = tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "shipped"}))
        .await
        .unwrap();
    assert_eq!(after_ship["status"], "complete");

    let context = tools::dispatch(&mut ctx, "workflow_context", json!({})).await.unwrap();
    assert_eq!(context["plan"], "planned");
    assert_eq!(context["ship"], "shipped");
}

#[tokio::test]
async fn loop_with_two_tasks_two_substeps_completes() {
    let (_dir, mut ctx) = setup(
        r#"
name: impl-loop
description: loop
loops:
  impl:
    - id: code
      instructions: write code
    - id: test
      instructions: test it
steps:
  - id: impl
    type: loop
"#,
    );

    tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
    let set = tools::dispatch(
        &mut ctx,
        "workflow_set_tasks",
        json!({"loop_id": "impl", "tasks": [{"id": "A", "title": "A"}, {"id": "B", "title": "B"}]}),
    )
    .await
    .unwrap();
    assert_eq!(set["tasksSet"], 2);

    for output in ["cA", "tA", "cB", "tB"] {
        tools::dispatch(&mut ctx, "workflow_advance", json!({"output": output}))
            .await
            .unwrap();
    }

    let context = tools::dispatch(&mut ctx, "workflow_context", json!({})).await.unwrap();
    assert_eq!(context["impl.A.code"], "cA");
    assert_eq!(context["impl.A.test"], "tA");
    assert_eq!(context["impl.B.code"], "cB");
    assert_eq!(context["impl.B.test"], "tB");

    let status = tools::dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap();
    assert_eq!(status["status"], "complete");
}

#[tokio::test]
async fn ralph_step_iterates_three_times_then_completes() {
    let (_dir, mut ctx) = setup(
        r#"
name: polish
description: ralph
steps:
  - id: polish
    type: ralph
    n: 3
    instructions: polish it
"#,
    );

    let status = tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
    assert_eq!(status["ralphIteration"], 1);
    assert_eq!(status["ralphTotal"], 3);

    let s1 = tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "r1"})).await.unwrap();
    assert_eq!(s1["step"], "polish");
    assert_eq!(s1["ralphIteration"], 2);

    tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "r2"})).await.unwrap();
    let s3 = tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "r3"})).await.unwrap();
    assert_eq!(s3["status"], "complete");

    let context = tools::dispatch(&mut ctx, "workflow_context", json!({})).await.unwrap();
    assert_eq!(context["polish.1"], "r1");
    assert_eq!(context["polish.2"], "r2");
    assert_eq!(context["polish.3"], "r3");
}

#[tokio::test]
async fn context_clear_gating_suppresses_status_once() {
    let (_dir, mut ctx) = setup(
        r#"
name: gated
description: context gating
steps:
  - id: a
    type: action
    instructions: do a
    context: clear
  - id: b
    type: action
    instructions: do b
"#,
    );

    let start = tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
    assert_eq!(start["sessionCleared"], true);
    assert!(start.get("step").is_none());

    let status = tools::dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap();
    assert_eq!(status["step"], "a");
}

#[tokio::test]
async fn atomic_persistence_survives_a_killed_writer() {
    let (_dir, mut ctx) = setup(
        r#"
name: x
description: x
steps:
  - id: a
    type: action
    instructions: do a
  - id: b
    type: action
    instructions: do b
"#,
    );

    tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();
    tools::dispatch(&mut ctx, "workflow_advance", json!({"output": "done-a"}))
        .await
        .unwrap();

    let state_path = ctx.state_path();
    let s1_bytes = std::fs::read(&state_path).unwrap();

    // Simulate a writer that died mid-write: a stray temp sibling with
    // half-written content, target file untouched.
    let stray = state_path.with_file_name("workflow-state.json.tmp.99999");
    std::fs::write(&stray, b"{\"status\":\"runni").unwrap();

    let reloaded = std::fs::read(&state_path).unwrap();
    assert_eq!(reloaded, s1_bytes);
    assert!(stray.exists());
}

#[tokio::test]
async fn register_artefacts_partitions_paths_exactly() {
    let (_dir, mut ctx) = setup(
        r#"
name: x
description: x
steps:
  - id: a
    type: action
"#,
    );
    tools::dispatch(&mut ctx, "workflow_start", json!({})).await.unwrap();

    let existing = ctx.worktree_root().join("a.txt");
    std::fs::write(&existing, "x").unwrap();

    let resp = tools::dispatch(
        &mut ctx,
        "register_artefacts",
        json!({"paths": ["a.txt", "a.txt", "missing.txt"]}),
    )
    .await
    .unwrap();

    assert_eq!(resp["registered"].as_array().unwrap().len(), 1);
    assert_eq!(resp["duplicates"].as_array().unwrap().len(), 1);
    assert_eq!(resp["invalid"], json!(["missing.txt"]));
}

#[tokio::test]
async fn workflow_status_before_start_is_not_started() {
    let (_dir, mut ctx) = setup(
        r#"
name: x
description: x
steps:
  - id: a
    type: action
"#,
    );
    let err = tools::dispatch(&mut ctx, "workflow_status", json!({})).await.unwrap_err();
    assert_eq!(err.kind().as_str(), "not_started");
}

#[tokio::test]
async fn session_create_and_clear_write_intent_files_under_repo_root() {
    let (_dir, mut ctx) = setup(
        r#"
name: x
description: x
steps:
  - id: a
    type: action
"#,
    );

    let create = tools::dispatch(
        &mut ctx,
        "session_create",
        json!({"name": "feature-x", "sourceBranch": "main", "prompt": "do it"}),
    )
    .await
    .unwrap();
    assert_eq!(create["success"], true);

    let clear = tools::dispatch(&mut ctx, "session_clear", json!({})).await.unwrap();
    assert_eq!(clear["success"], true);
}
