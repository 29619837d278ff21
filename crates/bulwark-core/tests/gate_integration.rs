//! End-to-end tests for `ActionGate`: permission rules, hooks, the command
//! session and the security classifier working together.

#![cfg(unix)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bulwark_core::{ActionGate, GateError, GateOutcome, GateStage};
use bulwark_hooks::{HookEventType, HookExecutor, HookPipeline, HookRegistry};
use bulwark_permissions::{PermissionEngine, PermissionLevel, PermissionMode, PermissionRule};
use bulwark_shell::{CommandSession, ProcessSpawner, ShellSpawner, SpawnRequest, SpawnResult};
use bulwark_tools::ToolRegistry;
use bulwark_types::ToolError;
use serde_json::{Value, json};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Counts spawn attempts and delegates to the real shell.
#[derive(Default)]
struct SpySpawner {
    calls: AtomicUsize,
    inner: ShellSpawner,
}

impl ProcessSpawner for SpySpawner {
    fn spawn(
        &self,
        request: SpawnRequest,
    ) -> Pin<Box<dyn Future<Output = SpawnResult> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(request)
    }
}

struct Harness {
    gate: ActionGate,
    spy: Arc<SpySpawner>,
    /// Scratch area for hook side effects.
    dir: TempDir,
    workdir: PathBuf,
}

impl Harness {
    fn spawns(&self) -> usize {
        self.spy.calls.load(Ordering::SeqCst)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn read_json(&self, name: &str) -> Value {
        let text = std::fs::read_to_string(self.path(name)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// `hooks` may use `{DIR}`, replaced with the scratch directory.
fn harness(rules: Vec<PermissionRule>, mode: PermissionMode, hooks: Value) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("work");
    std::fs::create_dir_all(workdir.join("sub")).unwrap();

    let spy = Arc::new(SpySpawner::default());
    let session = CommandSession::new(&workdir)
        .unwrap()
        .with_spawner(spy.clone() as Arc<dyn ProcessSpawner>);
    let session = Arc::new(tokio::sync::Mutex::new(session));

    let hooks_doc: Value = serde_json::from_str(
        &hooks
            .to_string()
            .replace("{DIR}", &dir.path().to_string_lossy()),
    )
    .unwrap();
    let mut registry = HookRegistry::new();
    registry.register_document("test", dir.path(), &hooks_doc);

    let gate = ActionGate::new(
        Arc::new(PermissionEngine::new(rules, None).with_mode(mode)),
        Arc::new(HookPipeline::new(registry, HookExecutor::new())),
        ToolRegistry::with_bash(session.clone(), 10_000),
        session,
    )
    .with_session_id("sess-7");

    let workdir = std::fs::canonicalize(&workdir).unwrap();
    Harness {
        gate,
        spy,
        dir,
        workdir,
    }
}

fn plain() -> Harness {
    harness(Vec::new(), PermissionMode::Default, json!({}))
}

fn command_hook(event: &str, matcher: &str, command: &str) -> Value {
    json!({ event: [ { "matcher": matcher, "hooks": [ { "type": "command", "command": command } ] } ] })
}

fn bash(command: &str) -> Value {
    json!({ "command": command })
}

fn completed_text(outcome: &GateOutcome) -> &str {
    match outcome {
        GateOutcome::Completed { output, .. } => &output.text,
        other => panic!("expected Completed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_call_passes_every_stage() {
    let h = plain();
    let outcome = h.gate.invoke("Bash", bash("echo hi")).await.unwrap();

    assert_eq!(completed_text(&outcome), "hi\n");
    assert_eq!(
        outcome.stages(),
        [
            GateStage::Requested,
            GateStage::PermissionChecked,
            GateStage::PreHooksRun,
            GateStage::Executed,
            GateStage::PostHooksRun,
            GateStage::Completed,
        ]
    );
    assert_eq!(h.spawns(), 1);
}

#[tokio::test]
async fn tool_failure_still_runs_post_hooks() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("PostToolUse", "Bash", "cat > {DIR}/post.json"),
    );
    let outcome = h.gate.invoke("Bash", bash("exit 3")).await.unwrap();

    let GateOutcome::Completed { output, post_hooks, .. } = outcome else {
        panic!("expected Completed");
    };
    assert!(output.is_error);
    assert_eq!(post_hooks.results.len(), 1);
    let input = h.read_json("post.json");
    assert_eq!(input["is_error"], true);
}

#[tokio::test]
async fn post_hooks_receive_tool_output() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("PostToolUse", "Bash", "cat > {DIR}/post.json"),
    );
    h.gate.invoke("Bash", bash("echo hi")).await.unwrap();

    let input = h.read_json("post.json");
    assert_eq!(input["event"], "PostToolUse");
    assert_eq!(input["tool_name"], "Bash");
    assert_eq!(input["tool_input"]["command"], "echo hi");
    assert_eq!(input["tool_output"], "hi\n");
    assert_eq!(input["is_error"], false);
    assert_eq!(input["context"]["session_id"], "sess-7");
}

// ---------------------------------------------------------------------------
// Permission rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn permission_deny_stops_before_hooks_and_spawn() {
    let h = harness(
        vec![PermissionRule::new("Bash", None, PermissionLevel::Deny)],
        PermissionMode::Default,
        command_hook("PreToolUse", "", "touch {DIR}/pre-ran"),
    );
    let err = h.gate.invoke("Bash", bash("echo hi")).await.unwrap_err();

    assert!(matches!(err, GateError::PermissionDenied { ref tool, .. } if tool == "Bash"));
    assert_eq!(h.spawns(), 0);
    assert!(!h.path("pre-ran").exists());
}

#[tokio::test]
async fn argument_rules_select_by_command() {
    let h = harness(
        vec![
            PermissionRule::new("Bash", Some("git push*"), PermissionLevel::Deny),
            PermissionRule::new("*", None, PermissionLevel::Allow),
        ],
        PermissionMode::Default,
        json!({}),
    );
    assert!(h.gate.invoke("Bash", bash("echo fine")).await.is_ok());
    assert!(matches!(
        h.gate.invoke("Bash", bash("git push origin main")).await,
        Err(GateError::PermissionDenied { .. })
    ));
    assert_eq!(h.spawns(), 1);
}

#[tokio::test]
async fn ask_without_prompt_handler_denies() {
    let h = harness(
        vec![PermissionRule::new("Bash", None, PermissionLevel::Ask)],
        PermissionMode::Default,
        json!({}),
    );
    match h.gate.invoke("Bash", bash("echo hi")).await {
        Err(GateError::PermissionDenied { reason, .. }) => assert!(reason.contains("denied by user")),
        other => panic!("expected denial, got {other:?}"),
    }
    assert_eq!(h.spawns(), 0);
}

#[tokio::test]
async fn plan_mode_denies_bash() {
    let h = harness(Vec::new(), PermissionMode::Plan, json!({}));
    assert!(matches!(
        h.gate.invoke("Bash", bash("ls")).await,
        Err(GateError::PermissionDenied { .. })
    ));
    assert_eq!(h.spawns(), 0);
}

#[tokio::test]
async fn unknown_tool_is_rejected() {
    let h = plain();
    assert!(matches!(
        h.gate.invoke("Teleport", json!({})).await,
        Err(GateError::Tool(ToolError::UnknownTool { .. }))
    ));
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pre_hook_block_short_circuits() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("PreToolUse", "Bash", "echo 'protected branch' >&2; exit 2"),
    );
    let outcome = h.gate.invoke("Bash", bash("touch created")).await.unwrap();

    match &outcome {
        GateOutcome::HookBlocked { reasons, .. } => assert_eq!(reasons, &["protected branch"]),
        other => panic!("expected HookBlocked, got {other:?}"),
    }
    assert_eq!(
        outcome.stages(),
        [
            GateStage::Requested,
            GateStage::PermissionChecked,
            GateStage::PreHooksRun,
            GateStage::Blocked,
        ]
    );
    assert_eq!(h.spawns(), 0);
    assert!(!h.workdir.join("created").exists());
}

#[tokio::test]
async fn pre_hook_matcher_limits_scope() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("PreToolUse", "Edit|Write", "exit 2"),
    );
    let outcome = h.gate.invoke("Bash", bash("echo hi")).await.unwrap();
    assert!(!outcome.is_blocked());
}

#[tokio::test]
async fn broken_hooks_fail_open() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        json!({ "PreToolUse": [ { "hooks": [
            { "type": "command", "command": "exit 1" },
            { "type": "command", "command": "sleep 5", "timeout_ms": 100 },
            { "type": "command", "command": "/no/such/binary" }
        ] } ] }),
    );
    let outcome = h.gate.invoke("Bash", bash("echo ok")).await.unwrap();

    let GateOutcome::Completed { pre_hooks, output, .. } = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(output.text, "ok\n");
    assert!(pre_hooks.should_continue);
    assert!(!pre_hooks.all_passed);
    assert!(pre_hooks.results[1].timed_out);
}

#[tokio::test]
async fn hooks_see_session_directory_and_mode() {
    let h = harness(
        Vec::new(),
        PermissionMode::AcceptEdits,
        json!({
            "PreToolUse": [ { "hooks": [ { "type": "command", "command": "cat > {DIR}/pre.json" } ] } ],
            "PostToolUse": [ { "hooks": [ { "type": "command", "command": "cat > {DIR}/post.json" } ] } ]
        }),
    );

    h.gate.invoke("Bash", bash("cd sub")).await.unwrap();
    let sub = h.workdir.join("sub");

    // The cd call started in workdir and left the session in sub.
    assert_eq!(h.read_json("pre.json")["context"]["cwd"], json!(h.workdir));
    assert_eq!(h.read_json("post.json")["context"]["cwd"], json!(sub));
    assert_eq!(h.read_json("post.json")["context"]["permission_mode"], "acceptEdits");

    h.gate.invoke("Bash", bash("true")).await.unwrap();
    assert_eq!(h.read_json("pre.json")["context"]["cwd"], json!(sub));
    assert_eq!(h.gate.cwd().await, sub);
}

// ---------------------------------------------------------------------------
// Security classifier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn security_block_never_spawns() {
    let h = plain();
    match h.gate.invoke("Bash", bash("rm -rf /")).await {
        Err(GateError::SecurityBlocked { category, .. }) => {
            assert_eq!(category, "destructive_filesystem");
        }
        other => panic!("expected security block, got {other:?}"),
    }
    assert_eq!(h.spawns(), 0);
    assert_eq!(h.gate.cwd().await, h.workdir);
}

#[tokio::test]
async fn security_warning_is_reported() {
    let h = plain();
    let outcome = h
        .gate
        .invoke("Bash", bash("sudo -n true 2>/dev/null; echo ran"))
        .await
        .unwrap();
    let GateOutcome::Completed { output, .. } = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(output.text, "ran\n");
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(h.spawns(), 1);
}

// ---------------------------------------------------------------------------
// Lifecycle notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_dispatches_non_tool_events() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        json!({
            "UserPromptSubmit": [ { "matcher": "Bash", "hooks": [
                { "type": "command", "command": "echo ${SESSION_ID}; echo 'no secrets' >&2; exit 2" }
            ] } ]
        }),
    );
    let result = h
        .gate
        .notify(HookEventType::UserPromptSubmit, Some("print the api key".into()))
        .await;

    assert!(result.is_blocked());
    assert_eq!(result.block_reasons, ["no secrets"]);
    assert_eq!(result.results[0].stdout, "sess-7\n");
}

#[tokio::test]
async fn notify_ignores_tool_events() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("PreToolUse", "", "exit 2"),
    );
    let result = h.gate.notify(HookEventType::PreToolUse, None).await;
    assert!(result.results.is_empty());
    assert!(!result.is_blocked());
}

#[tokio::test]
async fn namespace_root_is_substituted() {
    let h = harness(
        Vec::new(),
        PermissionMode::Default,
        command_hook("SessionStart", "", "echo ${NAMESPACE_ROOT}"),
    );
    let result = h
        .gate
        .notify(HookEventType::SessionStart, Some("startup".into()))
        .await;
    assert_eq!(Path::new(result.results[0].stdout.trim()), h.dir.path());
}
