//! Tests for PTY sessions: spawn, input/output round trips through a real
//! pseudo-terminal, drain semantics, EOF retention, and kill.

use sgpt_agent::session::SessionRegistry;
use std::time::Duration;

/// Accumulate drained output until it contains `needle`, with a deadline.
async fn drain_until_contains(registry: &SessionRegistry, id: &str, needle: &str) -> String {
    let mut accumulated = String::new();
    for _ in 0..100 {
        if let Some(chunk) = registry.drain_output(id).await {
            accumulated.push_str(&chunk);
            if accumulated.contains(needle) {
                return accumulated;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session '{id}' never produced {needle:?}; saw: {accumulated:?}");
}

/// Poll until the session's child is no longer alive.
async fn wait_until_dead(registry: &SessionRegistry, id: &str) {
    for _ in 0..100 {
        if registry.is_alive(id).await == Some(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session '{id}' did not die in time");
}

// ---------------------------------------------------------------------------
// Input/output round trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_input_reaches_child_and_output_comes_back() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("cat").await.unwrap();

    registry
        .write_input(&id, b"hello pty\n")
        .await
        .expect("session exists")
        .expect("write succeeds");

    let output = drain_until_contains(&registry, &id, "hello pty").await;
    assert!(output.contains("hello pty"));

    registry.kill(&id).await.unwrap();
}

#[tokio::test]
async fn test_child_gets_xterm_term() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("sh -c 'echo TERM=$TERM'").await.unwrap();

    let output = drain_until_contains(&registry, &id, "TERM=xterm-256color").await;
    assert!(output.contains("TERM=xterm-256color"));

    registry.kill(&id).await.unwrap();
}

#[tokio::test]
async fn test_metacharacters_run_under_shell() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("echo hi | tr a-z A-Z").await.unwrap();

    let output = drain_until_contains(&registry, &id, "HI").await;
    assert!(output.contains("HI"));

    registry.kill(&id).await.unwrap();
}

// ---------------------------------------------------------------------------
// Drain semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_consecutive_drains_yield_empty_second() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("cat").await.unwrap();

    registry.write_input(&id, b"once\n").await.unwrap().unwrap();
    drain_until_contains(&registry, &id, "once").await;

    // Let any trailing PTY bytes arrive, flush them, then verify the
    // buffer stays empty with no intervening child output.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = registry.drain_output(&id).await.unwrap();
    let second = registry.drain_output(&id).await.unwrap();
    assert_eq!(second, "");

    registry.kill(&id).await.unwrap();
}

// ---------------------------------------------------------------------------
// EOF and kill lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_child_exit_keeps_session_drainable() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("sh -c 'echo bye'").await.unwrap();

    wait_until_dead(&registry, &id).await;

    // The session survives EOF so the final buffer can still be drained.
    assert!(registry.contains(&id).await);
    let output = drain_until_contains(&registry, &id, "bye").await;
    assert!(output.contains("bye"));

    registry.kill(&id).await.unwrap();
    assert!(!registry.contains(&id).await);
}

#[tokio::test]
async fn test_kill_removes_session() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("cat").await.unwrap();

    assert_eq!(registry.kill(&id).await, Some(()));

    assert!(registry.drain_output(&id).await.is_none());
    assert!(registry.write_input(&id, b"x").await.is_none());
    assert!(registry.kill(&id).await.is_none());
}

// ---------------------------------------------------------------------------
// Listing and defaults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_reports_id_and_pid() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("cat").await.unwrap();

    let sessions = registry.list().await;
    let entry = sessions.iter().find(|s| s.id == id).expect("listed");
    assert!(entry.pid > 0);
    assert!(entry.alive);

    registry.kill(&id).await.unwrap();
    assert!(registry.list().await.iter().all(|s| s.id != id));
}

#[tokio::test]
async fn test_empty_command_defaults_to_bash() {
    let registry = SessionRegistry::new();
    let id = registry.spawn("").await.unwrap();

    registry
        .write_input(&id, b"echo marker42\n")
        .await
        .unwrap()
        .unwrap();
    let output = drain_until_contains(&registry, &id, "marker42").await;
    assert!(output.contains("marker42"));

    registry.kill(&id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_session_ids() {
    let registry = SessionRegistry::new();
    assert!(registry.drain_output("nope").await.is_none());
    assert!(registry.attach("nope").await.is_none());
    assert!(registry.is_alive("nope").await.is_none());
}
