//! Unit tests for transient execution: spawning, stream capture, stdin
//! payloads, and the interactive refusal.

use sgpt_agent::process;

// ---------------------------------------------------------------------------
// Basic execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_echo() {
    let result = process::run("echo hello", "", false).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn test_run_nonzero_exit_code() {
    let result = process::run("false", "", false).await;
    assert_ne!(result.exit_code, 0);
}

#[tokio::test]
async fn test_run_exit_code_preserved() {
    let result = process::run("exit 42", "", false).await;
    assert_eq!(result.exit_code, 42);
}

#[tokio::test]
async fn test_run_empty_output() {
    let result = process::run("true", "", false).await;

    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

// ---------------------------------------------------------------------------
// Stream capture
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_captures_stderr_separately() {
    let result = process::run("echo out_line; echo err_line >&2", "", false).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "out_line\n");
    assert_eq!(result.stderr, "err_line\n");
}

#[tokio::test]
async fn test_run_preserves_stdout_order() {
    let result = process::run("seq 1 100", "", false).await;

    assert_eq!(result.exit_code, 0);
    let expected: String = (1..=100).map(|i| format!("{i}\n")).collect();
    assert_eq!(result.stdout, expected);
}

#[tokio::test]
async fn test_run_preserves_partial_final_line() {
    let result = process::run("printf no_newline", "", false).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "no_newline");
}

// ---------------------------------------------------------------------------
// Stdin payloads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_feeds_stdin() {
    let result = process::run("cat", "hello stdin", false).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello stdin");
}

#[tokio::test]
async fn test_run_closes_stdin_after_payload() {
    // wc only returns once its input hits EOF.
    let result = process::run("wc -c", "abcd", false).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.trim(), "4");
}

// ---------------------------------------------------------------------------
// Interactive refusal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_refuses_bare_shell() {
    let result = process::run("bash", "", false).await;

    assert_eq!(result.exit_code, -1);
    assert!(result.stdout.is_empty());
    assert!(
        result.stderr.contains("/interactive/start"),
        "stderr should point at the interactive endpoints, got: {}",
        result.stderr
    );
}

#[tokio::test]
async fn test_run_refuses_tty_flags() {
    let result = process::run("docker run -it ubuntu", "", false).await;
    assert_eq!(result.exit_code, -1);
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_command_not_found() {
    let result = process::run("nonexistent_command_xyz_12345", "", false).await;

    // The shell reports 127 for command not found.
    assert_eq!(result.exit_code, 127);
    assert!(!result.stderr.is_empty());
}
