//! Command preprocessing shared by the local shell and the HTTP handlers.
//!
//! Everything here is a pure function over the raw command string: the
//! `ls` color rule, the interactivity heuristic that routes commands to the
//! PTY registry, the `sed -i ` client artifact fix, and the
//! shell-metacharacter wrap rule for interactive session commands.

/// Shell metacharacters that require `sh -c` wrapping for PTY launches.
const SHELL_METACHARS: [char; 7] = ['>', '<', '|', ';', '*', '$', '&'];

/// Hint returned when a command that needs a controlling terminal reaches a
/// non-interactive execution path.
pub const INTERACTIVE_HINT_RUN: &str = "Interactive commands require an interactive session. \
     Use /interactive/start, then attach locally if desired.";

/// Shorter variant used by the background-start path.
pub const INTERACTIVE_HINT_START: &str =
    "Interactive commands require an interactive session. Use /interactive/start.";

/// Insert `--color=always` as the second token of a bare `ls` invocation.
///
/// Callers on both execution paths expect colored listings; plain `ls`
/// disables color when stdout is a pipe. The rule never fires when
/// `--color` already appears anywhere in the command, so it is idempotent.
#[must_use]
pub fn force_ls_color(cmd: &str) -> String {
    let mut parts: Vec<&str> = cmd.split_whitespace().collect();
    if parts.first() == Some(&"ls") && !cmd.contains("--color") {
        parts.insert(1, "--color=always");
        return parts.join(" ");
    }
    cmd.to_string()
}

/// Decide whether a command needs a controlling terminal.
///
/// Deliberately conservative: a command is interactive iff its first token
/// is `bash` or `sh` without a `-c` anywhere, or any of `-it`, `-i`, `-t`
/// appears as a distinct argument. `sed` is exempt regardless of flags
/// (`-i` there means in-place edit). Commands that fail shell-style
/// tokenization are treated as non-interactive; the shell will produce its
/// own diagnostics for them.
#[must_use]
pub fn is_interactive(cmd: &str) -> bool {
    let Ok(tokens) = shell_words::split(cmd) else {
        return false;
    };
    let Some(first) = tokens.first() else {
        return false;
    };
    if (first == "bash" || first == "sh") && !tokens.iter().any(|t| t == "-c") {
        return true;
    }
    if first == "sed" {
        return false;
    }
    tokens
        .iter()
        .any(|t| t == "-it" || t == "-i" || t == "-t")
}

/// Undo the `sed -i ` spacing some clients emit: GNU sed takes the in-place
/// suffix glued to the flag, so `sed -i '' file` style requests arrive
/// broken. Applies only when the command starts with `sed `.
#[must_use]
pub fn normalize(cmd: &str) -> String {
    if cmd.starts_with("sed ") {
        return cmd.replace("-i ", "-i");
    }
    cmd.to_string()
}

/// Whether a PTY launch command must be wrapped as `sh -c <cmd>`.
///
/// Commands already prefixed with `sh -c` or `bash -c` are left alone;
/// otherwise any shell metacharacter forces the wrap so redirection and
/// globbing behave as the caller intended.
#[must_use]
pub fn needs_shell(cmd: &str) -> bool {
    let trimmed = cmd.trim_start();
    if trimmed.starts_with("sh -c") || trimmed.starts_with("bash -c") {
        return false;
    }
    cmd.contains(SHELL_METACHARS)
}

/// Build the argv for an interactive session command.
///
/// Applies the wrap rule, falls back to shell-style word splitting, and
/// defaults to `bash` when nothing is left.
#[must_use]
pub fn interactive_argv(cmd: &str) -> Vec<String> {
    let argv = if needs_shell(cmd) {
        vec!["sh".to_string(), "-c".to_string(), cmd.to_string()]
    } else {
        shell_words::split(cmd).unwrap_or_default()
    };
    if argv.is_empty() {
        vec!["bash".to_string()]
    } else {
        argv
    }
}
