//! Unit tests for command preprocessing: the `ls` color rule, the
//! interactivity heuristic, the `sed -i ` normalization, and the
//! shell-metacharacter wrap rule.

use sgpt_agent::command;

// ---------------------------------------------------------------------------
// ls color rule
// ---------------------------------------------------------------------------

#[test]
fn test_ls_gets_color_flag() {
    assert_eq!(command::force_ls_color("ls"), "ls --color=always");
}

#[test]
fn test_ls_color_inserted_as_second_token() {
    assert_eq!(
        command::force_ls_color("ls -la /tmp"),
        "ls --color=always -la /tmp"
    );
}

#[test]
fn test_ls_color_idempotent() {
    let once = command::force_ls_color("ls -la");
    assert_eq!(command::force_ls_color(&once), once);
}

#[test]
fn test_ls_color_never_fires_when_color_present() {
    assert_eq!(command::force_ls_color("ls --color=never"), "ls --color=never");
    assert_eq!(command::force_ls_color("ls --color"), "ls --color");
}

#[test]
fn test_ls_color_only_for_leading_ls() {
    assert_eq!(command::force_ls_color("echo ls"), "echo ls");
    assert_eq!(command::force_ls_color("lsof -i :80"), "lsof -i :80");
}

// ---------------------------------------------------------------------------
// Interactivity heuristic
// ---------------------------------------------------------------------------

#[test]
fn test_bare_shells_are_interactive() {
    assert!(command::is_interactive("bash"));
    assert!(command::is_interactive("sh"));
    assert!(command::is_interactive("bash --norc"));
}

#[test]
fn test_shell_with_dash_c_is_not_interactive() {
    assert!(!command::is_interactive("bash -c 'echo hi'"));
    assert!(!command::is_interactive("sh -c ls"));
}

#[test]
fn test_sed_is_never_interactive() {
    assert!(!command::is_interactive("sed -i s/a/b/ file.txt"));
    assert!(!command::is_interactive("sed -i.bak -e s/a/b/ file.txt"));
}

#[test]
fn test_tty_flags_are_interactive() {
    assert!(command::is_interactive("docker run -it ubuntu"));
    assert!(command::is_interactive("docker exec -i mycontainer sh -c ls"));
    assert!(command::is_interactive("ssh -t host"));
}

#[test]
fn test_glued_flags_are_not_interactive() {
    // Only the distinct tokens -it, -i, -t count.
    assert!(!command::is_interactive("tar -xvf archive.tar"));
    assert!(!command::is_interactive("grep -in foo file"));
}

#[test]
fn test_plain_commands_are_not_interactive() {
    assert!(!command::is_interactive("echo hello"));
    assert!(!command::is_interactive("git status"));
    assert!(!command::is_interactive(""));
}

#[test]
fn test_unparseable_command_is_not_interactive() {
    assert!(!command::is_interactive("echo 'unclosed"));
}

// ---------------------------------------------------------------------------
// sed -i normalization
// ---------------------------------------------------------------------------

#[test]
fn test_sed_in_place_spacing_fixed() {
    assert_eq!(
        command::normalize("sed -i s/a/b/ file.txt"),
        "sed -is/a/b/ file.txt"
    );
}

#[test]
fn test_normalize_leaves_other_commands_alone() {
    assert_eq!(command::normalize("rsync -i src dst"), "rsync -i src dst");
    assert_eq!(command::normalize("echo sed -i x"), "echo sed -i x");
}

// ---------------------------------------------------------------------------
// Shell wrap rule for interactive launches
// ---------------------------------------------------------------------------

#[test]
fn test_metacharacters_force_shell_wrap() {
    assert!(command::needs_shell("echo hi > /tmp/out"));
    assert!(command::needs_shell("cat foo | grep bar"));
    assert!(command::needs_shell("echo $HOME"));
    assert!(command::needs_shell("ls *.rs"));
}

#[test]
fn test_existing_shell_prefix_is_not_rewrapped() {
    assert!(!command::needs_shell("sh -c 'echo hi | grep h'"));
    assert!(!command::needs_shell("bash -c 'echo $HOME'"));
}

#[test]
fn test_plain_commands_need_no_shell() {
    assert!(!command::needs_shell("vim notes.txt"));
    assert!(!command::needs_shell("htop"));
}

#[test]
fn test_interactive_argv_wraps_metacharacters() {
    assert_eq!(
        command::interactive_argv("echo hi | tr a-z A-Z"),
        vec!["sh", "-c", "echo hi | tr a-z A-Z"]
    );
}

#[test]
fn test_interactive_argv_tokenizes_plain_commands() {
    assert_eq!(
        command::interactive_argv("vim 'my notes.txt'"),
        vec!["vim", "my notes.txt"]
    );
}

#[test]
fn test_interactive_argv_defaults_to_bash() {
    assert_eq!(command::interactive_argv(""), vec!["bash"]);
    assert_eq!(command::interactive_argv("   "), vec!["bash"]);
}
