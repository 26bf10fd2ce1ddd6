//! Smoke tests for the `edgekit` binary.
//!
//! Verifies the binary starts, responds to CLI flags, and reports
//! configuration problems without needing a running MCP client or backend.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run `edgekit` isolated from the developer's own config and environment.
fn edgekit(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_edgekit"));
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("EDGEKIT_FUNCTIONS_DIR")
        .env_remove("EDGEKIT_BACKEND_URL")
        .env_remove("EDGEKIT_SERVICE_ROLE_KEY");
    cmd
}

// ── Help / basic CLI ──────────────────────────────────────────────────────────

#[test]
fn binary_responds_to_help() {
    let home = TempDir::new().unwrap();
    let output = edgekit(home.path()).arg("--help").output().expect("failed to execute edgekit");
    assert!(output.status.success(), "edgekit --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("edgekit"));
    assert!(stdout.contains("serve"), "help output should list serve subcommand");
    assert!(stdout.contains("check"), "help output should list check subcommand");
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    let home = TempDir::new().unwrap();
    let output = edgekit(home.path())
        .arg("nonexistent-subcommand")
        .output()
        .expect("failed to execute edgekit");
    assert!(!output.status.success(), "unknown subcommand should exit non-zero");
}

// ── Missing configuration ────────────────────────────────────────────────────

#[test]
fn serve_fails_cleanly_without_functions_dir() {
    let home = TempDir::new().unwrap();
    let output = edgekit(home.path())
        .arg("serve")
        .output()
        .expect("failed to execute edgekit serve");

    assert!(
        !output.status.success(),
        "edgekit serve should fail when no functions directory is configured"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("functions directory"),
        "error message should mention the functions directory: {stderr}"
    );
}

#[test]
fn serve_fails_when_functions_dir_does_not_exist() {
    let home = TempDir::new().unwrap();
    let output = edgekit(home.path())
        .arg("serve")
        .env("EDGEKIT_FUNCTIONS_DIR", home.path().join("missing"))
        .output()
        .expect("failed to execute edgekit serve");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing"), "{stderr}");
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let home = TempDir::new().unwrap();
    let output = edgekit(home.path())
        .args(["--config", "/nonexistent/edgekit.toml", "check"])
        .output()
        .expect("failed to execute edgekit check");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config"), "{stderr}");
}

// ── check ────────────────────────────────────────────────────────────────────

#[test]
fn check_reports_functions_and_secret_keys() {
    let home = TempDir::new().unwrap();
    let functions = home.path().join("functions");
    std::fs::create_dir_all(functions.join("hello")).unwrap();
    std::fs::write(functions.join("hello/index.ts"), "Deno.serve(() => new Response())").unwrap();
    std::fs::write(functions.join(".env"), "API_KEY=\"super secret\"\n").unwrap();

    let output = edgekit(home.path())
        .arg("check")
        .env("EDGEKIT_FUNCTIONS_DIR", &functions)
        .output()
        .expect("failed to execute edgekit check");

    assert!(
        output.status.success(),
        "check should succeed\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"));
    assert!(stdout.contains("API_KEY"));
    assert!(!stdout.contains("super secret"), "check must not print secret values");
}

#[test]
fn check_report_goes_to_stdout_not_stderr() {
    let home = TempDir::new().unwrap();
    let functions = home.path().join("functions");
    std::fs::create_dir(&functions).unwrap();

    let output = edgekit(home.path())
        .arg("check")
        .env("EDGEKIT_FUNCTIONS_DIR", &functions)
        .output()
        .expect("failed to execute edgekit check");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("functions dir:"), "{stdout}");
    assert!(!stderr.contains("functions dir:"), "{stderr}");
}

#[test]
fn check_reads_config_file_from_working_directory() {
    let home = TempDir::new().unwrap();
    let functions = home.path().join("fns");
    std::fs::create_dir(&functions).unwrap();
    std::fs::write(
        home.path().join("edgekit.toml"),
        format!(
            "[functions]\ndir = \"{}\"\n\n[runtime]\nrestart_enabled = false\n",
            functions.display()
        ),
    )
    .unwrap();

    let output = edgekit(home.path()).arg("check").output().expect("failed to execute edgekit check");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("disabled"));
}
