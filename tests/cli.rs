//! Integration tests: run the crest binary and check exit codes and output.

use std::process::Command;

fn crest() -> Command {
    Command::new(env!("CARGO_BIN_EXE_crest"))
}

#[test]
fn test_help() {
    let out = crest().arg("--help").output().unwrap();
    assert!(out.status.success(), "crest --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("push"));
    assert!(stdout.contains("cache"));
}

#[test]
fn test_version() {
    let out = crest().arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("crest"));
}

#[test]
fn test_push_without_reference_fails() {
    let out = crest().arg("push").output().unwrap();
    assert!(!out.status.success(), "crest push with no reference should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no reference specified"));
}

#[test]
fn test_push_password_without_username_fails() {
    let out = crest()
        .args(["push", "registry.example.com/app:v1", "--password", "p"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("password given without username"));
}

#[test]
fn test_cache_list_empty_cache_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let out = crest()
        .env("CREST_CACHE_DIR", tmp.path())
        .args(["cache", "list"])
        .output()
        .unwrap();
    assert!(out.status.success(), "crest cache list should succeed");
    assert!(out.stdout.is_empty());
}

#[test]
fn test_cache_size_empty_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let out = crest()
        .env("CREST_CACHE_DIR", tmp.path())
        .args(["cache", "size"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("0 signatures, 0 bytes"));
}

#[test]
fn test_cache_clean_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let out = crest()
        .env("CREST_CACHE_DIR", tmp.path())
        .env("CREST_QUIET", "1")
        .args(["cache", "clean"])
        .output()
        .unwrap();
    assert!(out.status.success());
}
