// ABOUTME: Integration tests for the mtadeploy CLI commands.
// ABOUTME: Validates --help output, init, digest, and deploy exit codes.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn mtadeploy_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mtadeploy"))
}

#[test]
fn help_shows_commands() {
    mtadeploy_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("digest"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("mtadeploy.yml");

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(config_path.exists(), "mtadeploy.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version_rule:"), "Config should have version_rule");
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("mtadeploy.yml");

    fs::write(&config_path, "existing: config").unwrap();

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn digest_prints_upper_case_hex() {
    let temp_dir = tempfile::tempdir().unwrap();
    let files = [("web/index.html", "<h1>shop</h1>"), ("api/main.py", "print()")];
    let archive = support::write_archive(temp_dir.path(), "app.mtar", &files);
    let expected = support::digest_of(&files, "web/");

    mtadeploy_cmd()
        .arg("digest")
        .arg(&archive)
        .arg("web/")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{expected}\n")));
}

#[test]
fn digest_of_missing_entry_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive = support::write_archive(temp_dir.path(), "app.mtar", &[("web/a", "a")]);

    mtadeploy_cmd()
        .arg("digest")
        .arg(&archive)
        .arg("db/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("db/"));
}

#[test]
fn deploy_without_config_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

fn write_project(dir: &std::path::Path, version: &str) {
    support::write_archive(dir, "app.mtar", &[("web/index.html", "<h1>shop</h1>")]);
    fs::write(
        dir.join("mtad.yaml"),
        format!("id: shop\nversion: {version}\nmodules:\n  - name: web\n    path: web/\n"),
    )
    .unwrap();
    fs::write(
        dir.join("mtadeploy.yml"),
        "space: dev\ndescriptor: mtad.yaml\narchive: app.mtar\npoll_interval: 10ms\n",
    )
    .unwrap();
}

#[test]
fn deploy_then_redeploy_same_version_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_project(temp_dir.path(), "1.0.0");

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .arg("deploy")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment complete!"));
    assert!(temp_dir.path().join("cluster.yml").exists());

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .args(["--quiet", "deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("same version already deployed"));
}

#[test]
fn json_mode_emits_json_lines() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_project(temp_dir.path(), "2.0.0");

    mtadeploy_cmd()
        .current_dir(temp_dir.path())
        .args(["--json", "deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"success""#));
}
