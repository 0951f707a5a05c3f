#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn dockhand() -> Command {
    let mut cmd = Command::cargo_bin("dockhand").unwrap();
    for key in [
        "DOCKHAND_CONFIG",
        "DOCKHAND_REPO",
        "DOCKHAND_SHA",
        "DOCKHAND_BRANCH",
        "DOCKHAND_REGISTRY",
        "DOCKHAND_PROJECT_DIR",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// CLIヘルプにサブコマンドが並ぶことを確認
#[test]
fn test_cli_help() {
    dockhand()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_cli_version() {
    dockhand()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dockhand"));
}

#[test]
fn test_build_help_lists_push_flags() {
    dockhand()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-push"))
        .stdout(predicate::str::contains("--registry"));
}

#[test]
fn test_build_requires_repo() {
    dockhand()
        .args(["build", "--sha", "abc", "--branch", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}

#[test]
fn test_inspect_prints_facts() {
    let dir = tempdir().unwrap();
    let dockerfile = dir.path().join("Dockerfile");
    fs::write(
        &dockerfile,
        "FROM node:20-alpine AS build\nRUN npm ci\nFROM nginx:1.27\nEXPOSE 80\n",
    )
    .unwrap();

    dockhand()
        .arg("inspect")
        .arg(&dockerfile)
        .assert()
        .success()
        .stdout(predicate::str::contains("node:20-alpine"))
        .stdout(predicate::str::contains("nginx:1.27"))
        .stdout(predicate::str::contains("80/tcp"));
}

#[test]
fn test_inspect_json() {
    let dir = tempdir().unwrap();
    let dockerfile = dir.path().join("Dockerfile");
    fs::write(&dockerfile, "FROM alpine\nEXPOSE 8080/udp\n").unwrap();

    dockhand()
        .args(["inspect", "--json"])
        .arg(&dockerfile)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"protocol\": \"udp\""));
}

#[test]
fn test_inspect_missing_file() {
    dockhand()
        .args(["inspect", "/nonexistent/Dockerfile"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dockerfile を読み込めません"));
}

/// 壊れた設定ファイルはビルド前にエラーになる
#[test]
fn test_build_with_broken_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("dockhand.yml");
    fs::write(&config, "docker: [unclosed\n").unwrap();

    dockhand()
        .env("DOCKHAND_CONFIG", &config)
        .current_dir(dir.path())
        .args(["build", "--repo", "acme/web", "--sha", "abc", "--branch", "main"])
        .assert()
        .failure();
}

/// プッシュ先が無いままプッシュを指定すると終了コード1で失敗する
#[test]
fn test_build_push_without_registry_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();

    dockhand()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_CACHE_HOME", dir.path().join("cache"))
        .args([
            "build", "--repo", "acme/web", "--sha", "abcdef123", "--branch", "main", "--push",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_fingerprint_lists_base_image_and_ports() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("docker")).unwrap();
    fs::write(
        dir.path().join("docker/Dockerfile"),
        "FROM node:20-alpine\nEXPOSE 3000\n",
    )
    .unwrap();

    dockhand()
        .args(["fingerprint", "--json", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"abbreviation\": \"dbi-node\""))
        .stdout(predicate::str::contains("\"version\": \"20-alpine\""))
        .stdout(predicate::str::contains("\"docker-path\""))
        .stdout(predicate::str::contains("\"3000\""));
}

#[test]
fn test_fingerprint_set_base_rewrites_from() {
    let dir = tempdir().unwrap();
    let dockerfile = dir.path().join("Dockerfile");
    fs::write(&dockerfile, "FROM node:18 AS build\nRUN npm ci\n").unwrap();

    dockhand()
        .args(["fingerprint", "--set-base", "node:20", "-C"])
        .arg(dir.path())
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&dockerfile).unwrap(),
        "FROM node:20 AS build\nRUN npm ci\n"
    );
}

#[test]
fn test_fingerprint_set_base_unknown_image() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.20\n").unwrap();

    dockhand()
        .args(["fingerprint", "--set-base", "node:20", "-C"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("node を FROM に持つ Dockerfile がありません"));
}
