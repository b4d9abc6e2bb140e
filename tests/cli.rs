//! End-to-end CLI flows against a temporary CERTGATE_HOME.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn certgate(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("certgate").unwrap();
    cmd.env("CERTGATE_HOME", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_succeeds() {
    Command::cargo_bin("certgate")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("fetch"));
}

#[test]
fn init_creates_store_and_settings() {
    let dir = common::temp_home();
    certgate(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Certgate initialised"));
    assert!(dir.path().join("trust_store.p12").is_file());
    assert!(dir.path().join("settings.toml").is_file());

    // Second run is a no-op.
    certgate(dir.path()).arg("init").assert().success();
}

#[test]
fn init_with_missing_seed_fails() {
    let dir = common::temp_home();
    certgate(dir.path())
        .args(["init", "--seed"])
        .arg(dir.path().join("nope.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
    assert!(!dir.path().join("trust_store.p12").exists());
}

#[test]
fn add_check_list_flow() {
    let dir = common::temp_home();
    let c = common::self_signed("panel.test", &["panel.test"]);
    let pem_path = dir.path().join("panel.pem");
    std::fs::write(&pem_path, &c.pem).unwrap();
    let der_path = dir.path().join("panel.der");
    std::fs::write(&der_path, &c.der).unwrap();

    certgate(dir.path()).arg("init").assert().success();

    certgate(dir.path())
        .arg("check")
        .arg(&pem_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("not trusted"));

    let alias = certgate::cert::Certificate::from_der(c.der.clone())
        .unwrap()
        .alias();

    certgate(dir.path())
        .arg("add")
        .arg(&pem_path)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Added certificate: {alias}")));

    certgate(dir.path())
        .arg("check")
        .arg(&der_path)
        .assert()
        .success()
        .stdout(predicate::str::diff("trusted\n"));

    certgate(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(alias.as_str()))
        .stdout(predicate::str::contains("panel.test"));

    certgate(dir.path())
        .arg("alias")
        .arg(&der_path)
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{alias}\n")));
}

#[test]
fn add_rejects_non_certificate() {
    let dir = common::temp_home();
    let junk = dir.path().join("junk.pem");
    std::fs::write(&junk, "hello").unwrap();
    certgate(dir.path()).arg("init").assert().success();
    certgate(dir.path())
        .arg("add")
        .arg(&junk)
        .assert()
        .failure()
        .stderr(predicate::str::contains("certificate"));
}

#[test]
fn fetch_rejects_bad_url() {
    let dir = common::temp_home();
    certgate(dir.path())
        .args(["fetch", "ftp://panel.test/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported scheme"));
}
