use assert_cmd::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use std::process::Command;

fn write_task(dir: &Path, name: &str, yaml: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, yaml).expect("write task yaml");
    path.to_string_lossy().to_string()
}

fn task_yaml(host: &str, port: u16, extra: &str) -> String {
    format!(
        r#"
connection:
  host: "{host}"
  port: {port}
  use_ssl: false
  timeout_secs: 5
  credentials_env:
    username: "FMR_CLI_T_USER"
    password: "FMR_CLI_T_PASS"
target:
  adom: "root"
  package: "default"
{extra}
"#
    )
}

fn fmr(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fmr").expect("fmr binary");
    cmd.current_dir(dir)
        .env("FMR_CLI_T_USER", "api")
        .env("FMR_CLI_T_PASS", "pw")
        .env("RUST_LOG", "warn");
    cmd
}

fn ok(data: serde_json::Value) -> serde_json::Value {
    json!({"id": 1, "result": [{"status": {"code": 0, "message": "OK"}, "data": data}]})
}

#[test]
fn direction_without_reference_fails_before_any_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc");
        then.status(200).json_body(ok(json!({})));
    });

    let task = write_task(
        dir.path(),
        "task.yaml",
        &task_yaml(
            &server.host(),
            server.port(),
            "policy:\n  policy_id: 7\nmove:\n  direction: after\n",
        ),
    );

    fmr(dir.path())
        .args(["policy", "apply", "--config", &task])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\": \"validation\""));

    any.assert_hits(0);
}

#[test]
fn check_mode_reads_but_never_locks_or_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = MockServer::start();

    let login = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("/sys/login/user");
        then.status(200).json_body(json!({
            "id": 1,
            "result": [{"status": {"code": 0, "message": "OK"}}],
            "session": "tok-cli"
        }));
    });
    let fetch = server.mock(|when, then| {
        when.method(POST)
            .path("/jsonrpc")
            .body_contains("\"method\":\"get\"")
            .body_contains("/pm/config/adom/root/pkg/default/firewall/policy/7");
        then.status(200)
            .json_body(ok(json!({"policyid": 7, "name": "web", "service": ["SSH"]})));
    });
    let lock = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("/workspace/lock");
        then.status(200).json_body(ok(json!({})));
    });
    let update = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("\"method\":\"update\"");
        then.status(200).json_body(ok(json!({})));
    });
    let logout = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("/sys/logout");
        then.status(200).json_body(ok(json!({})));
    });

    let task = write_task(
        dir.path(),
        "task.yaml",
        &task_yaml(
            &server.host(),
            server.port(),
            "policy:\n  policy_id: 7\n  service: [\"HTTPS\"]\n",
        ),
    );

    fmr(dir.path())
        .args(["policy", "apply", "--check", "--config", &task])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changed\": true"))
        .stdout(predicate::str::contains("HTTPS"));

    login.assert_hits(1);
    fetch.assert_hits(1);
    lock.assert_hits(0);
    update.assert_hits(0);
    logout.assert_hits(1);
}

#[test]
fn missing_credentials_name_the_variable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let task = write_task(
        dir.path(),
        "task.yaml",
        &task_yaml("127.0.0.1", 9, "policy:\n  policy_id: 7\n"),
    );

    Command::cargo_bin("fmr")
        .expect("fmr binary")
        .current_dir(dir.path())
        .env_remove("FMR_CLI_T_USER")
        .env_remove("FMR_CLI_T_PASS")
        .args(["policy", "apply", "--config", &task])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("FMR_CLI_T_USER"));
}

#[test]
fn unknown_state_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let task = write_task(
        dir.path(),
        "task.yaml",
        &task_yaml("127.0.0.1", 9, "policy:\n  policy_id: 7\n"),
    );

    fmr(dir.path())
        .args(["policy", "apply", "--state", "gone", "--config", &task])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid state 'gone'"));
}
