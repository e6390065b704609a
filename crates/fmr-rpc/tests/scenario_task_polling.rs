use std::time::Duration;

use fmr_rpc::*;
use httpmock::prelude::*;
use serde_json::json;

fn client_for(server: &MockServer) -> JsonRpcClient {
    let cfg = ClientConfig {
        host: server.host(),
        port: Some(server.port()),
        use_ssl: false,
        validate_certs: false,
        timeout: Duration::from_secs(5),
    };
    JsonRpcClient::new(
        &cfg,
        Credentials {
            username: "api".to_string(),
            password: "pw".to_string(),
        },
    )
    .expect("client builds")
}

fn quick(budget: Duration) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        budget,
    }
}

#[test]
fn scenario_poll_stops_at_completion() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("task/task/42");
        then.status(200).json_body(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "data": {"percent": 100, "state": "done"}}]
        }));
    });

    let reply = poll_task(
        &client_for(&server),
        &Session::new("tok"),
        &json!(42),
        &quick(Duration::from_secs(5)),
    )
    .unwrap();

    assert_eq!(m.hits(), 1, "a finished task is read once");
    assert_eq!(reply.data["percent"], json!(100));
}

#[test]
fn scenario_poll_budget_returns_last_reply() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc");
        then.status(200).json_body(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "data": {"percent": 40}}]
        }));
    });

    let reply = poll_task(
        &client_for(&server),
        &Session::new("tok"),
        &json!(7),
        &quick(Duration::from_millis(50)),
    )
    .expect("budget exhaustion is not an error");

    assert!(m.hits() >= 1);
    assert_eq!(reply.data["percent"], json!(40));
}

#[test]
fn scenario_install_waits_on_returned_task() {
    let server = MockServer::start();
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/jsonrpc")
            .body_contains("/securityconsole/install/package")
            .body_contains("\"pkg\":\"default\"");
        then.status(200).json_body(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "data": {"task": 311}}]
        }));
    });
    let task = server.mock(|when, then| {
        when.method(POST).path("/jsonrpc").body_contains("task/task/311");
        then.status(200).json_body(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "data": {"percent": 100, "num_err": 0}}]
        }));
    });

    let req = InstallRequest {
        adom: "root".to_string(),
        package: "default".to_string(),
        targets: vec![InstallTarget {
            device: "fgt1".to_string(),
            vdom: Some("root".to_string()),
        }],
        flags: vec!["none".to_string()],
    };
    let reply = install_and_wait(
        &client_for(&server),
        &Session::new("tok"),
        &req,
        &quick(Duration::from_secs(5)),
    )
    .unwrap();

    submit.assert();
    task.assert();
    assert_eq!(reply.data["num_err"], json!(0));
}

#[test]
fn scenario_rejected_install_is_returned_unchanged() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/jsonrpc");
        then.status(200).json_body(json!({
            "result": [{"status": {"code": -6, "message": "Invalid url"}}]
        }));
    });

    let req = InstallRequest {
        adom: "root".to_string(),
        package: "missing".to_string(),
        targets: vec![],
        flags: vec![],
    };
    let reply = install_and_wait(
        &client_for(&server),
        &Session::new("tok"),
        &req,
        &PollPolicy::default(),
    )
    .unwrap();
    assert_eq!(reply.code, -6);
}
