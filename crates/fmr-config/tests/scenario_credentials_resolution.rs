//! `resolve_credentials` reads env vars named by the task file.
//!
//! Failure tests use sentinel names that are never set anywhere. Success tests
//! set variables with names unique to the test, so parallel tests never race.

use fmr_config::load_layered_yaml_from_strings;
use fmr_config::secrets::resolve_credentials;

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml])
        .expect("test yaml must parse cleanly")
        .config_json
}

#[test]
fn missing_username_names_the_variable() {
    let cfg = load(
        r#"
connection:
  host: "fmg"
  credentials_env:
    username: "FMR_T_SENTINEL_USER_MISSING_A1"
    password: "FMR_T_SENTINEL_PASS_MISSING_A1"
"#,
    );
    let msg = resolve_credentials(&cfg).unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"), "got: {msg}");
    assert!(
        msg.contains("FMR_T_SENTINEL_USER_MISSING_A1"),
        "error must name the missing env var, got: {msg}"
    );
}

#[test]
fn missing_password_names_the_variable() {
    std::env::set_var("FMR_T_USER_PRESENT_B1", "admin");
    let cfg = load(
        r#"
connection:
  host: "fmg"
  credentials_env:
    username: "FMR_T_USER_PRESENT_B1"
    password: "FMR_T_SENTINEL_PASS_MISSING_B1"
"#,
    );
    let msg = resolve_credentials(&cfg).unwrap_err().to_string();
    assert!(msg.contains("FMR_T_SENTINEL_PASS_MISSING_B1"), "got: {msg}");
    assert!(!msg.contains("admin"), "error must never carry values, got: {msg}");
}

#[test]
fn both_variables_resolve() {
    std::env::set_var("FMR_T_USER_C1", "admin");
    std::env::set_var("FMR_T_PASS_C1", "hunter2-not-real");
    let cfg = load(
        r#"
connection:
  host: "fmg"
  credentials_env:
    username: "FMR_T_USER_C1"
    password: "FMR_T_PASS_C1"
"#,
    );
    let creds = resolve_credentials(&cfg).expect("both set");
    assert_eq!(creds.username.as_deref(), Some("admin"));
    assert_eq!(creds.password.as_deref(), Some("hunter2-not-real"));
    assert!(creds.session.is_none());

    let dbg = format!("{creds:?}");
    assert!(!dbg.contains("hunter2"), "Debug must redact, got: {dbg}");
    assert!(dbg.contains("<REDACTED>"));
}

#[test]
fn borrowed_session_makes_login_credentials_optional() {
    std::env::set_var("FMR_T_SESSION_D1", "abc123session");
    let cfg = load(
        r#"
connection:
  host: "fmg"
  session_env: "FMR_T_SESSION_D1"
  credentials_env:
    username: "FMR_T_SENTINEL_USER_MISSING_D1"
    password: "FMR_T_SENTINEL_PASS_MISSING_D1"
"#,
    );
    let creds = resolve_credentials(&cfg).expect("session is enough");
    assert_eq!(creds.session.as_deref(), Some("abc123session"));
    assert!(creds.username.is_none());
}

#[test]
fn blank_variable_counts_as_missing() {
    std::env::set_var("FMR_T_USER_BLANK_E1", "   ");
    let cfg = load(
        r#"
connection:
  host: "fmg"
  credentials_env:
    username: "FMR_T_USER_BLANK_E1"
    password: "FMR_T_SENTINEL_PASS_MISSING_E1"
"#,
    );
    let msg = resolve_credentials(&cfg).unwrap_err().to_string();
    assert!(msg.contains("FMR_T_USER_BLANK_E1"), "got: {msg}");
}
