use fmr_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const TASK_WITH_EXTRAS: &str = r#"
connection:
  host: "fmg"
target:
  package: "default"
policy:
  policy_name: "web-out"
unused_section:
  foo: 123
  bar: 456
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[TASK_WITH_EXTRAS]).expect("load");

    let report =
        report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).expect("warn never errors");

    assert!(!report.is_clean(), "report should detect unused keys");
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused_section/bar".to_string(), "/unused_section/foo".to_string()],
        "unused pointers are sorted and limited to unknown sections"
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[TASK_WITH_EXTRAS]).expect("load");

    let msg = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "got: {msg}");
    assert!(msg.contains("/unused_section/foo"));
}

#[test]
fn known_sections_are_clean() {
    let yaml = r#"
connection:
  host: "fmg"
  port: 8443
target:
  adom: "root"
  package: "default"
reconcile:
  state: "absent"
policy:
  policy_id: 7
  service: ["HTTPS", "SSH"]
move:
  direction: "before"
  reference_policy_id: 3
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("load");
    let report =
        report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).expect("clean config");
    assert!(report.is_clean());
}

#[test]
fn near_miss_section_name_is_not_consumed() {
    let yaml = r#"
connection:
  host: "fmg"
policy_extra:
  x: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("load");
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).expect("warn");
    assert_eq!(report.unused_leaf_pointers, vec!["/policy_extra/x".to_string()]);
}
