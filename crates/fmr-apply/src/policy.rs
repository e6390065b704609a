//! Caller-facing firewall policy parameters.
//!
//! Field names are the friendly ones used in task files; [`PolicyParams::to_desired`]
//! maps them onto the manager's attribute names and drops everything unset.

use fmr_diff::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyAction {
    Accept,
    Deny,
    Ipsec,
    SslVpn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enable,
    Disable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTraffic {
    Disable,
    All,
    Utm,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyParams {
    pub action: Option<PolicyAction>,
    pub comment: Option<String>,
    pub destination_address: Option<Vec<String>>,
    pub destination_intfc: Option<Vec<String>>,
    pub global_label: Option<String>,
    pub ip_pool: Option<Toggle>,
    pub label: Option<String>,
    pub log_traffic: Option<LogTraffic>,
    pub log_traffic_start: Option<Toggle>,
    pub nat: Option<Toggle>,
    pub nat_ip: Option<Vec<String>>,
    pub permit_any_host: Option<Toggle>,
    pub policy_id: Option<u64>,
    pub policy_name: Option<String>,
    pub pool_name: Option<Vec<String>>,
    pub schedule: Option<Vec<String>>,
    pub service: Option<Vec<String>>,
    pub source_address: Option<Vec<String>>,
    pub source_intfc: Option<Vec<String>>,
    pub status: Option<Toggle>,
}

fn put_text(out: &mut FieldMap, field: &str, v: &Option<String>) {
    if let Some(s) = v.as_deref().filter(|s| !s.is_empty()) {
        out.insert(field.to_string(), Value::String(s.to_string()));
    }
}

fn put_list(out: &mut FieldMap, field: &str, v: &Option<Vec<String>>) {
    if let Some(items) = v.as_ref().filter(|items| !items.is_empty()) {
        out.insert(
            field.to_string(),
            Value::Array(items.iter().cloned().map(Value::String).collect()),
        );
    }
}

fn put_choice<T: Serialize>(out: &mut FieldMap, field: &str, v: &Option<T>) {
    if let Some(choice) = v {
        if let Ok(value) = serde_json::to_value(choice) {
            out.insert(field.to_string(), value);
        }
    }
}

impl PolicyParams {
    /// Desired document in manager attribute names. Unset and empty values are
    /// left out; a policy id of 0 means "unset".
    pub fn to_desired(&self) -> FieldMap {
        let mut out = FieldMap::new();
        put_choice(&mut out, "action", &self.action);
        put_text(&mut out, "comments", &self.comment);
        put_list(&mut out, "dstaddr", &self.destination_address);
        put_list(&mut out, "dstintf", &self.destination_intfc);
        put_text(&mut out, "global-label", &self.global_label);
        put_choice(&mut out, "ippool", &self.ip_pool);
        put_text(&mut out, "label", &self.label);
        put_choice(&mut out, "logtraffic", &self.log_traffic);
        put_choice(&mut out, "logtraffic-start", &self.log_traffic_start);
        put_text(&mut out, "name", &self.policy_name);
        put_choice(&mut out, "nat", &self.nat);
        put_list(&mut out, "natip", &self.nat_ip);
        put_choice(&mut out, "permit-any-host", &self.permit_any_host);
        if let Some(id) = self.policy_id.filter(|id| *id != 0) {
            out.insert("policyid".to_string(), Value::from(id));
        }
        put_list(&mut out, "poolname", &self.pool_name);
        put_list(&mut out, "schedule", &self.schedule);
        put_list(&mut out, "service", &self.service);
        put_list(&mut out, "srcaddr", &self.source_address);
        put_list(&mut out, "srcintf", &self.source_intfc);
        put_choice(&mut out, "status", &self.status);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_friendly_names_and_drops_unset() {
        let params = PolicyParams {
            action: Some(PolicyAction::SslVpn),
            comment: Some(String::new()),
            destination_address: Some(vec!["web".to_string()]),
            global_label: Some("Outbound".to_string()),
            log_traffic: Some(LogTraffic::All),
            log_traffic_start: Some(Toggle::Enable),
            policy_id: Some(0),
            policy_name: Some("web-out".to_string()),
            source_intfc: Some(vec![]),
            ..PolicyParams::default()
        };

        let desired = params.to_desired();
        assert_eq!(
            Value::Object(desired),
            json!({
                "action": "ssl-vpn",
                "dstaddr": ["web"],
                "global-label": "Outbound",
                "logtraffic": "all",
                "logtraffic-start": "enable",
                "name": "web-out"
            })
        );
    }

    #[test]
    fn rejects_unknown_parameter_names() {
        let err = serde_json::from_value::<PolicyParams>(json!({"polcy_id": 3})).unwrap_err();
        assert!(err.to_string().contains("polcy_id"));
    }
}
