//! Blocking HTTP implementation of [`ObjectStore`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fmr_diff::{Direction, FieldMap};
use serde_json::{json, Value};

use crate::wire::{Method, Param, RequestBody};
use crate::{Endpoint, InstallRequest, Login, ObjectStore, Reply, RpcError, Session, WorkspaceAction};

/// Where and how to reach the manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: Option<u16>,
    pub use_ssl: bool,
    pub validate_certs: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn rpc_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{scheme}://{}:{port}/jsonrpc", self.host),
            None => format!("{scheme}://{}/jsonrpc", self.host),
        }
    }
}

/// Login credentials. Debug output never shows the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

pub struct JsonRpcClient {
    url: String,
    credentials: Credentials,
    http: reqwest::blocking::Client,
    next_id: AtomicU64,
}

impl fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("url", &self.url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl JsonRpcClient {
    pub fn new(cfg: &ClientConfig, credentials: Credentials) -> Result<Self, RpcError> {
        Self::with_url(cfg.rpc_url(), cfg, credentials)
    }

    /// Same as [`JsonRpcClient::new`] but with an explicit endpoint URL.
    pub fn with_url(
        url: impl Into<String>,
        cfg: &ClientConfig,
        credentials: Credentials,
    ) -> Result<Self, RpcError> {
        let http = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!cfg.validate_certs)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            credentials,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post(
        &self,
        method: Method,
        params: &[Param],
        session: Option<&Session>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RequestBody {
            id,
            method,
            params,
            session: session.map(Session::as_str),
            verbose: 1,
        };

        let url = params.first().map(|p| p.url.as_str()).unwrap_or_default();
        tracing::debug!(id, method = method.as_str(), url, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Http {
                status: status.as_u16(),
            });
        }

        resp.json::<Value>()
            .map_err(|e| RpcError::Decode(e.to_string()))
    }

    fn call(&self, method: Method, param: Param, session: &Session) -> Result<Reply, RpcError> {
        let raw = self.post(method, &[param], Some(session))?;
        let reply = Reply::from_response(raw)?;
        if !reply.is_ok() {
            tracing::debug!(code = reply.code, message = %reply.message, "rpc non-zero status");
        }
        Ok(reply)
    }

    fn fetch_first(
        &self,
        session: &Session,
        param: Param,
    ) -> Result<FieldMap, RpcError> {
        let reply = self.call(Method::Get, param, session)?;
        if !reply.is_ok() {
            return Ok(FieldMap::new());
        }
        Ok(reply.first_object().cloned().unwrap_or_default())
    }
}

impl ObjectStore for JsonRpcClient {
    fn login(&self) -> Result<Login, RpcError> {
        let param = Param::url("/sys/login/user").with_data(json!({
            "user": self.credentials.username,
            "passwd": self.credentials.password,
        }));
        let raw = self.post(Method::Exec, &[param], None)?;
        let token = raw.get("session").and_then(Value::as_str).map(Session::new);
        let reply = Reply::from_response(raw)?;

        if !reply.is_ok() {
            return Ok(Login {
                reply,
                session: None,
            });
        }
        let session = token.ok_or(RpcError::MissingSession)?;
        Ok(Login {
            reply,
            session: Some(session),
        })
    }

    fn logout(&self, session: &Session) -> Result<Reply, RpcError> {
        self.call(Method::Exec, Param::url("/sys/logout"), session)
    }

    fn fetch(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
    ) -> Result<FieldMap, RpcError> {
        self.fetch_first(session, Param::url(ep.item_url(identity)))
    }

    fn fetch_fields(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        fields: &[&str],
    ) -> Result<FieldMap, RpcError> {
        let param = Param::url(ep.collection_url())
            .with_eq_filter(ep.identity_field(), identity.clone())
            .with_fields(fields);
        self.fetch_first(session, param)
    }

    fn find_identity(
        &self,
        session: &Session,
        ep: &Endpoint,
        name: &str,
    ) -> Result<Value, RpcError> {
        let param = Param::url(ep.collection_url())
            .with_eq_filter("name", Value::String(name.to_string()))
            .with_fields(&[ep.identity_field()]);
        let found = self.fetch_first(session, param)?;
        Ok(found
            .get(ep.identity_field())
            .cloned()
            .unwrap_or_else(|| json!(0)))
    }

    fn list_fields(
        &self,
        session: &Session,
        ep: &Endpoint,
        fields: &[&str],
    ) -> Result<Vec<FieldMap>, RpcError> {
        let param = Param::url(ep.collection_url()).with_fields(fields);
        let reply = self.call(Method::Get, param, session)?;
        let items = match reply.data {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    fn add(&self, session: &Session, ep: &Endpoint, data: &FieldMap) -> Result<Reply, RpcError> {
        let param = Param::url(ep.collection_url()).with_data(Value::Object(data.clone()));
        self.call(Method::Add, param, session)
    }

    fn update(&self, session: &Session, ep: &Endpoint, data: &Value) -> Result<Reply, RpcError> {
        let param = Param::url(ep.collection_url()).with_data(data.clone());
        self.call(Method::Update, param, session)
    }

    fn delete(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
    ) -> Result<Reply, RpcError> {
        self.call(Method::Delete, Param::url(ep.item_url(identity)), session)
    }

    fn move_object(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        direction: Direction,
        target: &Value,
    ) -> Result<Reply, RpcError> {
        let param = Param::url(ep.item_url(identity)).with_move(direction.as_str(), target.clone());
        self.call(Method::Move, param, session)
    }

    fn lock(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError> {
        let param = Param::url(ep.workspace_url(WorkspaceAction::Lock));
        self.call(Method::Exec, param, session)
    }

    fn commit(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError> {
        let param = Param::url(ep.workspace_url(WorkspaceAction::Commit));
        self.call(Method::Exec, param, session)
    }

    fn unlock(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError> {
        let param = Param::url(ep.workspace_url(WorkspaceAction::Unlock));
        self.call(Method::Exec, param, session)
    }

    fn task_status(&self, session: &Session, task: &Value) -> Result<Reply, RpcError> {
        let param = Param::url(format!("task/task/{}", fmr_diff::identity_key(task)));
        self.call(Method::Get, param, session)
    }

    fn install_package(&self, session: &Session, req: &InstallRequest) -> Result<Reply, RpcError> {
        let param = Param::url("/securityconsole/install/package").with_data(req.to_data());
        self.call(Method::Exec, param, session)
    }
}
