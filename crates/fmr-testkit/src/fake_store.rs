use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use fmr_diff::{identity_key, Direction, FieldMap};
use fmr_rpc::{Endpoint, InstallRequest, Login, ObjectStore, Reply, RpcError, Session};
use serde_json::{json, Value};

pub const FAKE_SESSION: &str = "fake-session";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Login,
    Logout,
    Fetch,
    FetchFields,
    FindIdentity,
    ListFields,
    Add,
    Update,
    Delete,
    Move,
    Lock,
    Commit,
    Unlock,
    TaskStatus,
    InstallPackage,
}

impl CallKind {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            CallKind::Add | CallKind::Update | CallKind::Delete | CallKind::Move
        )
    }
}

/// One journaled call.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub session: Option<String>,
    pub data: Option<Value>,
}

#[derive(Default)]
struct Inner {
    objects: Vec<FieldMap>,
    journal: Vec<Call>,
    sticky: HashMap<CallKind, i64>,
    once: HashMap<CallKind, VecDeque<i64>>,
    broken: HashSet<CallKind>,
    clear_label_on_move: bool,
    tasks: HashMap<String, VecDeque<i64>>,
}

/// In-memory stand-in for the manager, used ONLY by tests.
///
/// Holds one ordered collection. Status codes can be scripted per call kind;
/// a scripted non-zero code means the call has no effect.
#[derive(Default)]
pub struct FakeStore {
    inner: RefCell<Inner>,
}

fn status_reply(code: i64) -> Reply {
    Reply {
        code,
        message: format!("scripted status {code}"),
        data: Value::Null,
        raw: json!({"result": [{"status": {"code": code, "message": format!("scripted status {code}")}}]}),
    }
}

fn project(obj: &FieldMap, fields: &[&str]) -> FieldMap {
    fields
        .iter()
        .filter_map(|f| obj.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed objects, in stored order.
    pub fn with_objects(objects: impl IntoIterator<Item = Value>) -> Self {
        let store = Self::new();
        store.inner.borrow_mut().objects = objects
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        store
    }

    /// Every call of `kind` answers with `code`.
    pub fn fail(&self, kind: CallKind, code: i64) -> &Self {
        self.inner.borrow_mut().sticky.insert(kind, code);
        self
    }

    /// The next call of `kind` answers with `code`.
    pub fn fail_next(&self, kind: CallKind, code: i64) -> &Self {
        self.inner
            .borrow_mut()
            .once
            .entry(kind)
            .or_default()
            .push_back(code);
        self
    }

    /// Every call of `kind` errors at the transport level.
    pub fn break_transport(&self, kind: CallKind) -> &Self {
        self.inner.borrow_mut().broken.insert(kind);
        self
    }

    /// Mimic the manager dropping `global-label` on move.
    pub fn clear_label_on_move(&self) -> &Self {
        self.inner.borrow_mut().clear_label_on_move = true;
        self
    }

    /// Percent values reported by successive polls of `task`.
    pub fn task_progress(&self, task: &Value, percents: &[i64]) -> &Self {
        self.inner
            .borrow_mut()
            .tasks
            .insert(identity_key(task), percents.iter().copied().collect());
        self
    }

    pub fn journal(&self) -> Vec<Call> {
        self.inner.borrow().journal.clone()
    }

    pub fn kinds(&self) -> Vec<CallKind> {
        self.inner.borrow().journal.iter().map(|c| c.kind).collect()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.inner
            .borrow()
            .journal
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.inner
            .borrow()
            .journal
            .iter()
            .filter(|c| c.kind.is_write())
            .cloned()
            .collect()
    }

    pub fn object(&self, field: &str, identity: &Value) -> Option<FieldMap> {
        let key = identity_key(identity);
        self.inner
            .borrow()
            .objects
            .iter()
            .find(|o| o.get(field).map(identity_key).as_deref() == Some(key.as_str()))
            .cloned()
    }

    /// Identities in stored order.
    pub fn order(&self, field: &str) -> Vec<Value> {
        self.inner
            .borrow()
            .objects
            .iter()
            .filter_map(|o| o.get(field).cloned())
            .collect()
    }

    fn record(
        &self,
        kind: CallKind,
        session: Option<&Session>,
        data: Option<Value>,
    ) -> Result<i64, RpcError> {
        let mut inner = self.inner.borrow_mut();
        inner.journal.push(Call {
            kind,
            session: session.map(|s| s.as_str().to_string()),
            data,
        });
        if inner.broken.contains(&kind) {
            return Err(RpcError::Transport(format!("scripted transport failure on {kind:?}")));
        }
        if let Some(code) = inner.once.get_mut(&kind).and_then(VecDeque::pop_front) {
            return Ok(code);
        }
        Ok(inner.sticky.get(&kind).copied().unwrap_or(0))
    }

    fn position(&self, field: &str, identity: &Value) -> Option<usize> {
        let key = identity_key(identity);
        self.inner
            .borrow()
            .objects
            .iter()
            .position(|o| o.get(field).map(identity_key).as_deref() == Some(key.as_str()))
    }

    fn next_identity(&self, field: &str) -> Value {
        let max = self
            .inner
            .borrow()
            .objects
            .iter()
            .filter_map(|o| o.get(field).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        json!(max + 1)
    }

    fn merge_into(&self, field: &str, doc: &FieldMap) -> bool {
        let Some(identity) = doc.get(field) else {
            return false;
        };
        let Some(pos) = self.position(field, identity) else {
            return false;
        };
        let mut inner = self.inner.borrow_mut();
        for (k, v) in doc {
            inner.objects[pos].insert(k.clone(), v.clone());
        }
        true
    }
}

impl ObjectStore for FakeStore {
    fn login(&self) -> Result<Login, RpcError> {
        let code = self.record(CallKind::Login, None, None)?;
        let session = (code == 0).then(|| Session::new(FAKE_SESSION));
        Ok(Login {
            reply: status_reply(code),
            session,
        })
    }

    fn logout(&self, session: &Session) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Logout, Some(session), None)?;
        Ok(status_reply(code))
    }

    fn fetch(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
    ) -> Result<FieldMap, RpcError> {
        let code = self.record(CallKind::Fetch, Some(session), None)?;
        if code != 0 {
            return Ok(FieldMap::new());
        }
        Ok(self.object(ep.identity_field(), identity).unwrap_or_default())
    }

    fn fetch_fields(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        fields: &[&str],
    ) -> Result<FieldMap, RpcError> {
        let code = self.record(CallKind::FetchFields, Some(session), None)?;
        if code != 0 {
            return Ok(FieldMap::new());
        }
        Ok(self
            .object(ep.identity_field(), identity)
            .map(|o| project(&o, fields))
            .unwrap_or_default())
    }

    fn find_identity(
        &self,
        session: &Session,
        ep: &Endpoint,
        name: &str,
    ) -> Result<Value, RpcError> {
        self.record(CallKind::FindIdentity, Some(session), Some(json!(name)))?;
        let field = ep.identity_field();
        Ok(self
            .inner
            .borrow()
            .objects
            .iter()
            .find(|o| o.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|o| o.get(field).cloned())
            .unwrap_or_else(|| json!(0)))
    }

    fn list_fields(
        &self,
        session: &Session,
        _ep: &Endpoint,
        fields: &[&str],
    ) -> Result<Vec<FieldMap>, RpcError> {
        self.record(CallKind::ListFields, Some(session), None)?;
        Ok(self
            .inner
            .borrow()
            .objects
            .iter()
            .map(|o| project(o, fields))
            .collect())
    }

    fn add(&self, session: &Session, ep: &Endpoint, data: &FieldMap) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Add, Some(session), Some(Value::Object(data.clone())))?;
        if code != 0 {
            return Ok(status_reply(code));
        }

        let field = ep.identity_field();
        let mut doc = data.clone();
        let assigned = match doc.get(field) {
            Some(id) if identity_key(id) != "0" => id.clone(),
            _ => self.next_identity(field),
        };
        doc.insert(field.to_string(), assigned.clone());
        self.inner.borrow_mut().objects.push(doc);

        let mut reply = serde_json::Map::new();
        reply.insert(field.to_string(), assigned);
        Ok(Reply::ok(Value::Object(reply)))
    }

    fn update(&self, session: &Session, ep: &Endpoint, data: &Value) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Update, Some(session), Some(data.clone()))?;
        if code != 0 {
            return Ok(status_reply(code));
        }

        let docs: Vec<&FieldMap> = match data {
            Value::Object(doc) => vec![doc],
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };
        for doc in docs {
            if !self.merge_into(ep.identity_field(), doc) {
                return Ok(status_reply(-3));
            }
        }
        Ok(Reply::ok(Value::Null))
    }

    fn delete(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
    ) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Delete, Some(session), Some(identity.clone()))?;
        if code != 0 {
            return Ok(status_reply(code));
        }
        match self.position(ep.identity_field(), identity) {
            Some(pos) => {
                self.inner.borrow_mut().objects.remove(pos);
                Ok(Reply::ok(Value::Null))
            }
            None => Ok(status_reply(-3)),
        }
    }

    fn move_object(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        direction: Direction,
        target: &Value,
    ) -> Result<Reply, RpcError> {
        let code = self.record(
            CallKind::Move,
            Some(session),
            Some(json!({"subject": identity, "option": direction.as_str(), "target": target})),
        )?;
        if code != 0 {
            return Ok(status_reply(code));
        }

        let field = ep.identity_field();
        let Some(from) = self.position(field, identity) else {
            return Ok(status_reply(-3));
        };
        let mut moving = self.inner.borrow_mut().objects.remove(from);
        let Some(anchor) = self.position(field, target) else {
            self.inner.borrow_mut().objects.insert(from, moving);
            return Ok(status_reply(-3));
        };

        let mut inner = self.inner.borrow_mut();
        if inner.clear_label_on_move {
            moving.insert("global-label".to_string(), json!(""));
        }
        let at = match direction {
            Direction::Before => anchor,
            Direction::After => anchor + 1,
        };
        inner.objects.insert(at, moving);
        Ok(Reply::ok(Value::Null))
    }

    fn lock(&self, session: &Session, _ep: &Endpoint) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Lock, Some(session), None)?;
        Ok(status_reply(code))
    }

    fn commit(&self, session: &Session, _ep: &Endpoint) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Commit, Some(session), None)?;
        Ok(status_reply(code))
    }

    fn unlock(&self, session: &Session, _ep: &Endpoint) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::Unlock, Some(session), None)?;
        Ok(status_reply(code))
    }

    fn task_status(&self, session: &Session, task: &Value) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::TaskStatus, Some(session), Some(task.clone()))?;
        if code != 0 {
            return Ok(status_reply(code));
        }
        let mut inner = self.inner.borrow_mut();
        let queue = inner.tasks.entry(identity_key(task)).or_default();
        let percent = if queue.len() > 1 {
            queue.pop_front().unwrap_or(100)
        } else {
            queue.front().copied().unwrap_or(100)
        };
        Ok(Reply::ok(json!({"id": task, "percent": percent})))
    }

    fn install_package(&self, session: &Session, req: &InstallRequest) -> Result<Reply, RpcError> {
        let code = self.record(CallKind::InstallPackage, Some(session), Some(req.to_data()))?;
        if code != 0 {
            return Ok(status_reply(code));
        }
        Ok(Reply::ok(json!({"task": 1})))
    }
}
