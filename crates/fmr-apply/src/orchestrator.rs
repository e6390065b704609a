use fmr_diff::{identity_key, plan_change, Change, DiffMode, FieldMap};
use fmr_rpc::wire::{Method, Param};
use fmr_rpc::{Endpoint, ObjectStore, RpcError, Session};
use serde_json::Value;

use crate::ordering::MoveContext;
use crate::transaction::Transaction;
use crate::validate;
use crate::{ExecutionMode, Failure, FailureKind, Outcome, PlannedCall, ReconcileRequest, TxnFlags};

const NAME_FIELD: &str = "name";

/// The write a [`Change`] turns into.
enum Write {
    Add(FieldMap),
    Update(Value),
    Delete(Value),
}

fn transport(err: RpcError) -> Failure {
    Failure::new(FailureKind::Transport, err.to_string())
}

fn change_label(change: &Change) -> &'static str {
    match change {
        Change::NoChange => "none",
        Change::Create(_) => "create",
        Change::Update(_) => "update",
        Change::Delete => "delete",
    }
}

fn is_unresolved(identity: &Value) -> bool {
    identity.is_null() || identity_key(identity) == "0"
}

/// Drives one reconciliation against an [`ObjectStore`].
pub struct Reconciler<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ObjectStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate, log in (unless a session was supplied), converge the object,
    /// place it, log out (only if we logged in).
    pub fn run(&self, req: &ReconcileRequest) -> Result<Outcome, Failure> {
        let placement = validate::preflight(req)?;

        let (session, owned) = match &req.session {
            Some(session) => (session.clone(), false),
            None => (self.login()?, true),
        };

        let result = self.reconcile(req, placement.as_ref(), &session, !owned);

        if owned {
            match self.store.logout(&session) {
                Ok(reply) if reply.is_ok() => {}
                Ok(reply) => tracing::warn!(code = reply.code, "logout refused"),
                Err(err) => tracing::warn!(error = %err, "logout failed"),
            }
        }
        result
    }

    fn login(&self) -> Result<Session, Failure> {
        let login = match self.store.login() {
            Ok(login) => login,
            Err(RpcError::MissingSession) => {
                return Err(Failure::new(FailureKind::Authentication, "login returned no session"))
            }
            Err(err) => return Err(transport(err)),
        };
        match login.session {
            Some(session) if login.reply.is_ok() => Ok(session),
            _ => Err(Failure::new(FailureKind::Authentication, "unable to login")
                .with_payload(login.reply.raw)),
        }
    }

    fn reconcile(
        &self,
        req: &ReconcileRequest,
        placement: Option<&crate::Placement>,
        session: &Session,
        borrowed_session: bool,
    ) -> Result<Outcome, Failure> {
        let ep = &req.endpoint;
        let ident = ep.identity_field();
        let apply = req.execution == ExecutionMode::Apply;

        let mut desired = req.desired.clone();
        if !desired.contains_key(ident) {
            if let Some(name) = desired.get(NAME_FIELD).and_then(Value::as_str) {
                let found = self
                    .store
                    .find_identity(session, ep, name)
                    .map_err(transport)?;
                desired.insert(ident.to_string(), found);
            }
        }
        let identity = desired.get(ident).cloned().unwrap_or(Value::Null);

        let existing = if is_unresolved(&identity) {
            FieldMap::new()
        } else {
            self.store
                .fetch(session, ep, &identity)
                .map_err(transport)?
        };
        validate::post_fetch(req, &existing)?;

        let change = plan_change(req.mode, &ep.profile(), &desired, &existing);
        tracing::info!(
            mode = req.mode.as_str(),
            identity = %identity,
            exists = !existing.is_empty(),
            change = change_label(&change),
            "diff computed"
        );

        let (mut config, write) = self.plan_write(ep, change, &existing, &identity);

        let mut flags: Option<TxnFlags> = None;
        if let (true, Some(write)) = (apply, write) {
            let context = |f: Failure| f.with_existing(&existing).with_config(config.clone());

            let mut txn =
                Transaction::begin(self.store, session, ep, req.lock).map_err(context)?;
            let reply = txn
                .mutate(|s| match &write {
                    Write::Add(doc) => s.add(session, ep, doc),
                    Write::Update(doc) => s.update(session, ep, doc),
                    Write::Delete(id) => s.delete(session, ep, id),
                })
                .map_err(context)?;
            flags = Some(txn.finish().map_err(context)?);

            // New objects get their identity from the manager.
            if let (Write::Add(_), Some(assigned)) = (&write, reply.first_object()) {
                if let Some(param) = config.as_mut().and_then(|c| c.params.first_mut()) {
                    if let Some(Value::Object(data)) = param.data.as_mut() {
                        for (k, v) in assigned {
                            data.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
            tracing::info!(identity = %identity, "write applied");
        }

        let mut moved = None;
        if let (Some(placement), false) = (placement, req.mode == DiffMode::Absent) {
            let subject = config
                .as_ref()
                .filter(|c| c.method == Method::Add)
                .and_then(|c| c.data())
                .and_then(|d| d.get(ident))
                .filter(|id| !is_unresolved(id))
                .cloned()
                .unwrap_or_else(|| identity.clone());

            let mover = MoveContext {
                store: self.store,
                session,
                ep,
                lock: req.lock,
                execution: req.execution,
                borrowed_session,
            };
            let creating = config.as_ref().is_some_and(|c| c.method == Method::Add);
            let result = if !apply && creating {
                mover.planned(&subject, placement).map(Some)
            } else {
                mover.adjust(&subject, placement).map(|m| {
                    m.map(|m| {
                        if apply {
                            flags = Some(m.flags);
                        }
                        m.call
                    })
                })
            };
            moved = result.map_err(|f| f.with_existing(&existing))?;
        }

        let changed = config.is_some() || moved.is_some();
        let lock = (req.lock && changed && apply).then(|| flags.unwrap_or(TxnFlags::ALL));

        Ok(Outcome {
            changed,
            existing,
            config,
            moved,
            lock,
        })
    }

    fn plan_write(
        &self,
        ep: &Endpoint,
        change: Change,
        existing: &FieldMap,
        identity: &Value,
    ) -> (Option<PlannedCall>, Option<Write>) {
        match change {
            Change::NoChange => (None, None),
            Change::Create(doc) => {
                let call = PlannedCall::new(
                    Method::Add,
                    Param::url(ep.collection_url()).with_data(Value::Object(doc.clone())),
                );
                (Some(call), Some(Write::Add(doc)))
            }
            Change::Update(doc) => {
                let data = Value::Object(doc.into_fields());
                let call = PlannedCall::new(
                    Method::Update,
                    Param::url(ep.collection_url()).with_data(data.clone()),
                );
                (Some(call), Some(Write::Update(data)))
            }
            Change::Delete => {
                let id = existing
                    .get(ep.identity_field())
                    .cloned()
                    .unwrap_or_else(|| identity.clone());
                let call = PlannedCall::new(Method::Delete, Param::url(ep.item_url(&id)));
                (Some(call), Some(Write::Delete(id)))
            }
        }
    }
}
