//! Move adjuster: put one policy directly before or after another.
//!
//! The manager is known to clear `global-label` when a policy is moved, so the
//! label is read before the move and written back if it changed.

use fmr_diff::{plan_move, FieldMap, MovePlan, PlacementError};
use fmr_rpc::wire::{Method, Param};
use fmr_rpc::{Endpoint, ObjectStore, Session};
use serde_json::{json, Value};

use crate::transaction::Transaction;
use crate::{ExecutionMode, Failure, FailureKind, PlannedCall, Placement, Reference, TxnFlags};

const LABEL_FIELD: &str = "global-label";

pub(crate) struct MoveContext<'a, S: ObjectStore + ?Sized> {
    pub store: &'a S,
    pub session: &'a Session,
    pub ep: &'a Endpoint,
    pub lock: bool,
    pub execution: ExecutionMode,
    /// Session came from the caller; commit after each write.
    pub borrowed_session: bool,
}

pub(crate) struct Moved {
    pub call: PlannedCall,
    pub flags: TxnFlags,
}

fn rpc_failure(err: fmr_rpc::RpcError) -> Failure {
    Failure::new(FailureKind::Transport, err.to_string())
}

fn label_of(fields: &FieldMap) -> Value {
    fields.get(LABEL_FIELD).cloned().unwrap_or_else(|| json!(""))
}

impl<'a, S: ObjectStore + ?Sized> MoveContext<'a, S> {
    /// `Ok(None)` when the policy already sits where it was asked to be.
    pub fn adjust(&self, subject: &Value, placement: &Placement) -> Result<Option<Moved>, Failure> {
        let apply = self.execution == ExecutionMode::Apply;
        let ident = self.ep.identity_field();

        if apply && self.borrowed_session {
            self.commit_pending();
        }

        let reference = self.resolve_reference(placement)?;

        let before = self
            .store
            .fetch_fields(self.session, self.ep, subject, &[LABEL_FIELD])
            .map_err(rpc_failure)?;

        let order: Vec<Value> = self
            .store
            .list_fields(self.session, self.ep, &[ident])
            .map_err(rpc_failure)?
            .into_iter()
            .filter_map(|row| row.get(ident).cloned())
            .collect();

        let plan = plan_move(&order, subject, &reference, placement.direction).map_err(
            |err: PlacementError| {
                Failure::new(
                    FailureKind::Placement,
                    format!("unable to find the policies; verify the policy params ({err})"),
                )
            },
        )?;
        if plan == MovePlan::AlreadyPlaced {
            tracing::info!(subject = %subject, reference = %reference, "already placed, no move");
            return Ok(None);
        }

        let call = self.move_call(subject, placement, &reference);
        if !apply {
            return Ok(Some(Moved {
                call,
                flags: TxnFlags::default(),
            }));
        }

        let mut txn = Transaction::begin(self.store, self.session, self.ep, self.lock)?;
        txn.mutate(|s| {
            s.move_object(self.session, self.ep, subject, placement.direction, &reference)
        })
        .map_err(|f| f.with_config(Some(call.clone())))?;
        tracing::info!(
            subject = %subject,
            direction = placement.direction.as_str(),
            reference = %reference,
            "policy moved"
        );

        if self.borrowed_session {
            txn.follow_up("commit", |s| s.commit(self.session, self.ep));
        }

        let label = label_of(&before);
        let after = self
            .store
            .fetch_fields(self.session, self.ep, subject, &[LABEL_FIELD])
            .map(|fields| label_of(&fields))
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "re-reading label after move failed");
                label.clone()
            });
        if after != label {
            tracing::info!(subject = %subject, "restoring label cleared by move");
            let mut doc = FieldMap::new();
            doc.insert(ident.to_string(), subject.clone());
            doc.insert(LABEL_FIELD.to_string(), label);
            let data = Value::Array(vec![Value::Object(doc)]);
            txn.follow_up("restore label", |s| s.update(self.session, self.ep, &data));
            if self.borrowed_session {
                txn.follow_up("commit", |s| s.commit(self.session, self.ep));
            }
        }

        let flags = txn.finish().map_err(|f| f.with_config(Some(call.clone())))?;
        Ok(Some(Moved { call, flags }))
    }

    /// The move that would be sent, without checking current placement.
    /// Used for objects that do not exist yet.
    pub fn planned(&self, subject: &Value, placement: &Placement) -> Result<PlannedCall, Failure> {
        let reference = self.resolve_reference(placement)?;
        Ok(self.move_call(subject, placement, &reference))
    }

    fn resolve_reference(&self, placement: &Placement) -> Result<Value, Failure> {
        match &placement.reference {
            Reference::Id(id) => Ok(id.clone()),
            Reference::Name(name) => self
                .store
                .find_identity(self.session, self.ep, name)
                .map_err(rpc_failure),
        }
    }

    fn move_call(&self, subject: &Value, placement: &Placement, reference: &Value) -> PlannedCall {
        PlannedCall::new(
            Method::Move,
            Param::url(self.ep.item_url(subject))
                .with_move(placement.direction.as_str(), reference.clone()),
        )
    }

    fn commit_pending(&self) {
        if let Err(err) = self.store.commit(self.session, self.ep) {
            tracing::warn!(error = %err, "commit before move failed");
        }
    }
}
