//! Workspace transaction around one write.
//!
//! ```text
//! Idle ──lock?──► Locked ──mutate──► Mutated ──commit?──► Saved ──unlock?──► Done
//!   │               │                   │                   │
//!   └──lock fails───┴───mutation fails──┴───commit fails────┴───unlock fails──► Failed
//! ```
//!
//! Without locking the machine goes straight from `Idle` to `Mutated` to `Done`.
//! Every failure after the lock is taken attempts an unlock before reporting.
//! No step is retried and nothing is rolled back.

use fmr_rpc::{Endpoint, ObjectStore, Reply, RpcError, Session};

use crate::{Failure, FailureKind, TxnFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Locked,
    Mutated,
    Saved,
    Done,
    Failed,
}

pub struct Transaction<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    session: &'a Session,
    ep: &'a Endpoint,
    lock: bool,
    state: TxnState,
}

/// Transport errors become a failed reply so cleanup runs the same way.
fn settle(result: Result<Reply, RpcError>) -> (Reply, bool) {
    match result {
        Ok(reply) => (reply, false),
        Err(err) => (Reply::failed(err.to_string()), true),
    }
}

impl<'a, S: ObjectStore + ?Sized> Transaction<'a, S> {
    /// Take the workspace lock when `lock` is set.
    pub fn begin(
        store: &'a S,
        session: &'a Session,
        ep: &'a Endpoint,
        lock: bool,
    ) -> Result<Self, Failure> {
        let mut txn = Self {
            store,
            session,
            ep,
            lock,
            state: TxnState::Idle,
        };
        if !lock {
            return Ok(txn);
        }

        let (reply, transport) = settle(store.lock(session, ep));
        if !reply.is_ok() {
            tracing::warn!(adom = %ep.adom, code = reply.code, "workspace lock refused");
            let kind = if transport {
                FailureKind::Transport
            } else {
                FailureKind::Lock
            };
            return Err(Failure::new(
                kind,
                "unable to lock the configuration; check the ADOM is not currently locked",
            )
            .with_payload(reply.raw)
            .with_lock(TxnFlags::default()));
        }

        txn.state = TxnState::Locked;
        tracing::info!(adom = %ep.adom, "workspace locked");
        Ok(txn)
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Issue the write. A rejected write releases the lock and fails.
    pub fn mutate(
        &mut self,
        call: impl FnOnce(&S) -> Result<Reply, RpcError>,
    ) -> Result<Reply, Failure> {
        let (reply, transport) = settle(call(self.store));
        if reply.is_ok() {
            self.state = TxnState::Mutated;
            return Ok(reply);
        }

        self.state = TxnState::Failed;
        tracing::warn!(code = reply.code, message = %reply.message, "write rejected");
        let kind = if transport {
            FailureKind::Transport
        } else {
            FailureKind::Remote
        };

        if !self.lock {
            return Err(Failure::new(kind, reply.message.clone()).with_payload(reply.raw));
        }

        let unlocked = self.try_unlock();
        let msg = if unlocked {
            "write failed, not saved, workspace unlocked"
        } else {
            "write failed, not saved and unable to unlock"
        };
        Err(Failure::new(kind, msg)
            .with_payload(reply.raw)
            .with_lock(TxnFlags {
                locked: true,
                saved: false,
                unlocked,
            }))
    }

    /// Extra call inside the bracket whose outcome does not decide success.
    pub fn follow_up(&self, what: &str, call: impl FnOnce(&S) -> Result<Reply, RpcError>) {
        let (reply, _) = settle(call(self.store));
        if !reply.is_ok() {
            tracing::warn!(step = what, code = reply.code, message = %reply.message, "follow-up call failed");
        }
    }

    /// Commit and release. Flags are all false when no lock was requested.
    pub fn finish(mut self) -> Result<TxnFlags, Failure> {
        if !self.lock {
            self.state = TxnState::Done;
            return Ok(TxnFlags::default());
        }

        let (saved, _) = settle(self.store.commit(self.session, self.ep));
        if !saved.is_ok() {
            self.state = TxnState::Failed;
            tracing::warn!(code = saved.code, "workspace commit refused");
            let unlocked = self.try_unlock();
            let msg = if unlocked {
                "changes applied, unable to save, workspace unlocked"
            } else {
                "changes applied, but unable to save or unlock"
            };
            return Err(Failure::new(FailureKind::Save, msg)
                .with_payload(saved.raw)
                .with_lock(TxnFlags {
                    locked: true,
                    saved: false,
                    unlocked,
                }));
        }
        self.state = TxnState::Saved;

        let (released, _) = settle(self.store.unlock(self.session, self.ep));
        if !released.is_ok() {
            self.state = TxnState::Failed;
            tracing::warn!(code = released.code, "workspace unlock refused");
            return Err(
                Failure::new(FailureKind::Unlock, "changes saved, but unable to unlock")
                    .with_payload(released.raw)
                    .with_lock(TxnFlags {
                        locked: true,
                        saved: true,
                        unlocked: false,
                    }),
            );
        }

        self.state = TxnState::Done;
        tracing::info!(adom = %self.ep.adom, "workspace saved and unlocked");
        Ok(TxnFlags::ALL)
    }

    fn try_unlock(&self) -> bool {
        let (reply, _) = settle(self.store.unlock(self.session, self.ep));
        if !reply.is_ok() {
            tracing::warn!(code = reply.code, "unlock after failure refused");
        }
        reply.is_ok()
    }
}
