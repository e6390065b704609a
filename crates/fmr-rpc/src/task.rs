//! Waiting on long-running manager tasks.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::{InstallRequest, ObjectStore, Reply, RpcError, Session};

/// Fixed-interval wait loop bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

    pub fn minutes(budget_minutes: u64) -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            budget: Duration::from_secs(budget_minutes.saturating_mul(60)),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for PollPolicy {
    /// Ten minutes, matching what package installs usually need.
    fn default() -> Self {
        Self::minutes(10)
    }
}

fn percent(reply: &Reply) -> Option<i64> {
    if !reply.is_ok() {
        return None;
    }
    reply.data.get("percent").and_then(Value::as_i64)
}

/// Poll `task/task/{id}` until it reports 100 percent or the budget is spent.
///
/// Running out of budget is not an error: the last observed reply is returned
/// and the caller reads `data.percent` itself.
pub fn poll_task<S: ObjectStore + ?Sized>(
    store: &S,
    session: &Session,
    task: &Value,
    policy: &PollPolicy,
) -> Result<Reply, RpcError> {
    let started = Instant::now();
    loop {
        let reply = store.task_status(session, task)?;
        let pct = percent(&reply);
        tracing::debug!(task = %task, percent = ?pct, "task poll");

        if pct == Some(100) {
            return Ok(reply);
        }
        if started.elapsed() + policy.interval > policy.budget {
            tracing::warn!(task = %task, percent = ?pct, "task wait budget exhausted");
            return Ok(reply);
        }
        std::thread::sleep(policy.interval);
    }
}

/// Submit a package install and wait for its task.
///
/// A rejected submit is returned unchanged; otherwise the final task reply.
pub fn install_and_wait<S: ObjectStore + ?Sized>(
    store: &S,
    session: &Session,
    req: &InstallRequest,
    policy: &PollPolicy,
) -> Result<Reply, RpcError> {
    let submitted = store.install_package(session, req)?;
    if !submitted.is_ok() {
        return Ok(submitted);
    }

    let task = submitted
        .data
        .get("task")
        .cloned()
        .ok_or_else(|| RpcError::Decode("install reply has no data.task".to_string()))?;

    tracing::info!(adom = %req.adom, package = %req.package, task = %task, "package install submitted");
    poll_task(store, session, &task, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_budget_converts_to_seconds() {
        assert_eq!(PollPolicy::minutes(10).budget, Duration::from_secs(600));
    }

    #[test]
    fn huge_minutes_budget_saturates() {
        assert_eq!(PollPolicy::minutes(u64::MAX).budget, Duration::from_secs(u64::MAX));
    }
}
