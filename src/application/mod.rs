//! Application layer orchestrating the business rules against the store.
//!
//! Every operation follows the same shape: read the documents it needs,
//! ask `domain::rules` for a decision, and on acceptance commit a single
//! `WriteBatch`. A batch that loses an optimistic-concurrency race is re-run
//! from the reads; nothing is ever partially applied. Domain events are
//! published only after the batch has committed.

pub mod engine;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod sweep;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

use crate::domain::events::DomainEvent;
use crate::domain::ids::UserId;
use crate::domain::ports::{SharedClock, SharedEventSink, SharedStore};
use crate::error::{Result, SalonError};
use std::future::Future;

/// Identity the caller boundary (auth layer) attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(UserId),
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(UserId::new(id))
    }

    pub fn user_id(&self) -> Result<&UserId> {
        match self {
            Self::User(id) => Ok(id),
            Self::Anonymous => Err(SalonError::Unauthenticated),
        }
    }
}

/// Collaborators every service shares.
#[derive(Clone)]
pub struct Context {
    pub store: SharedStore,
    pub events: SharedEventSink,
    pub clock: SharedClock,
}

impl Context {
    pub fn new(store: SharedStore, events: SharedEventSink, clock: SharedClock) -> Self {
        Self {
            store,
            events,
            clock,
        }
    }

    /// Best-effort: a failed publish is logged and never undoes the commit.
    pub(crate) async fn emit(&self, event: DomainEvent) {
        let name = event.name();
        if let Err(err) = self.events.publish(event).await {
            tracing::warn!(event = name, error = %err, "failed to publish domain event");
        }
    }
}

/// Re-runs `attempt` while the store reports a conflicting concurrent write,
/// at most `retries` extra times. Any other outcome is returned as is.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut conflicts = 0;
    loop {
        match attempt().await {
            Err(SalonError::Conflict { collection, key }) if conflicts < retries => {
                conflicts += 1;
                tracing::debug!(
                    operation,
                    collection,
                    %key,
                    conflicts,
                    "concurrent modification, retrying"
                );
            }
            result => return result,
        }
    }
}

/// Logs a failed operation at the level its category deserves.
pub(crate) fn log_failure(operation: &'static str, err: &SalonError) {
    if err.is_rejection() {
        tracing::info!(operation, code = err.code(), reason = %err, "operation rejected");
    } else {
        tracing::warn!(
            operation,
            code = err.code(),
            category = %err.category(),
            error = %err,
            "operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> SalonError {
        SalonError::Conflict {
            collection: "salons",
            key: "s1".into(),
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict(5, "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict(2, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;
        assert!(matches!(result, Err(SalonError::Conflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict(5, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SalonError::Unavailable("down".into()))
        })
        .await;
        assert!(matches!(result, Err(SalonError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_anonymous_caller_is_unauthenticated() {
        assert!(matches!(
            Caller::Anonymous.user_id(),
            Err(SalonError::Unauthenticated)
        ));
        assert_eq!(Caller::user("u1").user_id().unwrap().as_str(), "u1");
    }
}
