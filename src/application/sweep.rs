use super::Context;
use crate::domain::events::DomainEvent;
use crate::domain::ids::SalonId;
use crate::domain::ports::{Write, WriteBatch};
use crate::domain::queue::{Closure, QueueStatus};
use crate::domain::rules::{self, QueuePolicy};
use crate::error::{Result, SalonError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one sweep over every salon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items auto-closed per salon; salons with nothing stale are absent.
    pub closed: BTreeMap<SalonId, usize>,
    /// Salons whose batch still failed after every attempt.
    pub failed: Vec<SalonId>,
}

impl SweepReport {
    pub fn total_closed(&self) -> usize {
        self.closed.values().sum()
    }
}

/// Closes waiting queue items nobody checked out.
///
/// Each salon is handled in its own batch, which reads the queue count fresh
/// and commits the closures, the pointer releases and the decrement together.
/// A failing salon is retried on its own and never stops the others.
pub struct AutoCheckoutSweep {
    ctx: Context,
    policy: QueuePolicy,
    retry_attempts: u32,
}

impl AutoCheckoutSweep {
    pub fn new(ctx: Context, policy: QueuePolicy, retry_attempts: u32) -> Self {
        Self {
            ctx,
            policy,
            retry_attempts,
        }
    }

    pub async fn run(&self) -> Result<SweepReport> {
        let salon_ids = self.ctx.store.salon_ids().await?;
        let mut report = SweepReport::default();

        for salon_id in salon_ids {
            match self.sweep_with_retry(&salon_id).await {
                Ok(0) => {}
                Ok(closed) => {
                    report.closed.insert(salon_id, closed);
                }
                Err(err) => {
                    tracing::warn!(salon = %salon_id, error = %err, "auto-checkout failed");
                    report.failed.push(salon_id);
                }
            }
        }

        tracing::info!(
            closed = report.total_closed(),
            salons = report.closed.len(),
            failed = report.failed.len(),
            "auto-checkout sweep finished"
        );
        Ok(report)
    }

    async fn sweep_with_retry(&self, salon_id: &SalonId) -> Result<usize> {
        let attempts = self.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.sweep_salon(salon_id).await {
                Err(err @ (SalonError::Conflict { .. } | SalonError::Unavailable(_)))
                    if attempt < attempts =>
                {
                    tracing::debug!(salon = %salon_id, attempt, error = %err, "retrying salon sweep");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn sweep_salon(&self, salon_id: &SalonId) -> Result<usize> {
        let store = &self.ctx.store;
        let now = self.ctx.clock.now();
        let waiting = store.queue_items(salon_id, Some(QueueStatus::Waiting)).await?;
        let stale: HashSet<_> = rules::select_stale(
            waiting.iter().map(|item| &item.doc),
            now,
            self.policy.stale_after,
        )
        .into_iter()
        .map(|item| item.id)
        .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let Some(mut salon) = store.salon(salon_id).await? else {
            return Ok(0);
        };

        let mut batch = WriteBatch::new();
        for mut item in waiting.into_iter().filter(|item| stale.contains(&item.id)) {
            if let Some(mut user) = store.user(&item.user_id).await?
                && user.release(item.id)
            {
                batch.put(Write::User(user));
            }
            item.complete(now, Closure::AutoCheckout);
            batch.put(Write::QueueItem(item));
        }

        let closed = stale.len();
        salon.queue_count = rules::clamped_queue_count(salon.queue_count, closed);
        let queue_count = salon.queue_count;
        batch.put(Write::Salon(salon));
        store.commit(batch).await?;

        tracing::info!(salon = %salon_id, closed, queue_count, "auto-checked out stale check-ins");
        self.ctx
            .emit(DomainEvent::AutoCheckedOut {
                salon_id: salon_id.clone(),
                closed,
                queue_count,
            })
            .await;
        Ok(closed)
    }
}

/// Runs the sweep every `period` until the handle is aborted. The first run
/// happens one full period after spawning.
pub fn spawn_sweeper(sweep: Arc<AutoCheckoutSweep>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep.run().await {
                tracing::error!(error = %err, "auto-checkout sweep failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::Fixture;
    use crate::domain::ports::DocumentStore;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_sweep_closes_stale_items() {
        let fx = Fixture::new().await;
        let stale = fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(4));
        let fresh = fx.engine.queue.check_in(&fx.bob(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(1));
        fx.drain_events();

        let report = fx.engine.sweep.run().await.unwrap();
        assert_eq!(report.closed.get(&fx.salon_id()), Some(&1));
        assert!(report.failed.is_empty());
        assert_eq!(fx.salon().await.queue_count, 1);

        let item = fx
            .store
            .queue_item(&fx.salon_id(), &stale.check_in_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.closure, Some(Closure::AutoCheckout));
        let item = fx
            .store
            .queue_item(&fx.salon_id(), &fresh.check_in_id)
            .await
            .unwrap()
            .unwrap();
        assert!(item.is_waiting());

        let alice = fx.store.user(&"alice".into()).await.unwrap().unwrap();
        assert!(alice.active_check_in.is_none());
        let bob = fx.store.user(&"bob".into()).await.unwrap().unwrap();
        assert!(bob.active_check_in.is_some());

        assert!(matches!(
            fx.next_event(),
            Some(DomainEvent::AutoCheckedOut { closed: 1, queue_count: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(5));

        assert_eq!(fx.engine.sweep.run().await.unwrap().total_closed(), 1);
        fx.drain_events();

        let again = fx.engine.sweep.run().await.unwrap();
        assert_eq!(again, SweepReport::default());
        assert_eq!(fx.salon().await.queue_count, 0);
        assert!(fx.next_event().is_none());
    }

    #[tokio::test]
    async fn test_exactly_at_threshold_is_not_stale() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(4));

        assert_eq!(fx.engine.sweep.run().await.unwrap().total_closed(), 0);
        assert_eq!(fx.salon().await.queue_count, 1);
    }

    #[tokio::test]
    async fn test_decrement_clamps_at_zero() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.engine.queue.adjust_queue(&fx.staff(), &fx.salon_id(), -1).await.unwrap();
        fx.clock.advance(TimeDelta::hours(5));

        assert_eq!(fx.engine.sweep.run().await.unwrap().total_closed(), 1);
        assert_eq!(fx.salon().await.queue_count, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(5));
        fx.store.fail_next_commits(2);

        let report = fx.engine.sweep.run().await.unwrap();
        assert_eq!(report.total_closed(), 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_failing_salon_does_not_block_others() {
        let fx = Fixture::new().await;
        fx.register_second_salon().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.engine.queue.check_in(&fx.bob(), &"uptown".into()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(5));
        // Salons sweep in id order: every attempt for "downtown" fails.
        fx.store.fail_next_commits(3);

        let report = fx.engine.sweep.run().await.unwrap();
        assert_eq!(report.failed, vec![fx.salon_id()]);
        assert_eq!(report.closed.get(&SalonId::from("uptown")), Some(&1));
        assert_eq!(fx.salon().await.queue_count, 1);
        assert_eq!(fx.salon_of("uptown").await.queue_count, 0);

        // The next run picks up what was left behind.
        let report = fx.engine.sweep.run().await.unwrap();
        assert_eq!(report.closed.get(&fx.salon_id()), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::hours(5));

        let handle = fx.engine.spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.salon().await.queue_count, 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fx.salon().await.queue_count, 0);
        handle.abort();
    }
}
