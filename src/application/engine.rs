use super::queue::QueueCoordinator;
use super::registry::register_salon;
use super::scheduler::AppointmentScheduler;
use super::sweep::{AutoCheckoutSweep, spawn_sweeper};
use super::tracker::DutyRatingTracker;
use super::Context;
use crate::config::{SalonProfile, Settings};
use crate::domain::ids::{SalonId, StylistId};
use crate::domain::ports::{SharedClock, SharedEventSink, SharedStore};
use crate::domain::queue::{QueueItem, QueueStatus};
use crate::domain::salon::Salon;
use crate::error::{Result, SalonError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Read-only view of one salon for dashboards and the command script.
#[derive(Debug, Clone, PartialEq)]
pub struct SalonSnapshot {
    pub salon: Salon,
    /// Oldest first.
    pub waiting: Vec<QueueItem>,
    pub on_duty: Vec<StylistId>,
}

/// The main entry point of the salon core.
///
/// `SalonEngine` wires the queue coordinator, the appointment scheduler, the
/// duty and rating tracker and the auto-checkout sweep to one shared store,
/// event sink and clock.
pub struct SalonEngine {
    pub queue: QueueCoordinator,
    pub appointments: AppointmentScheduler,
    pub staff: DutyRatingTracker,
    pub sweep: Arc<AutoCheckoutSweep>,
    store: SharedStore,
}

impl SalonEngine {
    /// Creates a new `SalonEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Durable store every service reads and commits through.
    /// * `events` - Where domain events go after a successful commit.
    /// * `clock` - Source of server timestamps.
    /// * `settings` - Queue policy, retry budgets and loyalty award.
    pub fn new(
        store: SharedStore,
        events: SharedEventSink,
        clock: SharedClock,
        settings: &Settings,
    ) -> Self {
        let ctx = Context::new(store.clone(), events, clock);
        let policy = settings.queue_policy();
        let retries = settings.queue.contention_retries;

        Self {
            queue: QueueCoordinator::new(ctx.clone(), policy, retries),
            appointments: AppointmentScheduler::new(
                ctx.clone(),
                settings.appointments.loyalty_points,
                retries,
            ),
            staff: DutyRatingTracker::new(ctx.clone(), retries),
            sweep: Arc::new(AutoCheckoutSweep::new(
                ctx,
                policy,
                settings.sweep.retry_attempts,
            )),
            store,
        }
    }

    /// Registers `profile` unless a salon with its id already exists.
    /// Returns whether it was created.
    pub async fn register(&self, profile: &SalonProfile) -> Result<bool> {
        match register_salon(self.store.as_ref(), profile).await {
            Ok(_) => Ok(true),
            Err(SalonError::Conflict { .. }) => {
                tracing::debug!(salon = %profile.id, "salon already registered");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn snapshot(&self, salon_id: &SalonId) -> Result<SalonSnapshot> {
        let salon = self
            .store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?
            .into_inner();
        let waiting = self
            .store
            .queue_items(salon_id, Some(QueueStatus::Waiting))
            .await?
            .into_iter()
            .map(|item| item.into_inner())
            .collect();
        let on_duty = self
            .store
            .stylists(salon_id)
            .await?
            .into_iter()
            .filter(|stylist| stylist.is_on_duty)
            .map(|stylist| stylist.into_inner().id)
            .collect();

        Ok(SalonSnapshot {
            salon,
            waiting,
            on_duty,
        })
    }

    /// Starts the periodic auto-checkout sweep on the current runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        spawn_sweeper(Arc::clone(&self.sweep), period)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::Fixture;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_register_is_skipped_when_present() {
        let fx = Fixture::new().await;
        let profile = fx.settings.salons[0].clone();
        assert!(!fx.engine.register(&profile).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_queue_and_duty() {
        let fx = Fixture::new().await;
        fx.engine.queue.check_in(&fx.alice(), &fx.salon_id()).await.unwrap();
        fx.clock.advance(TimeDelta::minutes(1));
        fx.engine.queue.check_in(&fx.bob(), &fx.salon_id()).await.unwrap();
        fx.engine
            .staff
            .toggle_duty(&fx.staff(), &fx.salon_id(), &"leo".into(), true)
            .await
            .unwrap();

        let snapshot = fx.engine.snapshot(&fx.salon_id()).await.unwrap();
        assert_eq!(snapshot.salon.queue_count, 2);
        assert_eq!(snapshot.waiting.len(), 2);
        assert_eq!(snapshot.waiting[0].user_id.as_str(), "alice");
        assert_eq!(snapshot.on_duty, vec![StylistId::from("leo")]);

        let err = fx.engine.snapshot(&"nowhere".into()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_NOT_FOUND");
    }
}
