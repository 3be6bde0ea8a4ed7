use super::{Caller, Context, log_failure, retry_on_conflict};
use crate::domain::events::DomainEvent;
use crate::domain::ids::{CheckInId, SalonId, UserId};
use crate::domain::ports::{Versioned, Write, WriteBatch};
use crate::domain::queue::{ActiveCheckIn, Closure, QueueItem, User};
use crate::domain::rules::{self, CheckoutDecision, QueuePolicy, Rejection};
use crate::error::{Result, SalonError};

/// What a customer gets back from a successful check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInReceipt {
    pub check_in_id: CheckInId,
    pub queue_position: u32,
    /// Minutes.
    pub estimated_wait_time: u32,
    pub ticket_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub queue_count: u32,
    /// The item had already been completed; nothing changed.
    pub already_closed: bool,
}

/// Walk-in queue operations: check-in, checkout and manual adjustment.
///
/// Each call is one read-decide-commit cycle. The queue count only ever
/// changes in the same batch as the queue item that justifies it.
pub struct QueueCoordinator {
    ctx: Context,
    policy: QueuePolicy,
    contention_retries: u32,
}

impl QueueCoordinator {
    pub fn new(ctx: Context, policy: QueuePolicy, contention_retries: u32) -> Self {
        Self {
            ctx,
            policy,
            contention_retries,
        }
    }

    pub async fn check_in(&self, caller: &Caller, salon_id: &SalonId) -> Result<CheckInReceipt> {
        let user_id = caller.user_id()?;
        let receipt = retry_on_conflict(self.contention_retries, "check_in", move || {
            self.try_check_in(user_id, salon_id)
        })
        .await
        .inspect_err(|err| log_failure("check_in", err))?;

        tracing::info!(
            salon = %salon_id,
            user = %user_id,
            ticket = receipt.ticket_number,
            position = receipt.queue_position,
            "checked in"
        );
        self.ctx
            .emit(DomainEvent::CheckedIn {
                salon_id: salon_id.clone(),
                user_id: user_id.clone(),
                check_in_id: receipt.check_in_id,
                queue_position: receipt.queue_position,
                ticket_number: receipt.ticket_number,
                estimated_wait_time: receipt.estimated_wait_time,
            })
            .await;
        Ok(receipt)
    }

    async fn try_check_in(&self, user_id: &UserId, salon_id: &SalonId) -> Result<CheckInReceipt> {
        let store = &self.ctx.store;
        let mut salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        let mut user = store
            .user(user_id)
            .await?
            .unwrap_or_else(|| Versioned::create(User::new(user_id.clone())));
        let last = store.latest_queue_item(salon_id, user_id).await?;
        let now = self.ctx.clock.now();

        let decision = rules::decide_check_in(&user, &salon, last.as_deref(), now, &self.policy)?;
        tracing::debug!(salon = %salon_id, user = %user_id, ?decision, "check-in accepted");

        let item = QueueItem::waiting(
            salon_id.clone(),
            user_id.clone(),
            now,
            decision.estimated_wait,
            decision.ticket_number,
        );
        let receipt = CheckInReceipt {
            check_in_id: item.id,
            queue_position: decision.queue_position,
            estimated_wait_time: decision.estimated_wait,
            ticket_number: decision.ticket_number,
        };

        salon.queue_count = salon.queue_count.saturating_add(1);
        salon.daily_queue_counter = decision.ticket_number;
        salon.last_reset_date = Some(now.date_naive());
        user.active_check_in = Some(ActiveCheckIn {
            shop_id: salon_id.clone(),
            check_in_id: item.id,
            since: now,
        });

        let mut batch = WriteBatch::new();
        batch
            .put(Write::QueueItem(Versioned::create(item)))
            .put(Write::Salon(salon))
            .put(Write::User(user));
        store.commit(batch).await?;
        Ok(receipt)
    }

    pub async fn check_out(
        &self,
        caller: &Caller,
        salon_id: &SalonId,
        check_in_id: &CheckInId,
    ) -> Result<CheckoutReceipt> {
        let user_id = caller.user_id()?;
        let receipt = retry_on_conflict(self.contention_retries, "check_out", move || {
            self.try_check_out(user_id, salon_id, check_in_id)
        })
        .await
        .inspect_err(|err| log_failure("check_out", err))?;

        if receipt.already_closed {
            tracing::debug!(salon = %salon_id, check_in = %check_in_id, "check-in already closed");
        } else {
            tracing::info!(
                salon = %salon_id,
                user = %user_id,
                queue_count = receipt.queue_count,
                "checked out"
            );
            self.ctx
                .emit(DomainEvent::CheckedOut {
                    salon_id: salon_id.clone(),
                    user_id: user_id.clone(),
                    check_in_id: *check_in_id,
                    queue_count: receipt.queue_count,
                })
                .await;
        }
        Ok(receipt)
    }

    async fn try_check_out(
        &self,
        user_id: &UserId,
        salon_id: &SalonId,
        check_in_id: &CheckInId,
    ) -> Result<CheckoutReceipt> {
        let store = &self.ctx.store;
        let item = store.queue_item(salon_id, check_in_id).await?;
        let decision = rules::decide_checkout(item.as_deref(), user_id)?;
        let mut item = item.ok_or(Rejection::CheckInNotFound)?;
        let mut salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        let user = store.user(user_id).await?;

        let mut batch = WriteBatch::new();
        // The pointer only goes if it still refers to this item.
        if let Some(mut user) = user
            && user.release(item.id)
        {
            batch.put(Write::User(user));
        }

        let already_closed = decision == CheckoutDecision::AlreadyClosed;
        if !already_closed {
            item.complete(self.ctx.clock.now(), Closure::CheckedOut);
            // Clamped, unlike manual adjustment: see rules::clamped_queue_count.
            salon.queue_count = rules::clamped_queue_count(salon.queue_count, 1);
            batch.put(Write::QueueItem(item));
        }
        let queue_count = salon.queue_count;
        if !already_closed {
            batch.put(Write::Salon(salon));
        }

        if !batch.is_empty() {
            store.commit(batch).await?;
        }
        Ok(CheckoutReceipt {
            queue_count,
            already_closed,
        })
    }

    /// Staff or kiosk nudging the counter by one. Rejects rather than going
    /// below zero.
    pub async fn adjust_queue(
        &self,
        caller: &Caller,
        salon_id: &SalonId,
        delta: i32,
    ) -> Result<u32> {
        caller.user_id()?;
        if delta != 1 && delta != -1 {
            let err = SalonError::InvalidArgument(format!("delta must be +1 or -1, got {delta}"));
            log_failure("adjust_queue", &err);
            return Err(err);
        }

        let queue_count = retry_on_conflict(self.contention_retries, "adjust_queue", move || {
            self.try_adjust_queue(salon_id, delta)
        })
        .await
        .inspect_err(|err| log_failure("adjust_queue", err))?;

        tracing::info!(salon = %salon_id, delta, queue_count, "queue adjusted");
        self.ctx
            .emit(DomainEvent::QueueAdjusted {
                salon_id: salon_id.clone(),
                queue_count,
            })
            .await;
        Ok(queue_count)
    }

    async fn try_adjust_queue(&self, salon_id: &SalonId, delta: i32) -> Result<u32> {
        let store = &self.ctx.store;
        let mut salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        let queue_count = rules::decide_queue_adjustment(&salon, delta)?;
        salon.queue_count = queue_count;

        let mut batch = WriteBatch::new();
        batch.put(Write::Salon(salon));
        store.commit(batch).await?;
        Ok(queue_count)
    }
}
