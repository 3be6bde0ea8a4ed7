use super::{Caller, Context, log_failure, retry_on_conflict};
use crate::domain::events::DomainEvent;
use crate::domain::ids::{RatingId, SalonId, StylistId, UserId};
use crate::domain::ports::{Versioned, Write, WriteBatch};
use crate::domain::rating::{Rating, RatingScore};
use crate::domain::rules;
use crate::error::{Result, SalonError};

/// Stylist duty status and customer ratings, each kept in step with the
/// salon counters that summarise them.
pub struct DutyRatingTracker {
    ctx: Context,
    contention_retries: u32,
}

impl DutyRatingTracker {
    pub fn new(ctx: Context, contention_retries: u32) -> Self {
        Self {
            ctx,
            contention_retries,
        }
    }

    /// Sets the stylist's duty flag and echoes it back. Repeating the current
    /// state only refreshes `last_seen`.
    pub async fn toggle_duty(
        &self,
        caller: &Caller,
        salon_id: &SalonId,
        stylist_id: &StylistId,
        on_duty: bool,
    ) -> Result<bool> {
        caller.user_id()?;
        let (delta, on_duty_count) =
            retry_on_conflict(self.contention_retries, "toggle_duty", move || {
                self.try_toggle_duty(salon_id, stylist_id, on_duty)
            })
            .await
            .inspect_err(|err| log_failure("toggle_duty", err))?;

        if delta == 0 {
            tracing::debug!(salon = %salon_id, stylist = %stylist_id, on_duty, "duty unchanged");
        } else {
            tracing::info!(salon = %salon_id, stylist = %stylist_id, on_duty, on_duty_count, "duty changed");
            self.ctx
                .emit(DomainEvent::DutyChanged {
                    salon_id: salon_id.clone(),
                    stylist_id: stylist_id.clone(),
                    is_on_duty: on_duty,
                    on_duty_count,
                })
                .await;
        }
        Ok(on_duty)
    }

    async fn try_toggle_duty(
        &self,
        salon_id: &SalonId,
        stylist_id: &StylistId,
        on_duty: bool,
    ) -> Result<(i32, u32)> {
        let store = &self.ctx.store;
        let mut salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        let mut stylist = store
            .stylist(salon_id, stylist_id)
            .await?
            .ok_or_else(|| SalonError::not_found("stylist", stylist_id))?;

        let delta = rules::decide_duty_toggle(&stylist, on_duty);
        stylist.is_on_duty = on_duty;
        stylist.last_seen = Some(self.ctx.clock.now());

        let mut batch = WriteBatch::new();
        batch.put(Write::Stylist(stylist));
        if delta != 0 {
            salon.on_duty_count = rules::apply_duty_delta(salon.on_duty_count, delta);
            batch.put(Write::Salon(salon.clone()));
        }
        store.commit(batch).await?;
        Ok((delta, salon.on_duty_count))
    }

    /// Records a 1 to 5 star rating for the customer's earliest completed
    /// visit that has not been rated yet. The score is validated before
    /// anything is read.
    pub async fn submit_rating(
        &self,
        caller: &Caller,
        salon_id: &SalonId,
        rating: i64,
        review: Option<String>,
    ) -> Result<RatingId> {
        let user_id = caller.user_id()?;
        let score = RatingScore::new(rating).inspect_err(|err| log_failure("submit_rating", err))?;
        let review = review.filter(|text| !text.trim().is_empty());

        let rating_id = retry_on_conflict(self.contention_retries, "submit_rating", || {
            self.try_submit_rating(user_id, salon_id, score, review.clone())
        })
        .await
        .inspect_err(|err| log_failure("submit_rating", err))?;

        tracing::info!(salon = %salon_id, user = %user_id, score = score.value(), "rating submitted");
        self.ctx
            .emit(DomainEvent::RatingSubmitted {
                salon_id: salon_id.clone(),
                user_id: user_id.clone(),
                rating_id,
                score: score.value(),
            })
            .await;
        Ok(rating_id)
    }

    async fn try_submit_rating(
        &self,
        user_id: &UserId,
        salon_id: &SalonId,
        score: RatingScore,
        review: Option<String>,
    ) -> Result<RatingId> {
        let store = &self.ctx.store;
        let mut salon = store
            .salon(salon_id)
            .await?
            .ok_or_else(|| SalonError::not_found("salon", salon_id))?;
        let visits = store.user_queue_items(salon_id, user_id).await?;
        let docs: Vec<_> = visits.iter().map(|visit| visit.doc.clone()).collect();
        let check_in_id = rules::decide_rating_eligibility(&docs)?.id;
        let mut visit = visits
            .into_iter()
            .find(|visit| visit.id == check_in_id)
            .ok_or_else(|| SalonError::not_found("check-in", check_in_id))?;
        visit.rated = true;

        let rating = Rating {
            id: RatingId::generate(),
            salon_id: salon_id.clone(),
            user_id: user_id.clone(),
            check_in_id,
            score,
            review,
            created_at: self.ctx.clock.now(),
        };
        let rating_id = rating.id;
        salon.rating_count = salon.rating_count.saturating_add(1);
        salon.rating_total = salon.rating_total.saturating_add(u32::from(score.value()));

        let mut batch = WriteBatch::new();
        batch
            .put(Write::Rating(Versioned::create(rating)))
            .put(Write::QueueItem(visit))
            .put(Write::Salon(salon));
        store.commit(batch).await?;
        Ok(rating_id)
    }
}
