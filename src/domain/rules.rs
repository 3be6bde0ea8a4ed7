//! Business rules for the queue and appointment state machine.
//!
//! Everything here is pure: given the current documents and a requested
//! action, each `decide_*` function either accepts (returning what the new
//! state should be) or rejects with a [`Rejection`]. The application layer
//! turns accepted decisions into one atomic write batch.

use super::appointment::{Appointment, AppointmentStatus, StylistChoice};
use super::queue::{QueueItem, QueueStatus, User};
use super::salon::{Salon, Stylist};
use crate::error::ErrorCategory;
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use thiserror::Error;

/// A business-rule violation. Expected and user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("an active check-in already exists for this user")]
    ActiveCheckIn,
    #[error("checked in too recently, retry in {remaining_secs}s")]
    Cooldown { remaining_secs: i64 },
    #[error("salon is not accepting walk-ins")]
    SalonClosed,
    #[error("queue count cannot go below zero")]
    QueueNegative,
    #[error("check-in not found")]
    CheckInNotFound,
    #[error("check-in belongs to another user")]
    NotCheckInOwner,
    #[error("no unrated completed visit at this salon")]
    NoCompletedVisit,
    #[error("slot {time} is already taken for {stylist}")]
    SlotTaken {
        time: NaiveTime,
        stylist: StylistChoice,
    },
    #[error("salon is not accepting appointments")]
    AppointmentsDisabled,
    #[error("appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ActiveCheckIn => "ERR_ACTIVE_CHECKIN",
            Self::Cooldown { .. } => "ERR_COOLDOWN",
            Self::SalonClosed => "ERR_SALON_CLOSED",
            Self::QueueNegative => "ERR_QUEUE_NEGATIVE",
            Self::CheckInNotFound => "ERR_NOT_FOUND",
            Self::NotCheckInOwner => "ERR_PERMISSION_DENIED",
            Self::NoCompletedVisit => "ERR_NO_COMPLETED_VISIT",
            Self::SlotTaken { .. } => "ERR_SLOT_TAKEN",
            Self::AppointmentsDisabled => "ERR_APPOINTMENTS_DISABLED",
            Self::InvalidTransition { .. } => "ERR_INVALID_TRANSITION",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CheckInNotFound => ErrorCategory::NotFound,
            Self::NotCheckInOwner => ErrorCategory::PermissionDenied,
            _ => ErrorCategory::FailedPrecondition,
        }
    }
}

/// Tunables for the walk-in queue rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// Minimum spacing between two check-ins by one user at one salon.
    pub cooldown: TimeDelta,
    /// Minutes per customer when the salon has no average configured.
    pub default_service_minutes: u32,
    /// Waiting items older than this are closed by the sweep.
    pub stale_after: TimeDelta,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::seconds(20),
            default_service_minutes: 15,
            stale_after: TimeDelta::hours(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInDecision {
    /// Minutes.
    pub estimated_wait: u32,
    pub ticket_number: u32,
    /// 1-based place in line at the moment of check-in.
    pub queue_position: u32,
}

/// Decides whether `user` may join `salon`'s queue at `now`.
///
/// `last_check_in` is the user's most recent queue item at this salon,
/// whatever its status.
pub fn decide_check_in(
    user: &User,
    salon: &Salon,
    last_check_in: Option<&QueueItem>,
    now: DateTime<Utc>,
    policy: &QueuePolicy,
) -> Result<CheckInDecision, Rejection> {
    if user.active_check_in.is_some() {
        return Err(Rejection::ActiveCheckIn);
    }

    if let Some(last) = last_check_in {
        let elapsed = now - last.created_at;
        if elapsed < policy.cooldown {
            let remaining = policy.cooldown - elapsed;
            // Round up so a caller never retries a moment too early.
            let remaining_secs = (remaining.num_milliseconds() + 999) / 1000;
            return Err(Rejection::Cooldown { remaining_secs });
        }
    }

    if !salon.accepts_bookings {
        return Err(Rejection::SalonClosed);
    }

    let ticket_number = if salon.last_reset_date == Some(now.date_naive()) {
        salon.daily_queue_counter.saturating_add(1)
    } else {
        1
    };

    Ok(CheckInDecision {
        estimated_wait: salon
            .queue_count
            .saturating_mul(salon.service_minutes(policy.default_service_minutes)),
        ticket_number,
        queue_position: salon.queue_count.saturating_add(1),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutDecision {
    /// Mark the item completed and decrement the queue.
    Close,
    /// Item already completed; nothing to change.
    AlreadyClosed,
}

pub fn decide_checkout(
    check_in: Option<&QueueItem>,
    requesting_user: &super::ids::UserId,
) -> Result<CheckoutDecision, Rejection> {
    let check_in = check_in.ok_or(Rejection::CheckInNotFound)?;
    if &check_in.user_id != requesting_user {
        return Err(Rejection::NotCheckInOwner);
    }
    Ok(match check_in.status {
        QueueStatus::Waiting => CheckoutDecision::Close,
        QueueStatus::Completed => CheckoutDecision::AlreadyClosed,
    })
}

/// Manual queue control rejects instead of clamping.
pub fn decide_queue_adjustment(salon: &Salon, delta: i32) -> Result<u32, Rejection> {
    let new_count = i64::from(salon.queue_count) + i64::from(delta);
    u32::try_from(new_count).map_err(|_| Rejection::QueueNegative)
}

/// Queue count after `closed` items leave through checkout or the sweep.
///
/// Clamped at zero rather than rejected; this path must never fail once the
/// item itself has been closed. [`decide_queue_adjustment`] deliberately
/// rejects instead.
pub fn clamped_queue_count(current: u32, closed: usize) -> u32 {
    current.saturating_sub(u32::try_from(closed).unwrap_or(u32::MAX))
}

/// Change to `on_duty_count`: +1, -1, or 0 when already in that state.
pub fn decide_duty_toggle(stylist: &Stylist, requested_on_duty: bool) -> i32 {
    match (stylist.is_on_duty, requested_on_duty) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

pub fn apply_duty_delta(count: u32, delta: i32) -> u32 {
    count.saturating_add_signed(delta)
}

/// Picks the visit a new rating applies to: the earliest completed visit not
/// yet rated. Each completed visit can be rated once.
pub fn decide_rating_eligibility(prior_check_ins: &[QueueItem]) -> Result<&QueueItem, Rejection> {
    prior_check_ins
        .iter()
        .filter(|item| item.status == QueueStatus::Completed && !item.rated)
        .min_by_key(|item| item.created_at)
        .ok_or(Rejection::NoCompletedVisit)
}

/// Checks one slot against the appointments already on the books that day.
///
/// A named stylist is blocked by any live appointment at `time` for the same
/// stylist or for `Any`; unassigned bookings block every stylist. An `Any`
/// request is blocked once the live appointments at `time` fill every active
/// stylist, or the single chair of a solo operator.
pub fn decide_appointment_slot(
    existing: &[Appointment],
    stylist: &StylistChoice,
    time: NaiveTime,
    total_active_stylists: usize,
) -> Result<(), Rejection> {
    let mut at_slot = existing
        .iter()
        .filter(|appointment| appointment.is_active() && appointment.time == time);

    let taken = match stylist {
        StylistChoice::Stylist(_) => at_slot.any(|appointment| {
            appointment.stylist == StylistChoice::Any || &appointment.stylist == stylist
        }),
        StylistChoice::Any => at_slot.count() >= total_active_stylists.max(1),
    };

    if taken {
        Err(Rejection::SlotTaken {
            time,
            stylist: stylist.clone(),
        })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    /// Already in the requested terminal state.
    NoOp,
}

/// `booked -> completed` and `booked -> cancelled`; terminal states never revert.
pub fn decide_appointment_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<Transition, Rejection> {
    match (from, to) {
        (AppointmentStatus::Booked, AppointmentStatus::Completed)
        | (AppointmentStatus::Booked, AppointmentStatus::Cancelled) => Ok(Transition::Apply),
        (from, to) if from == to && from.is_terminal() => Ok(Transition::NoOp),
        (from, to) => Err(Rejection::InvalidTransition { from, to }),
    }
}

/// Waiting items that have been in line longer than `stale_after`.
pub fn select_stale<'a, I>(items: I, now: DateTime<Utc>, stale_after: TimeDelta) -> Vec<&'a QueueItem>
where
    I: IntoIterator<Item = &'a QueueItem>,
{
    items
        .into_iter()
        .filter(|item| item.is_waiting() && now - item.created_at > stale_after)
        .collect()
}
