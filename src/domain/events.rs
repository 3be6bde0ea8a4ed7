use super::appointment::Appointment;
use super::ids::{CheckInId, RatingId, SalonId, StylistId, UserId};
use serde::Serialize;

/// Emitted after a state transition has been committed. Consumers
/// (notification dispatch, dashboards) treat these as at-most-once hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    CheckedIn {
        salon_id: SalonId,
        user_id: UserId,
        check_in_id: CheckInId,
        queue_position: u32,
        ticket_number: u32,
        estimated_wait_time: u32,
    },
    CheckedOut {
        salon_id: SalonId,
        user_id: UserId,
        check_in_id: CheckInId,
        queue_count: u32,
    },
    QueueAdjusted {
        salon_id: SalonId,
        queue_count: u32,
    },
    AutoCheckedOut {
        salon_id: SalonId,
        closed: usize,
        queue_count: u32,
    },
    DutyChanged {
        salon_id: SalonId,
        stylist_id: StylistId,
        is_on_duty: bool,
        on_duty_count: u32,
    },
    RatingSubmitted {
        salon_id: SalonId,
        user_id: UserId,
        rating_id: RatingId,
        score: u8,
    },
    AppointmentsConfirmed {
        appointments: Vec<Appointment>,
    },
    AppointmentCancelled {
        appointment: Appointment,
    },
    AppointmentCompleted {
        appointment: Appointment,
        points_awarded: Option<u32>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckedIn { .. } => "checked_in",
            Self::CheckedOut { .. } => "checked_out",
            Self::QueueAdjusted { .. } => "queue_adjusted",
            Self::AutoCheckedOut { .. } => "auto_checked_out",
            Self::DutyChanged { .. } => "duty_changed",
            Self::RatingSubmitted { .. } => "rating_submitted",
            Self::AppointmentsConfirmed { .. } => "appointments_confirmed",
            Self::AppointmentCancelled { .. } => "appointment_cancelled",
            Self::AppointmentCompleted { .. } => "appointment_completed",
        }
    }
}
