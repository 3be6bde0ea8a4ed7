use super::ids::{CheckInId, SalonId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,
    Completed,
}

/// How a queue item left the `waiting` state.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    CheckedOut,
    AutoCheckout,
}

/// One ticket in a salon's walk-in queue. Never deleted; completed items
/// remain as visit history (and as rating eligibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: CheckInId,
    pub salon_id: SalonId,
    pub user_id: UserId,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub closure: Option<Closure>,
    /// Minutes, as estimated at check-in.
    pub estimated_wait_time: u32,
    /// Daily ticket number shown to the customer.
    pub queue_number: u32,
    /// Set once the visit has been rated.
    #[serde(default)]
    pub rated: bool,
}

impl QueueItem {
    pub fn waiting(
        salon_id: SalonId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        estimated_wait_time: u32,
        queue_number: u32,
    ) -> Self {
        Self {
            id: CheckInId::generate(),
            salon_id,
            user_id,
            status: QueueStatus::Waiting,
            created_at,
            completed_at: None,
            closure: None,
            estimated_wait_time,
            queue_number,
            rated: false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == QueueStatus::Waiting
    }

    pub fn complete(&mut self, at: DateTime<Utc>, closure: Closure) {
        self.status = QueueStatus::Completed;
        self.completed_at = Some(at);
        self.closure = Some(closure);
    }
}

/// Pointer from a user to their one live queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCheckIn {
    pub shop_id: SalonId,
    pub check_in_id: CheckInId,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Single-active-session lock. Set iff a `waiting` item exists at
    /// `shop_id`/`check_in_id`.
    pub active_check_in: Option<ActiveCheckIn>,
    pub loyalty_points: u32,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            active_check_in: None,
            loyalty_points: 0,
        }
    }

    /// Clears the lock if it points at `check_in_id`; returns whether it did.
    pub fn release(&mut self, check_in_id: CheckInId) -> bool {
        match &self.active_check_in {
            Some(active) if active.check_in_id == check_in_id => {
                self.active_check_in = None;
                true
            }
            _ => false,
        }
    }
}
