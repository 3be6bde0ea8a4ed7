use super::ids::{SalonId, ServiceId, StylistId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate root for one physical salon.
///
/// `queue_count`, `on_duty_count` and the rating totals are derived counters.
/// They are only ever written in the same batch as the documents they
/// summarise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Salon {
    pub id: SalonId,
    pub name: String,
    pub address: String,
    /// Number of queue items currently `waiting`.
    pub queue_count: u32,
    /// Number of stylists with `is_on_duty`.
    pub on_duty_count: u32,
    /// Minutes per customer; `None` or zero falls back to the policy default.
    pub average_service_time: Option<u32>,
    /// Last ticket number handed out on `last_reset_date`.
    pub daily_queue_counter: u32,
    pub last_reset_date: Option<NaiveDate>,
    /// Walk-in check-ins allowed.
    pub accepts_bookings: bool,
    /// Timed appointments allowed.
    pub accepts_appointments: bool,
    pub rating_count: u32,
    pub rating_total: u32,
}

impl Salon {
    pub fn new(id: SalonId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            queue_count: 0,
            on_duty_count: 0,
            average_service_time: None,
            daily_queue_counter: 0,
            last_reset_date: None,
            accepts_bookings: true,
            accepts_appointments: true,
            rating_count: 0,
            rating_total: 0,
        }
    }

    /// Minutes per customer, using `fallback` when the salon has none set.
    pub fn service_minutes(&self, fallback: u32) -> u32 {
        match self.average_service_time {
            Some(minutes) if minutes > 0 => minutes,
            _ => fallback,
        }
    }

    pub fn average_rating(&self) -> Option<f64> {
        (self.rating_count > 0).then(|| f64::from(self.rating_total) / f64::from(self.rating_count))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stylist {
    pub id: StylistId,
    pub salon_id: SalonId,
    pub name: String,
    /// Employed and bookable. Independent of duty.
    pub active: bool,
    pub is_on_duty: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Stylist {
    pub fn new(id: StylistId, salon_id: SalonId, name: impl Into<String>) -> Self {
        Self {
            id,
            salon_id,
            name: name.into(),
            active: true,
            is_on_duty: false,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub salon_id: SalonId,
    pub name: String,
    pub price: Decimal,
    pub duration_min: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_minutes_fallback() {
        let mut salon = Salon::new("s1".into(), "Shears", "1 Main St");
        assert_eq!(salon.service_minutes(15), 15);

        salon.average_service_time = Some(0);
        assert_eq!(salon.service_minutes(15), 15);

        salon.average_service_time = Some(25);
        assert_eq!(salon.service_minutes(15), 25);
    }

    #[test]
    fn test_average_rating() {
        let mut salon = Salon::new("s1".into(), "Shears", "1 Main St");
        assert_eq!(salon.average_rating(), None);

        salon.rating_count = 2;
        salon.rating_total = 9;
        assert_eq!(salon.average_rating(), Some(4.5));
    }
}
