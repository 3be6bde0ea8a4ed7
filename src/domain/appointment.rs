use super::ids::{AppointmentId, SalonId, ServiceId, StylistId, UserId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Booked)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Booked => "booked",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Who an appointment is assigned to. `Any` is the unassigned sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylistChoice {
    Any,
    Stylist(StylistId),
}

impl StylistChoice {
    /// Parses caller input, where an empty value or `any` means unassigned.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Any,
            Some(v) if v.eq_ignore_ascii_case("any") => Self::Any,
            Some(v) => Self::Stylist(StylistId::from(v)),
        }
    }
}

impl fmt::Display for StylistChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Stylist(id) => id.fmt(f),
        }
    }
}

/// One booked service. Carries a denormalised snapshot of the salon and
/// service so downstream notification never has to re-read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub salon_id: SalonId,
    pub salon_name: String,
    pub salon_address: String,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub service_name: String,
    pub stylist: StylistChoice,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub price: Decimal,
    pub duration_min: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylist_choice_parse() {
        assert_eq!(StylistChoice::parse(None), StylistChoice::Any);
        assert_eq!(StylistChoice::parse(Some(" ")), StylistChoice::Any);
        assert_eq!(StylistChoice::parse(Some("ANY")), StylistChoice::Any);
        assert_eq!(
            StylistChoice::parse(Some("maya")),
            StylistChoice::Stylist("maya".into())
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AppointmentStatus::Booked.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
    }
}
