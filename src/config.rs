//! Runtime settings, loaded from an optional TOML file.
//!
//! ```toml
//! [queue]
//! checkin_cooldown_secs = 20
//! stale_after_mins = 240
//!
//! [[salons]]
//! id = "downtown"
//! name = "Downtown Cuts"
//!
//! [[salons.stylists]]
//! id = "maya"
//! name = "Maya"
//!
//! [[salons.services]]
//! id = "cut"
//! name = "Haircut"
//! price = "30.00"
//! duration_min = 30
//! ```

use crate::domain::rules::QueuePolicy;
use crate::domain::salon::{Salon, Service, Stylist};
use crate::error::{Result, SalonError};
use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub queue: QueueSettings,
    pub sweep: SweepSettings,
    pub appointments: AppointmentSettings,
    pub salons: Vec<SalonProfile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    pub checkin_cooldown_secs: i64,
    pub stale_after_mins: i64,
    pub default_service_minutes: u32,
    /// Extra attempts after an optimistic-concurrency conflict.
    pub contention_retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            checkin_cooldown_secs: 20,
            stale_after_mins: 240,
            default_service_minutes: 15,
            contention_retries: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepSettings {
    pub interval_mins: u64,
    /// Total attempts per salon batch before the sweep gives up on it.
    pub retry_attempts: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_mins: 30,
            retry_attempts: 3,
        }
    }
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.max(1) * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppointmentSettings {
    pub loyalty_points: u32,
}

impl Default for AppointmentSettings {
    fn default() -> Self {
        Self { loyalty_points: 10 }
    }
}

/// A salon to register at startup, with its staff and service menu.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalonProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub average_service_time: Option<u32>,
    #[serde(default = "enabled")]
    pub accepts_bookings: bool,
    #[serde(default = "enabled")]
    pub accepts_appointments: bool,
    #[serde(default)]
    pub stylists: Vec<StylistProfile>,
    #[serde(default)]
    pub services: Vec<ServiceProfile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StylistProfile {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceProfile {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub duration_min: u32,
}

fn enabled() -> bool {
    true
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let settings: Self = toml::from_str(raw)?;
        for profile in &settings.salons {
            profile.validate()?;
        }
        Ok(settings)
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy {
            cooldown: TimeDelta::seconds(self.queue.checkin_cooldown_secs.max(0)),
            default_service_minutes: self.queue.default_service_minutes,
            stale_after: TimeDelta::minutes(self.queue.stale_after_mins.max(0)),
        }
    }
}

impl SalonProfile {
    /// Every service must take time: back-to-back bookings start each service
    /// where the previous one ends.
    pub fn validate(&self) -> Result<()> {
        match self.services.iter().find(|s| s.duration_min == 0) {
            Some(service) => Err(SalonError::InvalidArgument(format!(
                "service {} of salon {} must last at least one minute",
                service.id, self.id
            ))),
            None => Ok(()),
        }
    }

    pub fn to_salon(&self) -> Salon {
        let mut salon = Salon::new(self.id.as_str().into(), &self.name, &self.address);
        salon.average_service_time = self.average_service_time;
        salon.accepts_bookings = self.accepts_bookings;
        salon.accepts_appointments = self.accepts_appointments;
        salon
    }

    pub fn to_stylists(&self) -> Vec<Stylist> {
        self.stylists
            .iter()
            .map(|s| {
                let mut stylist =
                    Stylist::new(s.id.as_str().into(), self.id.as_str().into(), &s.name);
                stylist.active = s.active;
                stylist
            })
            .collect()
    }

    pub fn to_services(&self) -> Vec<Service> {
        self.services
            .iter()
            .map(|s| Service {
                id: s.id.as_str().into(),
                salon_id: self.id.as_str().into(),
                name: s.name.clone(),
                price: s.price,
                duration_min: s.duration_min,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SalonError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.queue_policy(), QueuePolicy::default());
        assert_eq!(settings.sweep.interval(), Duration::from_secs(30 * 60));
        assert_eq!(settings.appointments.loyalty_points, 10);
    }

    #[test]
    fn test_salon_profiles() {
        let settings = Settings::parse(
            r#"
            [queue]
            checkin_cooldown_secs = 5

            [[salons]]
            id = "downtown"
            name = "Downtown Cuts"
            accepts_appointments = false

            [[salons.stylists]]
            id = "maya"
            name = "Maya"

            [[salons.stylists]]
            id = "leo"
            name = "Leo"
            active = false

            [[salons.services]]
            id = "cut"
            name = "Haircut"
            price = "30.50"
            duration_min = 30
            "#,
        )
        .unwrap();

        assert_eq!(settings.queue_policy().cooldown, TimeDelta::seconds(5));
        assert_eq!(settings.queue.stale_after_mins, 240);

        let profile = &settings.salons[0];
        let salon = profile.to_salon();
        assert!(salon.accepts_bookings);
        assert!(!salon.accepts_appointments);

        let stylists = profile.to_stylists();
        assert_eq!(stylists.len(), 2);
        assert!(stylists[0].active);
        assert!(!stylists[1].active);

        let services = profile.to_services();
        assert_eq!(services[0].price, dec!(30.50));
        assert_eq!(services[0].salon_id.as_str(), "downtown");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Settings::parse("[queue]\ncooldown = 3\n").unwrap_err();
        assert!(matches!(err, SalonError::Config(_)));
    }

    #[test]
    fn test_zero_minute_service_rejected() {
        let err = Settings::parse(
            r#"
            [[salons]]
            id = "downtown"
            name = "Downtown Cuts"

            [[salons.services]]
            id = "consult"
            name = "Consultation"
            price = "0"
            duration_min = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SalonError::InvalidArgument(msg) if msg.contains("consult")));
    }
}
