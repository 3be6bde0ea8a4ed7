//! Shared setup for the service tests: a salon with three stylists (one
//! inactive) and two services, behind an in-memory store and a manual clock.

use super::Caller;
use super::engine::SalonEngine;
use crate::config::{SalonProfile, ServiceProfile, Settings, StylistProfile};
use crate::domain::events::DomainEvent;
use crate::domain::ids::SalonId;
use crate::domain::ports::{DocumentStore, ManualClock};
use crate::domain::salon::Salon;
use crate::infrastructure::events::ChannelEventSink;
use crate::infrastructure::in_memory::InMemoryStore;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

pub(crate) const START: &str = "2026-03-02T09:00:00Z";

pub(crate) fn at(hm: &str) -> NaiveTime {
    NaiveTime::parse_from_str(hm, "%H:%M").unwrap()
}

fn stylist(id: &str, active: bool) -> StylistProfile {
    StylistProfile {
        id: id.into(),
        name: id.to_uppercase(),
        active,
    }
}

fn service(id: &str, name: &str, duration_min: u32) -> ServiceProfile {
    ServiceProfile {
        id: id.into(),
        name: name.into(),
        price: dec!(30.00) * rust_decimal::Decimal::from(duration_min / 30),
        duration_min,
    }
}

pub(crate) struct Fixture {
    pub settings: Settings,
    pub store: InMemoryStore,
    pub clock: Arc<ManualClock>,
    pub engine: SalonEngine,
    events: Mutex<UnboundedReceiver<DomainEvent>>,
}

impl Fixture {
    pub async fn new() -> Self {
        let settings = Settings {
            salons: vec![SalonProfile {
                id: "downtown".into(),
                name: "Downtown Cuts".into(),
                address: "1 Main St".into(),
                average_service_time: None,
                accepts_bookings: true,
                accepts_appointments: true,
                stylists: vec![
                    stylist("maya", true),
                    stylist("leo", true),
                    stylist("sam", false),
                ],
                services: vec![service("cut", "Haircut", 30), service("color", "Color", 60)],
            }],
            ..Settings::default()
        };

        let store = InMemoryStore::new();
        let start: DateTime<Utc> = START.parse().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let (sink, events) = ChannelEventSink::new();
        let engine = SalonEngine::new(
            Arc::new(store.clone()),
            Arc::new(sink),
            clock.clone(),
            &settings,
        );
        assert!(engine.register(&settings.salons[0]).await.unwrap());

        Self {
            settings,
            store,
            clock,
            engine,
            events: Mutex::new(events),
        }
    }

    /// A walk-in only salon with a single service and no stylists.
    pub async fn register_second_salon(&self) {
        let profile = SalonProfile {
            id: "uptown".into(),
            name: "Uptown Barbers".into(),
            address: "9 High St".into(),
            average_service_time: Some(20),
            accepts_bookings: true,
            accepts_appointments: false,
            stylists: Vec::new(),
            services: vec![service("trim", "Beard trim", 30)],
        };
        assert!(self.engine.register(&profile).await.unwrap());
    }

    pub fn salon_id(&self) -> SalonId {
        "downtown".into()
    }

    pub async fn salon(&self) -> Salon {
        self.salon_of("downtown").await
    }

    pub async fn salon_of(&self, id: &str) -> Salon {
        self.store.salon(&id.into()).await.unwrap().unwrap().into_inner()
    }

    pub fn alice(&self) -> Caller {
        Caller::user("alice")
    }

    pub fn bob(&self) -> Caller {
        Caller::user("bob")
    }

    pub fn staff(&self) -> Caller {
        Caller::user("front-desk")
    }

    pub fn next_event(&self) -> Option<DomainEvent> {
        self.events.lock().unwrap().try_recv().ok()
    }

    pub fn drain_events(&self) {
        while self.next_event().is_some() {}
    }
}
