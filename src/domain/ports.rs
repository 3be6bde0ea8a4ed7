use super::appointment::Appointment;
use super::events::DomainEvent;
use super::ids::{AppointmentId, CheckInId, RatingId, SalonId, ServiceId, StylistId, UserId};
use super::queue::{QueueItem, QueueStatus, User};
use super::rating::Rating;
use super::salon::{Salon, Service, Stylist};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::broadcast;

/// A document together with the version it was read at.
///
/// Version 0 means "does not exist yet". Writing a `Versioned` back through a
/// [`WriteBatch`] succeeds only if the stored version is still the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

impl<T> Versioned<T> {
    /// A document that must not exist when the batch commits.
    pub fn create(doc: T) -> Self {
        Self { version: 0, doc }
    }

    pub fn into_inner(self) -> T {
        self.doc
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.doc
    }
}

impl<T> DerefMut for Versioned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.doc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Salons,
    Users,
    Queue,
    Stylists,
    Services,
    Appointments,
    Ratings,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Self::Salons,
        Self::Users,
        Self::Queue,
        Self::Stylists,
        Self::Services,
        Self::Appointments,
        Self::Ratings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Salons => "salons",
            Self::Users => "users",
            Self::Queue => "queue",
            Self::Stylists => "stylists",
            Self::Services => "services",
            Self::Appointments => "appointments",
            Self::Ratings => "ratings",
        }
    }
}

/// Separator for keys of documents owned by a salon.
pub const KEY_SEPARATOR: char = '\u{1f}';

pub fn salon_scoped_key(salon_id: &SalonId, id: impl std::fmt::Display) -> String {
    format!("{salon_id}{KEY_SEPARATOR}{id}")
}

/// One document put inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Salon(Versioned<Salon>),
    User(Versioned<User>),
    QueueItem(Versioned<QueueItem>),
    Stylist(Versioned<Stylist>),
    Service(Versioned<Service>),
    Appointment(Versioned<Appointment>),
    Rating(Versioned<Rating>),
}

impl Write {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Salon(_) => Collection::Salons,
            Self::User(_) => Collection::Users,
            Self::QueueItem(_) => Collection::Queue,
            Self::Stylist(_) => Collection::Stylists,
            Self::Service(_) => Collection::Services,
            Self::Appointment(_) => Collection::Appointments,
            Self::Rating(_) => Collection::Ratings,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::Salon(s) => s.id.to_string(),
            Self::User(u) => u.id.to_string(),
            Self::QueueItem(q) => salon_scoped_key(&q.salon_id, q.id),
            Self::Stylist(s) => salon_scoped_key(&s.salon_id, &s.id),
            Self::Service(s) => salon_scoped_key(&s.salon_id, &s.id),
            Self::Appointment(a) => a.id.to_string(),
            Self::Rating(r) => r.id.to_string(),
        }
    }

    /// Version the document must still have for the batch to apply.
    pub fn expected_version(&self) -> u64 {
        match self {
            Self::Salon(v) => v.version,
            Self::User(v) => v.version,
            Self::QueueItem(v) => v.version,
            Self::Stylist(v) => v.version,
            Self::Service(v) => v.version,
            Self::Appointment(v) => v.version,
            Self::Rating(v) => v.version,
        }
    }
}

/// All-or-nothing group of writes covering one unit of work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Change notification fanned out for every committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub key: String,
    pub version: u64,
}

/// The durable document store the core is written against.
///
/// Reads are individually consistent. `commit` applies a whole batch or
/// nothing: if any document's stored version differs from the version it
/// carries, the store returns [`crate::error::SalonError::Conflict`] and
/// writes nothing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn salon(&self, id: &SalonId) -> Result<Option<Versioned<Salon>>>;
    /// Sorted ascending.
    async fn salon_ids(&self) -> Result<Vec<SalonId>>;
    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>>;
    async fn queue_item(
        &self,
        salon_id: &SalonId,
        id: &CheckInId,
    ) -> Result<Option<Versioned<QueueItem>>>;
    async fn queue_items(
        &self,
        salon_id: &SalonId,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Versioned<QueueItem>>>;
    /// Every queue item `user_id` ever had at `salon_id`, any status.
    async fn user_queue_items(
        &self,
        salon_id: &SalonId,
        user_id: &UserId,
    ) -> Result<Vec<Versioned<QueueItem>>>;
    async fn stylist(
        &self,
        salon_id: &SalonId,
        id: &StylistId,
    ) -> Result<Option<Versioned<Stylist>>>;
    async fn stylists(&self, salon_id: &SalonId) -> Result<Vec<Versioned<Stylist>>>;
    async fn service(
        &self,
        salon_id: &SalonId,
        id: &ServiceId,
    ) -> Result<Option<Versioned<Service>>>;
    async fn appointment(&self, id: &AppointmentId) -> Result<Option<Versioned<Appointment>>>;
    /// Every appointment at `salon_id` on `date`, cancelled ones included.
    async fn appointments_on(
        &self,
        salon_id: &SalonId,
        date: NaiveDate,
    ) -> Result<Vec<Versioned<Appointment>>>;
    async fn rating(&self, id: &RatingId) -> Result<Option<Versioned<Rating>>>;

    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<Change>;

    /// The user's most recent queue item at this salon, latest `created_at` wins.
    async fn latest_queue_item(
        &self,
        salon_id: &SalonId,
        user_id: &UserId,
    ) -> Result<Option<Versioned<QueueItem>>> {
        Ok(self
            .user_queue_items(salon_id, user_id)
            .await?
            .into_iter()
            .max_by_key(|item| item.created_at))
    }
}

pub type SharedStore = Arc<dyn DocumentStore>;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

pub type SharedEventSink = Arc<dyn EventSink>;

/// Source of "server" timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by command scripts and tests.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::TimeDelta) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now().timestamp_millis(), start.timestamp_millis());

        clock.advance(TimeDelta::seconds(30));
        assert_eq!(
            clock.now().timestamp_millis(),
            start.timestamp_millis() + 30_000
        );
    }

    #[test]
    fn test_write_keys_are_salon_scoped() {
        let item = QueueItem::waiting("s1".into(), "u1".into(), Utc::now(), 0, 1);
        let write = Write::QueueItem(Versioned::create(item.clone()));
        assert_eq!(write.collection(), Collection::Queue);
        assert_eq!(write.key(), format!("s1\u{1f}{}", item.id));
        assert_eq!(write.expected_version(), 0);
    }
}
