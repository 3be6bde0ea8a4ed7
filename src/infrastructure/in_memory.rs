use crate::domain::appointment::Appointment;
use crate::domain::ids::{AppointmentId, CheckInId, RatingId, SalonId, ServiceId, StylistId, UserId};
use crate::domain::ports::{Change, DocumentStore, Versioned, Write, WriteBatch};
use crate::domain::queue::{QueueItem, QueueStatus, User};
use crate::domain::rating::Rating;
use crate::domain::salon::{Salon, Service, Stylist};
use crate::error::{Result, SalonError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{RwLock, broadcast};

const CHANGE_CAPACITY: usize = 1024;

#[derive(Default)]
struct Tables {
    salons: HashMap<SalonId, Versioned<Salon>>,
    users: HashMap<UserId, Versioned<User>>,
    queue: HashMap<(SalonId, CheckInId), Versioned<QueueItem>>,
    stylists: HashMap<(SalonId, StylistId), Versioned<Stylist>>,
    services: HashMap<(SalonId, ServiceId), Versioned<Service>>,
    appointments: HashMap<AppointmentId, Versioned<Appointment>>,
    ratings: HashMap<RatingId, Versioned<Rating>>,
}

fn stored_version<K: Eq + Hash, T>(table: &HashMap<K, Versioned<T>>, key: &K) -> u64 {
    table.get(key).map_or(0, |doc| doc.version)
}

fn bump<K: Eq + Hash, T>(table: &mut HashMap<K, Versioned<T>>, key: K, mut doc: Versioned<T>) -> u64 {
    doc.version += 1;
    let version = doc.version;
    table.insert(key, doc);
    version
}

impl Tables {
    fn current_version(&self, write: &Write) -> u64 {
        match write {
            Write::Salon(s) => stored_version(&self.salons, &s.id),
            Write::User(u) => stored_version(&self.users, &u.id),
            Write::QueueItem(q) => stored_version(&self.queue, &(q.salon_id.clone(), q.id)),
            Write::Stylist(s) => stored_version(&self.stylists, &(s.salon_id.clone(), s.id.clone())),
            Write::Service(s) => stored_version(&self.services, &(s.salon_id.clone(), s.id.clone())),
            Write::Appointment(a) => stored_version(&self.appointments, &a.id),
            Write::Rating(r) => stored_version(&self.ratings, &r.id),
        }
    }

    fn apply(&mut self, write: Write) -> u64 {
        match write {
            Write::Salon(s) => bump(&mut self.salons, s.id.clone(), s),
            Write::User(u) => bump(&mut self.users, u.id.clone(), u),
            Write::QueueItem(q) => bump(&mut self.queue, (q.salon_id.clone(), q.id), q),
            Write::Stylist(s) => bump(&mut self.stylists, (s.salon_id.clone(), s.id.clone()), s),
            Write::Service(s) => bump(&mut self.services, (s.salon_id.clone(), s.id.clone()), s),
            Write::Appointment(a) => bump(&mut self.appointments, a.id, a),
            Write::Rating(r) => bump(&mut self.ratings, r.id, r),
        }
    }
}

/// A thread-safe in-memory document store.
///
/// All tables sit behind a single `RwLock`, so a commit validates and applies
/// its whole batch under one write guard. Ideal for tests and single-process
/// deployments where persistence is not required.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    changes: broadcast::Sender<Change>,
    failing_commits: Arc<AtomicU32>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            tables: Arc::default(),
            changes,
            failing_commits: Arc::default(),
        }
    }
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `Unavailable`, writing nothing.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn salon(&self, id: &SalonId) -> Result<Option<Versioned<Salon>>> {
        Ok(self.tables.read().await.salons.get(id).cloned())
    }

    async fn salon_ids(&self) -> Result<Vec<SalonId>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<SalonId> = tables.salons.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn queue_item(
        &self,
        salon_id: &SalonId,
        id: &CheckInId,
    ) -> Result<Option<Versioned<QueueItem>>> {
        let tables = self.tables.read().await;
        Ok(tables.queue.get(&(salon_id.clone(), *id)).cloned())
    }

    async fn queue_items(
        &self,
        salon_id: &SalonId,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Versioned<QueueItem>>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .queue
            .values()
            .filter(|item| &item.salon_id == salon_id)
            .filter(|item| status.is_none_or(|s| item.status == s))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn user_queue_items(
        &self,
        salon_id: &SalonId,
        user_id: &UserId,
    ) -> Result<Vec<Versioned<QueueItem>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .queue
            .values()
            .filter(|item| &item.salon_id == salon_id && &item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn stylist(
        &self,
        salon_id: &SalonId,
        id: &StylistId,
    ) -> Result<Option<Versioned<Stylist>>> {
        let tables = self.tables.read().await;
        Ok(tables.stylists.get(&(salon_id.clone(), id.clone())).cloned())
    }

    async fn stylists(&self, salon_id: &SalonId) -> Result<Vec<Versioned<Stylist>>> {
        let tables = self.tables.read().await;
        let mut stylists: Vec<_> = tables
            .stylists
            .values()
            .filter(|s| &s.salon_id == salon_id)
            .cloned()
            .collect();
        stylists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stylists)
    }

    async fn service(
        &self,
        salon_id: &SalonId,
        id: &ServiceId,
    ) -> Result<Option<Versioned<Service>>> {
        let tables = self.tables.read().await;
        Ok(tables.services.get(&(salon_id.clone(), id.clone())).cloned())
    }

    async fn appointment(&self, id: &AppointmentId) -> Result<Option<Versioned<Appointment>>> {
        Ok(self.tables.read().await.appointments.get(id).cloned())
    }

    async fn appointments_on(
        &self,
        salon_id: &SalonId,
        date: NaiveDate,
    ) -> Result<Vec<Versioned<Appointment>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| &a.salon_id == salon_id && a.date == date)
            .cloned()
            .collect())
    }

    async fn rating(&self, id: &RatingId) -> Result<Option<Versioned<Rating>>> {
        Ok(self.tables.read().await.ratings.get(id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if self.take_injected_failure() {
            return Err(SalonError::Unavailable("injected commit failure".into()));
        }

        let mut tables = self.tables.write().await;
        for write in batch.writes() {
            if tables.current_version(write) != write.expected_version() {
                return Err(SalonError::Conflict {
                    collection: write.collection().name(),
                    key: write.key(),
                });
            }
        }

        let mut changes = Vec::with_capacity(batch.len());
        for write in batch.into_writes() {
            let collection = write.collection();
            let key = write.key();
            let version = tables.apply(write);
            changes.push(Change {
                collection,
                key,
                version,
            });
        }
        drop(tables);

        for change in changes {
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
