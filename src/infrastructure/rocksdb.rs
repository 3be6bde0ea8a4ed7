use crate::domain::appointment::Appointment;
use crate::domain::ids::{AppointmentId, CheckInId, RatingId, SalonId, ServiceId, StylistId, UserId};
use crate::domain::ports::{
    Change, Collection, DocumentStore, KEY_SEPARATOR, Versioned, Write, WriteBatch,
    salon_scoped_key,
};
use crate::domain::queue::{QueueItem, QueueStatus, User};
use crate::domain::rating::Rating;
use crate::domain::salon::{Salon, Service, Stylist};
use crate::error::{Result, SalonError};
use async_trait::async_trait;
use chrono::NaiveDate;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

const CHANGE_CAPACITY: usize = 1024;

/// Reads just the version header of a stored document.
#[derive(serde::Deserialize)]
struct VersionHeader {
    version: u64,
}

/// A persistent store implementation using RocksDB.
///
/// Each collection lives in its own column family, keyed by document id
/// (salon-owned documents are prefixed with the salon id). Values are JSON
/// encoded `Versioned<T>`. Commits validate versions and write one
/// `rocksdb::WriteBatch` while holding a process-wide commit lock, which makes
/// the version check and the write a single atomic step.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
    changes: broadcast::Sender<Change>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// one column family per collection exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = Collection::ALL
            .iter()
            .map(|c| ColumnFamilyDescriptor::new(c.name(), Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            changes,
        })
    }

    fn cf(&self, collection: Collection) -> Result<&ColumnFamily> {
        self.db.cf_handle(collection.name()).ok_or_else(|| {
            SalonError::Internal(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                collection.name()
            ))))
        })
    }

    fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<Versioned<T>>> {
        let cf = self.cf(collection)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every document in `collection`, optionally restricted to one salon.
    fn scan<T: DeserializeOwned>(
        &self,
        collection: Collection,
        salon_id: Option<&SalonId>,
    ) -> Result<Vec<Versioned<T>>> {
        let cf = self.cf(collection)?;
        let prefix = salon_id.map(|id| format!("{id}{KEY_SEPARATOR}"));
        let iter = match &prefix {
            Some(prefix) => self.db.prefix_iterator_cf(cf, prefix.as_bytes()),
            None => self.db.iterator_cf(cf, IteratorMode::Start),
        };

        let mut docs = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if let Some(prefix) = &prefix
                && !key.starts_with(prefix.as_bytes())
            {
                break;
            }
            docs.push(decode(&value)?);
        }
        Ok(docs)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        SalonError::Internal(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

fn encode<T: Serialize>(doc: &Versioned<T>) -> Result<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| {
        SalonError::Internal(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

/// The stored document bumped to its next version, ready to write.
fn next_version<T: Serialize + Clone>(doc: &Versioned<T>) -> Result<(u64, Vec<u8>)> {
    let next = Versioned {
        version: doc.version + 1,
        doc: doc.doc.clone(),
    };
    Ok((next.version, encode(&next)?))
}

fn encode_write(write: &Write) -> Result<(u64, Vec<u8>)> {
    match write {
        Write::Salon(v) => next_version(v),
        Write::User(v) => next_version(v),
        Write::QueueItem(v) => next_version(v),
        Write::Stylist(v) => next_version(v),
        Write::Service(v) => next_version(v),
        Write::Appointment(v) => next_version(v),
        Write::Rating(v) => next_version(v),
    }
}

#[async_trait]
impl DocumentStore for RocksDbStore {
    async fn salon(&self, id: &SalonId) -> Result<Option<Versioned<Salon>>> {
        self.get(Collection::Salons, id.as_str())
    }

    async fn salon_ids(&self) -> Result<Vec<SalonId>> {
        // Keys iterate in byte order, which is already sorted.
        let salons: Vec<Versioned<Salon>> = self.scan(Collection::Salons, None)?;
        Ok(salons.into_iter().map(|s| s.doc.id).collect())
    }

    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>> {
        self.get(Collection::Users, id.as_str())
    }

    async fn queue_item(
        &self,
        salon_id: &SalonId,
        id: &CheckInId,
    ) -> Result<Option<Versioned<QueueItem>>> {
        self.get(Collection::Queue, &salon_scoped_key(salon_id, id))
    }

    async fn queue_items(
        &self,
        salon_id: &SalonId,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Versioned<QueueItem>>> {
        let mut items: Vec<Versioned<QueueItem>> = self.scan(Collection::Queue, Some(salon_id))?;
        items.retain(|item| status.is_none_or(|s| item.status == s));
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn user_queue_items(
        &self,
        salon_id: &SalonId,
        user_id: &UserId,
    ) -> Result<Vec<Versioned<QueueItem>>> {
        let mut items: Vec<Versioned<QueueItem>> = self.scan(Collection::Queue, Some(salon_id))?;
        items.retain(|item| &item.user_id == user_id);
        Ok(items)
    }

    async fn stylist(
        &self,
        salon_id: &SalonId,
        id: &StylistId,
    ) -> Result<Option<Versioned<Stylist>>> {
        self.get(Collection::Stylists, &salon_scoped_key(salon_id, id))
    }

    async fn stylists(&self, salon_id: &SalonId) -> Result<Vec<Versioned<Stylist>>> {
        self.scan(Collection::Stylists, Some(salon_id))
    }

    async fn service(
        &self,
        salon_id: &SalonId,
        id: &ServiceId,
    ) -> Result<Option<Versioned<Service>>> {
        self.get(Collection::Services, &salon_scoped_key(salon_id, id))
    }

    async fn appointment(&self, id: &AppointmentId) -> Result<Option<Versioned<Appointment>>> {
        self.get(Collection::Appointments, &id.to_string())
    }

    async fn appointments_on(
        &self,
        salon_id: &SalonId,
        date: NaiveDate,
    ) -> Result<Vec<Versioned<Appointment>>> {
        let mut appointments: Vec<Versioned<Appointment>> =
            self.scan(Collection::Appointments, None)?;
        appointments.retain(|a| &a.salon_id == salon_id && a.date == date);
        Ok(appointments)
    }

    async fn rating(&self, id: &RatingId) -> Result<Option<Versioned<Rating>>> {
        self.get(Collection::Ratings, &id.to_string())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let guard = self.commit_lock.lock().await;

        let mut rocks_batch = rocksdb::WriteBatch::default();
        let mut changes = Vec::with_capacity(batch.len());
        for write in batch.writes() {
            let collection = write.collection();
            let key = write.key();
            let cf = self.cf(collection)?;

            let stored = match self.db.get_pinned_cf(cf, key.as_bytes())? {
                Some(bytes) => decode::<VersionHeader>(&bytes)?.version,
                None => 0,
            };
            if stored != write.expected_version() {
                return Err(SalonError::Conflict {
                    collection: collection.name(),
                    key,
                });
            }

            let (version, value) = encode_write(write)?;
            rocks_batch.put_cf(cf, key.as_bytes(), value);
            changes.push(Change {
                collection,
                key,
                version,
            });
        }

        self.db.write(rocks_batch)?;
        drop(guard);

        for change in changes {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("Failed to open RocksDB");

        for collection in Collection::ALL {
            assert!(store.db.cf_handle(collection.name()).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_versioned_commit() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let salon = Salon::new("s1".into(), "Shears", "1 Main St");
        let mut batch = WriteBatch::new();
        batch.put(Write::Salon(Versioned::create(salon.clone())));
        store.commit(batch.clone()).await.unwrap();

        let stored = store.salon(&"s1".into()).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.doc, salon);

        // Creating it again is a conflict.
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, SalonError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_rocksdb_salon_scoped_scan() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let now = Utc::now();
        let mine = QueueItem::waiting("s1".into(), "u1".into(), now, 0, 1);
        // "s10" shares a textual prefix with "s1" but not the separator.
        let other = QueueItem::waiting("s10".into(), "u1".into(), now, 0, 1);
        let mut batch = WriteBatch::new();
        batch
            .put(Write::QueueItem(Versioned::create(mine.clone())))
            .put(Write::QueueItem(Versioned::create(other)));
        store.commit(batch).await.unwrap();

        let items = store.queue_items(&"s1".into(), None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].doc, mine);
    }
}
