use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_sessions::{
    ExpiredDeletion, SessionStore,
    cookie::time::OffsetDateTime,
    session::{Id, Record},
    session_store::Error as SSError,
};

/// In-process session store that never holds more than `capacity` records.
///
/// Expired records are dropped by [`ExpiredDeletion::delete_expired`] (run periodically via
/// [`RosterSessionStore::delete_expired_every`]) and whenever a new record needs room. When the
/// store is still full after that, the record closest to expiry is evicted.
#[derive(Debug, Clone)]
pub struct RosterSessionStore {
    records: Arc<Mutex<HashMap<Id, Record>>>,
    capacity: usize,
}

impl RosterSessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    fn make_room(records: &mut HashMap<Id, Record>, capacity: usize) {
        let now = OffsetDateTime::now_utc();
        records.retain(|_, record| record.expiry_date > now);

        while records.len() >= capacity {
            let Some(oldest) = records
                .values()
                .min_by_key(|record| record.expiry_date)
                .map(|record| record.id)
            else {
                break;
            };

            debug!(%oldest, "Session store full, evicting");
            records.remove(&oldest);
        }
    }

    pub async fn delete_expired_every(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; //first tick is immediate

        loop {
            interval.tick().await;
            if let Err(e) = self.delete_expired().await {
                warn!(?e, "Unable to delete expired sessions");
            }
        }
    }
}

#[async_trait]
impl SessionStore for RosterSessionStore {
    async fn create(&self, session_record: &mut Record) -> Result<(), SSError> {
        let mut records = self.records.lock().await;

        while records.contains_key(&session_record.id) {
            session_record.id = Id::default();
        }

        Self::make_room(&mut records, self.capacity);
        records.insert(session_record.id, session_record.clone());

        Ok(())
    }

    async fn save(&self, session_record: &Record) -> Result<(), SSError> {
        let mut records = self.records.lock().await;

        if !records.contains_key(&session_record.id) {
            Self::make_room(&mut records, self.capacity);
        }
        records.insert(session_record.id, session_record.clone());

        Ok(())
    }

    async fn load(&self, session_id: &Id) -> Result<Option<Record>, SSError> {
        let now = OffsetDateTime::now_utc();

        Ok(self
            .records
            .lock()
            .await
            .get(session_id)
            .filter(|record| record.expiry_date > now)
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> Result<(), SSError> {
        self.records.lock().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for RosterSessionStore {
    async fn delete_expired(&self) -> Result<(), SSError> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;

        let before = records.len();
        records.retain(|_, record| record.expiry_date > now);
        trace!(removed = before - records.len(), "Deleted expired sessions");

        Ok(())
    }
}
