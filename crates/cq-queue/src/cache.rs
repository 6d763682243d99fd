use cq_core::metrics;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreResult;
use crate::model::{QueueItem, QueueStatus};
use crate::store::QueueStore;

/// The waiting line as of one rebuild, paired with the version it was published under.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub version: u64,
    pub entries: Vec<QueueItem>,
}

impl QueueSnapshot {
    /// Opaque revalidation token handed to pollers (`ETag`).
    pub fn etag(&self) -> String {
        self.version.to_string()
    }

    /// True when a client-held token names this exact snapshot.
    pub fn is_current(&self, token: Option<&str>) -> bool {
        token.is_some_and(|token| token == self.etag())
    }
}

/// Priority first, then arrival order; id breaks timestamp ties.
pub fn waiting_order(a: &QueueItem, b: &QueueItem) -> Ordering {
    b.entry
        .is_priority
        .cmp(&a.entry.is_priority)
        .then_with(|| a.entry.created_at.cmp(&b.entry.created_at))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

pub struct QueueCache {
    store: Arc<dyn QueueStore>,
    service_name: &'static str,
    current: RwLock<Arc<QueueSnapshot>>,
    rebuild_lock: Mutex<()>,
}

impl QueueCache {
    /// Starts at version 0 with an empty line; call [`QueueCache::rebuild`] before serving.
    pub fn new(store: Arc<dyn QueueStore>, service_name: &'static str) -> Self {
        Self {
            store,
            service_name,
            current: RwLock::new(Arc::new(QueueSnapshot::default())),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Re-reads the waiting line and publishes it under the next version.
    ///
    /// On a store error nothing is published: the previous snapshot and
    /// version stay in place until a later rebuild succeeds.
    pub async fn rebuild(&self) -> StoreResult<u64> {
        let _rebuilding = self.rebuild_lock.lock().await;

        let mut entries = match self.store.list_waiting().await {
            Ok(entries) => entries,
            Err(err) => {
                metrics::inc_queue_rebuild_failure(self.service_name);
                tracing::warn!(error = %err, "queue snapshot rebuild failed; keeping previous snapshot");
                return Err(err);
            }
        };
        entries.retain(|item| item.entry.status == QueueStatus::Waiting);
        entries.sort_by(waiting_order);
        let waiting = entries.len();

        let version = {
            let mut current = self.current.write().await;
            let version = current.version + 1;
            *current = Arc::new(QueueSnapshot { version, entries });
            version
        };

        metrics::record_queue_rebuild(self.service_name, waiting, version);
        tracing::debug!(version, waiting, "queue snapshot rebuilt");
        Ok(version)
    }

    pub async fn snapshot(&self) -> Arc<QueueSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    pub async fn entries(&self) -> Vec<QueueItem> {
        self.current.read().await.entries.clone()
    }

    pub async fn version(&self) -> u64 {
        self.current.read().await.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::NewPatient;

    fn cache_over(store: &Arc<MemoryStore>) -> QueueCache {
        QueueCache::new(Arc::clone(store) as Arc<dyn QueueStore>, "cq-test")
    }

    async fn waiting_patient(store: &MemoryStore, cpf: &str, is_priority: bool) -> i64 {
        let patient = store
            .insert_patient(NewPatient {
                name: Some(format!("patient {cpf}")),
                cpf: cpf.to_string(),
                ..Default::default()
            })
            .await;
        store.insert_entry(patient.id, is_priority).await.unwrap().id
    }

    fn ids(snapshot: &QueueSnapshot) -> Vec<i64> {
        snapshot.entries.iter().map(|item| item.entry.id).collect()
    }

    #[tokio::test]
    async fn starts_empty_at_version_zero() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(&store);

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.entries.is_empty());
    }

    #[tokio::test]
    async fn rebuild_orders_priority_then_arrival() {
        let store = Arc::new(MemoryStore::new());
        let first = waiting_patient(&store, "1", false).await;
        let second = waiting_patient(&store, "2", true).await;
        let third = waiting_patient(&store, "3", false).await;
        let fourth = waiting_patient(&store, "4", true).await;
        let cache = cache_over(&store);

        cache.rebuild().await.unwrap();

        let snapshot = cache.snapshot().await;
        assert_eq!(ids(&snapshot), vec![second, fourth, first, third]);
    }

    #[tokio::test]
    async fn rebuild_excludes_entries_no_longer_waiting() {
        let store = Arc::new(MemoryStore::new());
        let called = waiting_patient(&store, "1", true).await;
        let waiting = waiting_patient(&store, "2", false).await;
        let cancelled = waiting_patient(&store, "3", false).await;
        assert!(store.start_attending(called).await.unwrap());
        assert!(store.cancel(cancelled).await.unwrap());
        let cache = cache_over(&store);

        cache.rebuild().await.unwrap();

        let snapshot = cache.snapshot().await;
        assert_eq!(ids(&snapshot), vec![waiting]);
    }

    #[tokio::test]
    async fn each_rebuild_bumps_version_by_one() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(&store);

        assert_eq!(cache.rebuild().await.unwrap(), 1);
        assert_eq!(cache.rebuild().await.unwrap(), 2);
        assert_eq!(cache.version().await, 2);
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let entry = waiting_patient(&store, "1", false).await;
        let cache = cache_over(&store);
        cache.rebuild().await.unwrap();

        waiting_patient(&store, "2", false).await;
        store.fail_reads(true);
        assert!(cache.rebuild().await.is_err());

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.version, 1);
        assert_eq!(ids(&snapshot), vec![entry]);

        store.fail_reads(false);
        assert_eq!(cache.rebuild().await.unwrap(), 2);
        assert_eq!(cache.snapshot().await.entries.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_rebuilds_publish_distinct_versions() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(cache_over(&store));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.rebuild().await.unwrap() }));
        }
        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap());
        }
        versions.sort_unstable();

        assert_eq!(versions, (1..=16).collect::<Vec<u64>>());
        assert_eq!(cache.version().await, 16);
    }

    #[test]
    fn is_current_compares_decimal_version() {
        let snapshot = QueueSnapshot {
            version: 12,
            entries: Vec::new(),
        };
        assert!(snapshot.is_current(Some("12")));
        assert!(!snapshot.is_current(Some("11")));
        assert!(!snapshot.is_current(Some("\"12\"")));
        assert!(!snapshot.is_current(None));
    }
}
