use chrono::{Local, NaiveDate};
use cq_core::metrics;
use cq_core::notify::Notifier;
use std::sync::Arc;

use crate::cache::QueueCache;
use crate::error::{QueueError, QueueResult, StoreError};
use crate::model::{NewPatient, Patient, QueueEntry};
use crate::priority;
use crate::store::QueueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendOutcome {
    pub notified: bool,
}

/// Every queue mutation goes through here: write the store, then refresh the
/// cache before handing the result back, so a caller that reads right after
/// a mutation sees its effect.
pub struct QueueGateway {
    store: Arc<dyn QueueStore>,
    cache: Arc<QueueCache>,
    notifier: Arc<dyn Notifier>,
    service_name: &'static str,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl QueueGateway {
    pub fn new(
        store: Arc<dyn QueueStore>,
        cache: Arc<QueueCache>,
        notifier: Arc<dyn Notifier>,
        service_name: &'static str,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            service_name,
            today: local_today,
        }
    }

    /// Overrides the clock used for the age rule.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn cache(&self) -> &Arc<QueueCache> {
        &self.cache
    }

    pub async fn enqueue(&self, cpf: &str, explicit_priority: bool) -> QueueResult<QueueEntry> {
        let cpf = cpf.trim();
        if cpf.is_empty() {
            return Err(QueueError::Validation("cpf is required".into()));
        }

        let patient = self
            .store
            .find_patient_by_cpf(cpf)
            .await?
            .ok_or_else(|| QueueError::NotFound("patient not registered".into()))?;

        if self.store.has_active_entry(patient.id).await? {
            return Err(already_queued());
        }

        let is_priority =
            priority::is_priority(patient.birth_date, explicit_priority, (self.today)());
        let entry = self
            .store
            .insert_entry(patient.id, is_priority)
            .await
            .map_err(conflict_on_duplicate(already_queued))?;

        tracing::info!(
            entry_id = entry.id,
            patient_id = patient.id,
            is_priority,
            "patient joined queue"
        );
        self.refresh().await;
        Ok(entry)
    }

    /// Registers a patient and enqueues them atomically.
    pub async fn register_and_enqueue(
        &self,
        patient: NewPatient,
        explicit_priority: bool,
    ) -> QueueResult<(Patient, QueueEntry)> {
        let mut patient = patient;
        patient.cpf = patient.cpf.trim().to_string();
        let has_name = patient
            .name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name || patient.cpf.is_empty() {
            return Err(QueueError::Validation("name and cpf are required".into()));
        }

        let is_priority =
            priority::is_priority(patient.birth_date, explicit_priority, (self.today)());
        let (created, entry) = self
            .store
            .register_and_enqueue(&patient, is_priority)
            .await
            .map_err(conflict_on_duplicate(|| {
                QueueError::Conflict("a patient with this cpf already exists".into())
            }))?;

        tracing::info!(
            entry_id = entry.id,
            patient_id = created.id,
            is_priority,
            "patient registered and queued"
        );
        self.refresh().await;
        Ok((created, entry))
    }

    /// Calls a waiting patient, then tries to notify them.
    pub async fn start_attending(&self, entry_id: i64) -> QueueResult<AttendOutcome> {
        let contact = self
            .store
            .entry_contact(entry_id)
            .await?
            .ok_or_else(|| QueueError::NotFound("queue entry not found".into()))?;

        if !self.store.start_attending(entry_id).await? {
            return Err(QueueError::NotFound(
                "queue entry is not waiting or is already being attended".into(),
            ));
        }

        tracing::info!(entry_id, "attendance started");
        self.refresh().await;

        let notified = match contact.email.as_deref().filter(|email| !email.is_empty()) {
            Some(email) => {
                let name = contact.name.as_deref().unwrap_or_default();
                let delivered = self.notifier.send(email, name).await;
                metrics::inc_queue_notification(self.service_name, delivered);
                delivered
            }
            None => false,
        };

        Ok(AttendOutcome { notified })
    }

    pub async fn finish_attending(&self, entry_id: i64) -> QueueResult<()> {
        if !self.store.finish_attending(entry_id).await? {
            return Err(QueueError::NotFound(
                "no attendance in progress for this queue entry".into(),
            ));
        }

        tracing::info!(entry_id, "attendance finished");
        // Waiting line is unchanged, but the version still advances.
        self.refresh().await;
        Ok(())
    }

    /// Cancels regardless of the entry's current status.
    pub async fn cancel(&self, entry_id: i64) -> QueueResult<()> {
        if !self.store.cancel(entry_id).await? {
            return Err(QueueError::NotFound("queue entry not found".into()));
        }

        tracing::info!(entry_id, "queue entry cancelled");
        self.refresh().await;
        Ok(())
    }

    /// The mutation already committed; a failed rebuild only leaves the cache stale.
    async fn refresh(&self) {
        if let Err(err) = self.cache.rebuild().await {
            tracing::warn!(error = %err, "queue cache left stale after mutation");
        }
    }
}

fn already_queued() -> QueueError {
    QueueError::Conflict("patient is already in the queue".into())
}

fn conflict_on_duplicate(
    conflict: impl Fn() -> QueueError,
) -> impl Fn(StoreError) -> QueueError {
    move |err| match err {
        StoreError::Duplicate(_) => conflict(),
        other => QueueError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::QueueStatus;
    use async_trait::async_trait;
    use chrono::Months;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Mailer {}

        #[async_trait]
        impl Notifier for Mailer {
            async fn send(&self, email: &str, name: &str) -> bool;
        }
    }

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn born_years_ago(years: u32) -> NaiveDate {
        fixed_today()
            .checked_sub_months(Months::new(years * 12))
            .unwrap()
    }

    fn silent_notifier() -> MockMailer {
        let mut notifier = MockMailer::new();
        notifier.expect_send().never();
        notifier
    }

    fn gateway(store: &Arc<MemoryStore>, notifier: MockMailer) -> QueueGateway {
        let queue_store: Arc<dyn QueueStore> = Arc::clone(store) as Arc<dyn QueueStore>;
        let cache = Arc::new(QueueCache::new(Arc::clone(&queue_store), "cq-test"));
        QueueGateway::new(queue_store, cache, Arc::new(notifier), "cq-test")
            .with_today(fixed_today)
    }

    async fn register(
        store: &MemoryStore,
        cpf: &str,
        email: Option<&str>,
        birth_date: Option<NaiveDate>,
    ) -> Patient {
        store
            .insert_patient(NewPatient {
                name: Some(format!("Patient {cpf}")),
                email: email.map(str::to_string),
                birth_date,
                cpf: cpf.to_string(),
                ..Default::default()
            })
            .await
    }

    async fn waiting_ids(gateway: &QueueGateway) -> Vec<i64> {
        gateway
            .cache()
            .snapshot()
            .await
            .entries
            .iter()
            .map(|item| item.entry.id)
            .collect()
    }

    #[tokio::test]
    async fn clinic_day_scenario() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, Some(born_years_ago(30))).await;
        register(&store, "B", Some("b@example.com"), None).await;

        let mut notifier = MockMailer::new();
        notifier
            .expect_send()
            .with(eq("b@example.com"), eq("Patient B"))
            .times(1)
            .returning(|_, _| true);
        let gateway = gateway(&store, notifier);

        let a = gateway.enqueue("A", false).await.unwrap();
        let b = gateway.enqueue("B", true).await.unwrap();
        assert!(!a.is_priority);
        assert!(b.is_priority);
        assert_eq!(waiting_ids(&gateway).await, vec![b.id, a.id]);

        gateway.cancel(a.id).await.unwrap();
        assert_eq!(waiting_ids(&gateway).await, vec![b.id]);

        let outcome = gateway.start_attending(b.id).await.unwrap();
        assert!(outcome.notified);
        assert!(waiting_ids(&gateway).await.is_empty());
        assert_eq!(
            store.entry(b.id).await.unwrap().status,
            QueueStatus::Attending
        );

        gateway.finish_attending(b.id).await.unwrap();
        assert!(waiting_ids(&gateway).await.is_empty());
        assert_eq!(
            store.entry(b.id).await.unwrap().status,
            QueueStatus::Attended
        );
    }

    #[tokio::test]
    async fn every_successful_mutation_bumps_version_once() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        let before = gateway.cache().version().await;
        let entry = gateway.enqueue("A", false).await.unwrap();
        assert_eq!(gateway.cache().version().await, before + 1);

        gateway.start_attending(entry.id).await.unwrap();
        assert_eq!(gateway.cache().version().await, before + 2);

        gateway.finish_attending(entry.id).await.unwrap();
        assert_eq!(gateway.cache().version().await, before + 3);

        gateway.cancel(entry.id).await.unwrap();
        assert_eq!(gateway.cache().version().await, before + 4);
    }

    #[tokio::test]
    async fn failed_mutations_leave_version_alone() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(&store, silent_notifier());

        assert!(matches!(
            gateway.enqueue("missing", false).await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            gateway.finish_attending(42).await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            gateway.cancel(42).await,
            Err(QueueError::NotFound(_))
        ));
        assert_eq!(gateway.cache().version().await, 0);
    }

    #[tokio::test]
    async fn enqueue_applies_age_rule() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "senior", None, Some(born_years_ago(61))).await;
        register(&store, "adult", None, Some(born_years_ago(59))).await;
        let gateway = gateway(&store, silent_notifier());

        assert!(gateway.enqueue("senior", false).await.unwrap().is_priority);
        assert!(!gateway.enqueue("adult", false).await.unwrap().is_priority);
    }

    #[tokio::test]
    async fn enqueue_requires_cpf() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(&store, silent_notifier());

        assert!(matches!(
            gateway.enqueue("  ", false).await,
            Err(QueueError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn enqueue_rejects_patient_already_in_line() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        let entry = gateway.enqueue("A", false).await.unwrap();
        assert!(matches!(
            gateway.enqueue("A", false).await,
            Err(QueueError::Conflict(_))
        ));

        gateway.start_attending(entry.id).await.unwrap();
        assert!(matches!(
            gateway.enqueue("A", false).await,
            Err(QueueError::Conflict(_))
        ));

        gateway.finish_attending(entry.id).await.unwrap();
        assert!(gateway.enqueue("A", false).await.is_ok());
    }

    #[tokio::test]
    async fn second_attend_fails_without_second_notification() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", Some("a@example.com"), None).await;

        let mut notifier = MockMailer::new();
        notifier.expect_send().times(1).returning(|_, _| true);
        let gateway = gateway(&store, notifier);

        let entry = gateway.enqueue("A", false).await.unwrap();
        gateway.start_attending(entry.id).await.unwrap();

        assert!(matches!(
            gateway.start_attending(entry.id).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_attend() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", Some("a@example.com"), None).await;

        let mut notifier = MockMailer::new();
        notifier.expect_send().times(1).returning(|_, _| false);
        let gateway = gateway(&store, notifier);

        let entry = gateway.enqueue("A", false).await.unwrap();
        let outcome = gateway.start_attending(entry.id).await.unwrap();

        assert!(!outcome.notified);
        assert_eq!(
            store.entry(entry.id).await.unwrap().status,
            QueueStatus::Attending
        );
    }

    #[tokio::test]
    async fn attend_without_email_skips_notification() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        let entry = gateway.enqueue("A", false).await.unwrap();
        let outcome = gateway.start_attending(entry.id).await.unwrap();
        assert!(!outcome.notified);
    }

    #[tokio::test]
    async fn attend_unknown_entry_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(&store, silent_notifier());

        assert!(matches!(
            gateway.start_attending(99).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn finish_requires_attending() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        let entry = gateway.enqueue("A", false).await.unwrap();
        assert!(matches!(
            gateway.finish_attending(entry.id).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_overwrites_any_status() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        let entry = gateway.enqueue("A", false).await.unwrap();
        gateway.start_attending(entry.id).await.unwrap();
        gateway.finish_attending(entry.id).await.unwrap();

        gateway.cancel(entry.id).await.unwrap();
        let stored = store.entry(entry.id).await.unwrap();
        assert_eq!(stored.status, QueueStatus::Cancelled);
        assert!(stored.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn mutation_succeeds_when_rebuild_fails() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());
        gateway.cache().rebuild().await.unwrap();

        let entry = gateway.enqueue("A", false).await.unwrap();
        assert_eq!(gateway.cache().version().await, 2);

        store.fail_reads(true);
        gateway.cancel(entry.id).await.unwrap();
        assert_eq!(gateway.cache().version().await, 2);
        assert_eq!(waiting_ids(&gateway).await, vec![entry.id]);

        store.fail_reads(false);
        gateway.cache().rebuild().await.unwrap();
        assert!(waiting_ids(&gateway).await.is_empty());
    }

    #[tokio::test]
    async fn register_and_enqueue_validates_and_detects_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(&store, silent_notifier());

        let missing_name = NewPatient {
            cpf: "1".into(),
            ..Default::default()
        };
        assert!(matches!(
            gateway.register_and_enqueue(missing_name, false).await,
            Err(QueueError::Validation(_))
        ));

        let patient = NewPatient {
            name: Some("Ana".into()),
            cpf: "1".into(),
            birth_date: Some(born_years_ago(70)),
            ..Default::default()
        };
        let (created, entry) = gateway
            .register_and_enqueue(patient.clone(), false)
            .await
            .unwrap();
        assert_eq!(entry.patient_id, created.id);
        assert!(entry.is_priority);
        assert_eq!(waiting_ids(&gateway).await, vec![entry.id]);

        assert!(matches!(
            gateway.register_and_enqueue(patient, false).await,
            Err(QueueError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let store = Arc::new(MemoryStore::new());
        register(&store, "A", None, None).await;
        let gateway = gateway(&store, silent_notifier());

        store.fail_writes(true);
        assert!(matches!(
            gateway.enqueue("A", false).await,
            Err(QueueError::Store(StoreError::Timeout))
        ));
    }
}
