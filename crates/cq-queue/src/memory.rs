//! In-process [`ClinicStore`] for tests.
//!
//! Mirrors the Postgres schema's unique constraints so conflict paths behave
//! the same, and can be told to fail reads or writes to exercise error paths.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Anamnesis, AnamnesisInput, NewPatient, NewUser, Patient, PatientContact, QueueEntry,
    QueueItem, QueueStatus, User, UserRole,
};
use crate::store::{AnamnesisStore, ClinicStore, PatientStore, QueueStore, UserStore};

#[derive(Default)]
struct State {
    users: Vec<User>,
    patients: Vec<Patient>,
    entries: Vec<QueueEntry>,
    anamneses: Vec<Anamnesis>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing timestamps so arrival order is never ambiguous.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn patient(&self, patient_id: i64) -> Option<&Patient> {
        self.patients.iter().find(|patient| patient.id == patient_id)
    }

    fn entry_mut(&mut self, entry_id: i64) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|entry| entry.id == entry_id)
    }

    fn item(&self, entry: &QueueEntry) -> Option<QueueItem> {
        self.patient(entry.patient_id).map(|patient| QueueItem {
            entry: entry.clone(),
            patient: patient.summary(),
        })
    }

    fn add_patient(&mut self, new: &NewPatient) -> StoreResult<Patient> {
        if self.patients.iter().any(|patient| patient.cpf == new.cpf) {
            return Err(StoreError::Duplicate("patients_cpf_key".into()));
        }
        let patient = Patient {
            id: self.patients.len() as i64 + 1,
            user_id: new.user_id,
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            birth_date: new.birth_date,
            gender: new.gender.clone(),
            insurance_provider: new.insurance_provider.clone(),
            insurance_number: new.insurance_number.clone(),
            cpf: new.cpf.clone(),
            created_at: self.now(),
        };
        self.patients.push(patient.clone());
        Ok(patient)
    }

    fn add_entry(&mut self, patient_id: i64, is_priority: bool) -> StoreResult<QueueEntry> {
        if self
            .entries
            .iter()
            .any(|entry| entry.patient_id == patient_id && entry.status.is_active())
        {
            return Err(StoreError::Duplicate(
                "queue_entries_one_active_per_patient".into(),
            ));
        }
        let entry = QueueEntry {
            id: self.entries.len() as i64 + 1,
            patient_id,
            is_priority,
            status: QueueStatus::Waiting,
            created_at: self.now(),
            served_at: None,
            cancelled_at: None,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read return [`StoreError::Timeout`] until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write return [`StoreError::Timeout`] until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seeds a patient, panicking on a duplicate cpf.
    pub async fn insert_patient(&self, patient: NewPatient) -> Patient {
        self.state
            .lock()
            .await
            .add_patient(&patient)
            .expect("seed patient")
    }

    pub async fn entry(&self, entry_id: i64) -> Option<QueueEntry> {
        let state = self.state.lock().await;
        state.entries.iter().find(|entry| entry.id == entry_id).cloned()
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state.patients.iter().find(|patient| patient.cpf == cpf).cloned())
    }

    async fn has_active_entry(&self, patient_id: i64) -> StoreResult<bool> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .any(|entry| entry.patient_id == patient_id && entry.status.is_active()))
    }

    async fn insert_entry(&self, patient_id: i64, is_priority: bool) -> StoreResult<QueueEntry> {
        self.check_write()?;
        self.state.lock().await.add_entry(patient_id, is_priority)
    }

    async fn register_and_enqueue(
        &self,
        patient: &NewPatient,
        is_priority: bool,
    ) -> StoreResult<(Patient, QueueEntry)> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let patient = state.add_patient(patient)?;
        let entry = state.add_entry(patient.id, is_priority)?;
        Ok((patient, entry))
    }

    async fn list_waiting(&self) -> StoreResult<Vec<QueueItem>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.status == QueueStatus::Waiting)
            .filter_map(|entry| state.item(entry))
            .collect())
    }

    async fn current_attending(&self) -> StoreResult<Option<QueueItem>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.status == QueueStatus::Attending)
            .max_by_key(|entry| entry.served_at)
            .and_then(|entry| state.item(entry)))
    }

    async fn entry_contact(&self, entry_id: i64) -> StoreResult<Option<PatientContact>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .find(|entry| entry.id == entry_id)
            .and_then(|entry| state.patient(entry.patient_id))
            .map(|patient| PatientContact {
                name: patient.name.clone(),
                email: patient.email.clone(),
            }))
    }

    async fn entry_patient_id(&self, entry_id: i64) -> StoreResult<Option<i64>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .find(|entry| entry.id == entry_id)
            .map(|entry| entry.patient_id))
    }

    async fn start_attending(&self, entry_id: i64) -> StoreResult<bool> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = state.now();
        match state.entry_mut(entry_id) {
            Some(entry) if entry.status == QueueStatus::Waiting => {
                entry.status = QueueStatus::Attending;
                entry.served_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_attending(&self, entry_id: i64) -> StoreResult<bool> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        match state.entry_mut(entry_id) {
            Some(entry) if entry.status == QueueStatus::Attending => {
                entry.status = QueueStatus::Attended;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel(&self, entry_id: i64) -> StoreResult<bool> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = state.now();
        match state.entry_mut(entry_id) {
            Some(entry) => {
                entry.status = QueueStatus::Cancelled;
                entry.cancelled_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn create_patient(&self, patient: &NewPatient) -> StoreResult<Patient> {
        self.check_write()?;
        self.state.lock().await.add_patient(patient)
    }

    async fn patient_by_user(&self, user_id: i64) -> StoreResult<Option<Patient>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .patients
            .iter()
            .find(|patient| patient.user_id == Some(user_id))
            .cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        if state.users.iter().any(|existing| existing.login == user.login) {
            return Err(StoreError::Duplicate("users_login_key".into()));
        }
        let created = User {
            id: state.users.len() as i64 + 1,
            login: user.login.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: state.now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.login == login).cloned())
    }

    async fn list_doctors(&self) -> StoreResult<Vec<User>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|user| user.role == UserRole::Doctor)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AnamnesisStore for MemoryStore {
    async fn anamneses_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Anamnesis>> {
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .anamneses
            .iter()
            .filter(|anamnesis| anamnesis.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn create_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<i64> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = state.now();
        let id = state.anamneses.len() as i64 + 1;
        state.anamneses.push(Anamnesis {
            id,
            patient_id,
            chief_complaint: input.chief_complaint().unwrap_or_default().to_string(),
            present_illness: input.present_illness.clone(),
            medical_history: input.medical_history.clone(),
            current_medications: input.current_medications.clone(),
            allergies: input.allergies.clone(),
            family_history: input.family_history.clone(),
            lifestyle: input.lifestyle.clone(),
            systems_review: input.systems_review.clone(),
            other_notes: input.other_notes.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<bool> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = state.now();
        let mut updated = false;
        for anamnesis in state
            .anamneses
            .iter_mut()
            .filter(|anamnesis| anamnesis.patient_id == patient_id)
        {
            anamnesis.chief_complaint = input.chief_complaint().unwrap_or_default().to_string();
            anamnesis.present_illness = input.present_illness.clone();
            anamnesis.medical_history = input.medical_history.clone();
            anamnesis.current_medications = input.current_medications.clone();
            anamnesis.allergies = input.allergies.clone();
            anamnesis.family_history = input.family_history.clone();
            anamnesis.lifestyle = input.lifestyle.clone();
            anamnesis.systems_review = input.systems_review.clone();
            anamnesis.other_notes = input.other_notes.clone();
            anamnesis.updated_at = now;
            updated = true;
        }
        Ok(updated)
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.check_read()
    }
}
