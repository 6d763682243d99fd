use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{
    Anamnesis, AnamnesisInput, NewPatient, NewUser, Patient, PatientContact, QueueEntry,
    QueueItem, User,
};

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>>;

    /// True when the patient already holds a waiting or attending entry.
    async fn has_active_entry(&self, patient_id: i64) -> StoreResult<bool>;

    /// Inserts a new entry in `waiting`.
    async fn insert_entry(&self, patient_id: i64, is_priority: bool) -> StoreResult<QueueEntry>;

    /// Inserts the patient and their waiting entry in one transaction.
    async fn register_and_enqueue(
        &self,
        patient: &NewPatient,
        is_priority: bool,
    ) -> StoreResult<(Patient, QueueEntry)>;

    /// All waiting entries joined with patient attributes.
    async fn list_waiting(&self) -> StoreResult<Vec<QueueItem>>;

    /// The most recently served entry still in `attending`.
    async fn current_attending(&self) -> StoreResult<Option<QueueItem>>;

    async fn entry_contact(&self, entry_id: i64) -> StoreResult<Option<PatientContact>>;

    async fn entry_patient_id(&self, entry_id: i64) -> StoreResult<Option<i64>>;

    /// waiting -> attending; false when the entry was not waiting.
    async fn start_attending(&self, entry_id: i64) -> StoreResult<bool>;

    /// attending -> attended; false when the entry was not attending.
    async fn finish_attending(&self, entry_id: i64) -> StoreResult<bool>;

    /// Any status -> cancelled; false only when the entry does not exist.
    async fn cancel(&self, entry_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn create_patient(&self, patient: &NewPatient) -> StoreResult<Patient>;
    async fn patient_by_user(&self, user_id: i64) -> StoreResult<Option<Patient>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;
    async fn user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn list_doctors(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait AnamnesisStore: Send + Sync {
    async fn anamneses_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Anamnesis>>;
    async fn create_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<i64>;
    /// False when the patient has no anamnesis yet.
    async fn update_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<bool>;
}

#[async_trait]
pub trait ClinicStore: QueueStore + PatientStore + UserStore + AnamnesisStore {
    async fn health_check(&self) -> StoreResult<()>;
}
