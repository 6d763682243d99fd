use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Anamnesis, AnamnesisInput, NewPatient, NewUser, Patient, PatientContact, PatientSummary,
    QueueEntry, QueueItem, QueueStatus, User, UserRole,
};
use crate::store::{AnamnesisStore, ClinicStore, PatientStore, QueueStore, UserStore};

const ENTRY_COLUMNS: &str =
    "qe.id, qe.patient_id, qe.is_priority, qe.status, qe.created_at, qe.served_at, qe.cancelled_at";
const PATIENT_SUMMARY_COLUMNS: &str = "p.name, p.email, p.phone, p.cpf, p.gender, p.birth_date";
const PATIENT_COLUMNS: &str = "id, user_id, name, email, phone, birth_date, gender, \
     insurance_provider, insurance_number, cpf, created_at";
const ANAMNESIS_COLUMNS: &str = "id, patient_id, chief_complaint, present_illness, \
     medical_history, current_medications, allergies, family_history, lifestyle, \
     systems_review, other_notes, created_at, updated_at";

/// [`ClinicStore`] over the schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> StoreResult<QueueEntry> {
    let status: String = row.try_get("status")?;
    Ok(QueueEntry {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        is_priority: row.try_get("is_priority")?,
        status: status.parse::<QueueStatus>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        served_at: row.try_get("served_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<QueueItem> {
    Ok(QueueItem {
        entry: entry_from_row(row)?,
        patient: PatientSummary {
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            cpf: row.try_get("cpf")?,
            gender: row.try_get("gender")?,
            birth_date: row.try_get("birth_date")?,
        },
    })
}

fn patient_from_row(row: &PgRow) -> StoreResult<Patient> {
    Ok(Patient {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        birth_date: row.try_get("birth_date")?,
        gender: row.try_get("gender")?,
        insurance_provider: row.try_get("insurance_provider")?,
        insurance_number: row.try_get("insurance_number")?,
        cpf: row.try_get("cpf")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        login: row.try_get("login")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse::<UserRole>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
    })
}

fn anamnesis_from_row(row: &PgRow) -> StoreResult<Anamnesis> {
    Ok(Anamnesis {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        chief_complaint: row.try_get("chief_complaint")?,
        present_illness: row.try_get("present_illness")?,
        medical_history: row.try_get("medical_history")?,
        current_medications: row.try_get("current_medications")?,
        allergies: row.try_get("allergies")?,
        family_history: row.try_get("family_history")?,
        lifestyle: row.try_get("lifestyle")?,
        systems_review: row.try_get("systems_review")?,
        other_notes: row.try_get("other_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn insert_patient_sql() -> String {
    format!(
        "INSERT INTO patients \
         (user_id, name, email, phone, birth_date, gender, insurance_provider, insurance_number, cpf) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {PATIENT_COLUMNS}"
    )
}

fn insert_entry_sql() -> &'static str {
    "INSERT INTO queue_entries (patient_id, is_priority) VALUES ($1, $2) \
     RETURNING id, patient_id, is_priority, status, created_at, served_at, cancelled_at"
}

#[async_trait]
impl QueueStore for PgStore {
    async fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE cpf = $1"
        ))
        .bind(cpf)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(patient_from_row).transpose()
    }

    async fn has_active_entry(&self, patient_id: i64) -> StoreResult<bool> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM queue_entries \
             WHERE patient_id = $1 AND status IN ('waiting', 'attending'))",
        )
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    async fn insert_entry(&self, patient_id: i64, is_priority: bool) -> StoreResult<QueueEntry> {
        let row = sqlx::query(insert_entry_sql())
            .bind(patient_id)
            .bind(is_priority)
            .fetch_one(&self.pool)
            .await?;
        entry_from_row(&row)
    }

    async fn register_and_enqueue(
        &self,
        patient: &NewPatient,
        is_priority: bool,
    ) -> StoreResult<(Patient, QueueEntry)> {
        // Dropping `tx` on any early return rolls back and releases the connection.
        let mut tx = self.pool.begin().await?;

        let patient_row = sqlx::query(&insert_patient_sql())
            .bind(patient.user_id)
            .bind(&patient.name)
            .bind(&patient.email)
            .bind(&patient.phone)
            .bind(patient.birth_date)
            .bind(&patient.gender)
            .bind(&patient.insurance_provider)
            .bind(&patient.insurance_number)
            .bind(&patient.cpf)
            .fetch_one(&mut *tx)
            .await?;
        let created = patient_from_row(&patient_row)?;

        let entry_row = sqlx::query(insert_entry_sql())
            .bind(created.id)
            .bind(is_priority)
            .fetch_one(&mut *tx)
            .await?;
        let entry = entry_from_row(&entry_row)?;

        tx.commit().await?;
        Ok((created, entry))
    }

    async fn list_waiting(&self) -> StoreResult<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}, {PATIENT_SUMMARY_COLUMNS} \
             FROM queue_entries qe \
             INNER JOIN patients p ON qe.patient_id = p.id \
             WHERE qe.status = 'waiting' \
             ORDER BY qe.is_priority DESC, qe.created_at ASC, qe.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn current_attending(&self) -> StoreResult<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}, {PATIENT_SUMMARY_COLUMNS} \
             FROM queue_entries qe \
             INNER JOIN patients p ON qe.patient_id = p.id \
             WHERE qe.status = 'attending' \
             ORDER BY qe.served_at DESC \
             LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn entry_contact(&self, entry_id: i64) -> StoreResult<Option<PatientContact>> {
        let row = sqlx::query(
            "SELECT p.name, p.email FROM queue_entries qe \
             JOIN patients p ON qe.patient_id = p.id WHERE qe.id = $1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PatientContact {
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        }))
    }

    async fn entry_patient_id(&self, entry_id: i64) -> StoreResult<Option<i64>> {
        let patient_id =
            sqlx::query_scalar::<_, i64>("SELECT patient_id FROM queue_entries WHERE id = $1")
                .bind(entry_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(patient_id)
    }

    async fn start_attending(&self, entry_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'attending', served_at = NOW() \
             WHERE id = $1 AND status = 'waiting'",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finish_attending(&self, entry_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'attended' \
             WHERE id = $1 AND status = 'attending'",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, entry_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'cancelled', cancelled_at = NOW() WHERE id = $1",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PatientStore for PgStore {
    async fn create_patient(&self, patient: &NewPatient) -> StoreResult<Patient> {
        let row = sqlx::query(&insert_patient_sql())
            .bind(patient.user_id)
            .bind(&patient.name)
            .bind(&patient.email)
            .bind(&patient.phone)
            .bind(patient.birth_date)
            .bind(&patient.gender)
            .bind(&patient.insurance_provider)
            .bind(&patient.insurance_number)
            .bind(&patient.cpf)
            .fetch_one(&self.pool)
            .await?;
        patient_from_row(&row)
    }

    async fn patient_by_user(&self, user_id: i64) -> StoreResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = $1 ORDER BY id LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(patient_from_row).transpose()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (login, password_hash, role) VALUES ($1, $2, $3) \
             RETURNING id, login, password_hash, role, created_at",
        )
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, login, password_hash, role, created_at FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_doctors(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, login, password_hash, role, created_at FROM users \
             WHERE role = 'doctor' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }
}

#[async_trait]
impl AnamnesisStore for PgStore {
    async fn anamneses_for_patient(&self, patient_id: i64) -> StoreResult<Vec<Anamnesis>> {
        let rows = sqlx::query(&format!(
            "SELECT {ANAMNESIS_COLUMNS} FROM anamnesis WHERE patient_id = $1 ORDER BY id"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(anamnesis_from_row).collect()
    }

    async fn create_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO anamnesis \
             (patient_id, chief_complaint, present_illness, medical_history, current_medications, \
              allergies, family_history, lifestyle, systems_review, other_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id",
        )
        .bind(patient_id)
        .bind(input.chief_complaint().unwrap_or_default())
        .bind(&input.present_illness)
        .bind(&input.medical_history)
        .bind(&input.current_medications)
        .bind(&input.allergies)
        .bind(&input.family_history)
        .bind(&input.lifestyle)
        .bind(&input.systems_review)
        .bind(&input.other_notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_anamnesis(&self, patient_id: i64, input: &AnamnesisInput) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE anamnesis SET \
             chief_complaint = $1, present_illness = $2, medical_history = $3, \
             current_medications = $4, allergies = $5, family_history = $6, lifestyle = $7, \
             systems_review = $8, other_notes = $9, updated_at = NOW() \
             WHERE patient_id = $10",
        )
        .bind(input.chief_complaint().unwrap_or_default())
        .bind(&input.present_illness)
        .bind(&input.medical_history)
        .bind(&input.current_medications)
        .bind(&input.allergies)
        .bind(&input.family_history)
        .bind(&input.lifestyle)
        .bind(&input.systems_review)
        .bind(&input.other_notes)
        .bind(patient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClinicStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
