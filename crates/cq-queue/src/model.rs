use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Attending,
    Attended,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Attending => "attending",
            QueueStatus::Attended => "attended",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// Waiting and attending entries count against the one-open-entry-per-patient rule.
    pub fn is_active(&self) -> bool {
        matches!(self, QueueStatus::Waiting | QueueStatus::Attending)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "waiting" => Ok(QueueStatus::Waiting),
            "attending" => Ok(QueueStatus::Attending),
            "attended" => Ok(QueueStatus::Attended),
            "cancelled" => Ok(QueueStatus::Cancelled),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: i64,
    pub patient_id: i64,
    pub is_priority: bool,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub served_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Patient attributes joined onto queue rows at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cpf: String,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// One row of the cached waiting line, serialized flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub entry: QueueEntry,
    #[serde(flatten)]
    pub patient: PatientSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientContact {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub cpf: String,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn summary(&self) -> PatientSummary {
        PatientSummary {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            cpf: self.cpf.clone(),
            gender: self.gender.clone(),
            birth_date: self.birth_date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewPatient {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub insurance_provider: Option<String>,
    #[serde(default)]
    pub insurance_number: Option<String>,
    #[serde(default)]
    pub cpf: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Doctor,
    Patient,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Doctor => "doctor",
            UserRole::Patient => "patient",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(UserRole::Admin),
            "doctor" => Ok(UserRole::Doctor),
            "patient" => Ok(UserRole::Patient),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anamnesis {
    pub id: i64,
    pub patient_id: i64,
    pub chief_complaint: String,
    pub present_illness: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub family_history: Option<String>,
    pub lifestyle: Option<String>,
    pub systems_review: Option<String>,
    pub other_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnamnesisInput {
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub present_illness: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub family_history: Option<String>,
    #[serde(default)]
    pub lifestyle: Option<String>,
    #[serde(default)]
    pub systems_review: Option<String>,
    #[serde(default)]
    pub other_notes: Option<String>,
}

impl AnamnesisInput {
    /// The chief complaint, if present and not blank.
    pub fn chief_complaint(&self) -> Option<&str> {
        self.chief_complaint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}
