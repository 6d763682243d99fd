//! Clinic queue core.
//!
//! The relational store is the source of truth. [`cache::QueueCache`] keeps a
//! versioned, ordered snapshot of the waiting line so pollers can revalidate
//! cheaply, and [`gateway::QueueGateway`] performs every queue mutation and
//! refreshes that snapshot before returning.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod model;
pub mod postgres;
pub mod priority;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;


pub use cache::{QueueCache, QueueSnapshot};
pub use error::{QueueError, StoreError};
pub use gateway::{AttendOutcome, QueueGateway};
pub use model::{
    Anamnesis, AnamnesisInput, NewPatient, NewUser, Patient, PatientContact, PatientSummary,
    QueueEntry, QueueItem, QueueStatus, User, UserRole,
};
pub use store::{AnamnesisStore, ClinicStore, PatientStore, QueueStore, UserStore};
