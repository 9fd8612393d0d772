// Resource modules
// Map Elation JSON records onto typed structs using the authenticated verbs

pub mod note;
pub mod patient;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use note::{Bullet, BulletCategory, DeletedNote, NewNote, Note, NoteSearch, NoteTemplate, Notes};
pub use patient::{FindPatients, Patient, PatientUpdate, Patients};

/// Elation object identifier
pub type Id = i64;

/// List endpoints wrap their records in `results`
#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json().await.map_err(ApiError::Decode)
}

fn to_body<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value)
        .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize request body: {}", e)))
}
