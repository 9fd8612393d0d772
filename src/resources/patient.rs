// Patient records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{decode, to_body, Id, Page};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http_client::RequestConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Elation returns zip codes as either strings or numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhoneType {
    Fax,
    Mobile,
    Work,
    Other,
    Night,
    Home,
    Main,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    pub phone: Value,
    pub phone_type: PhoneType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientMetadata {
    pub object_id: Id,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsuranceRank {
    Primary,
    Secondary,
    Tertiary,
}

/// Insurance entry; fields beyond the company, plan and rank vary by payer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_company: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_plan: Option<Id>,
    pub rank: InsuranceRank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub sex: String,
    pub primary_physician: Id,
    pub caregiver_practice: Id,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub phones: Vec<Phone>,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub metadata: Option<PatientMetadata>,
    #[serde(default)]
    pub insurances: Vec<Insurance>,
}

/// Partial update; only the fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_physician: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caregiver_practice: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<Phone>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<Email>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PatientMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurances: Option<Vec<Insurance>>,
}

/// Demographic search filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindPatients {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub sex: Option<String>,
}

impl FindPatients {
    /// Query pairs sorted by key, unset filters omitted
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        [
            ("dob", &self.dob),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("sex", &self.sex),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

/// Patient operations bound to an authenticated client
#[derive(Clone)]
pub struct Patients {
    client: Arc<ApiClient>,
}

impl Patients {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: Id) -> Result<Patient, ApiError> {
        let response = self.client.get(&format!("patients/{}", id), None).await?;
        decode(response).await
    }

    pub async fn find(&self, search: &FindPatients) -> Result<Vec<Patient>, ApiError> {
        let config = RequestConfig {
            query: search.query_pairs(),
            ..RequestConfig::default()
        };
        let response = self.client.get("patients/", Some(config)).await?;
        let page: Page<Patient> = decode(response).await?;
        Ok(page.results)
    }

    pub async fn create(&self, patient: &Patient) -> Result<Patient, ApiError> {
        let response = self.client.post("patients/", to_body(patient)?, None).await?;
        decode(response).await
    }

    pub async fn update(&self, id: Id, update: &PatientUpdate) -> Result<Patient, ApiError> {
        let response = self
            .client
            .put(&format!("patients/{}", id), to_body(update)?, None)
            .await?;
        decode(response).await
    }
}
