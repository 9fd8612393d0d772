// Visit notes

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{decode, to_body, Id, Page};
use crate::client::ApiClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteTemplate {
    Simple,
    #[serde(rename = "SOAP")]
    Soap,
}

/// Section a bullet is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletCategory {
    Problem,
    Past,
    Family,
    Social,
    Instr,
    #[serde(rename = "PE")]
    Pe,
    #[serde(rename = "ROS")]
    Ros,
    Med,
    Data,
    Assessment,
    Test,
    Tx,
    Narrative,
    Followup,
    Reason,
    Plan,
    Objective,
    Hpi,
    Allergies,
    Habits,
    Assessplan,
    Consultant,
    Attending,
    Dateprocedure,
    Surgical,
    Orders,
    Referenced,
    Procedure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub category: BulletCategory,
    pub text: String,
}

impl Bullet {
    pub fn new(category: BulletCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "type")]
    pub note_type: String,
    pub template: NoteTemplate,
    pub patient: Id,
    pub physician: Id,
    pub document_date: String,
    pub chart_date: String,
    #[serde(default)]
    pub bullets: Vec<Bullet>,
}

/// Input for a note that does not exist in Elation yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    pub note_type: String,
    pub template: NoteTemplate,
    pub patient: Id,
    pub physician: Id,
    pub bullets: Option<Vec<Bullet>>,
    pub chart_date: Option<String>,
    pub document_date: Option<String>,
}

impl Note {
    /// Build an unsaved note; missing dates default to now
    pub fn build(input: NewNote) -> Self {
        Self::build_at(input, Utc::now())
    }

    pub fn build_at(input: NewNote, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            id: None,
            note_type: input.note_type,
            template: input.template,
            patient: input.patient,
            physician: input.physician,
            bullets: input.bullets.unwrap_or_default(),
            chart_date: input.chart_date.unwrap_or_else(|| now.clone()),
            document_date: input.document_date.unwrap_or(now),
        }
    }

    pub fn add_bullet(&mut self, bullet: Bullet) -> &mut Self {
        self.bullets.push(bullet);
        self
    }

    /// Remove the bullet at `idx`; an out-of-range index leaves the note as is
    pub fn remove_bullet(&mut self, idx: usize) -> &mut Self {
        if idx < self.bullets.len() {
            self.bullets.remove(idx);
        }
        self
    }
}

/// Filters for note search; each id becomes a repeated `key[]` parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteSearch {
    pub patient: Vec<Id>,
    pub physician: Vec<Id>,
    pub practice: Vec<Id>,
}

impl NoteSearch {
    /// Request path, e.g. `visit_notes/?patient[]=1&practice[]=9`
    pub fn path(&self) -> String {
        let query: Vec<String> = [
            ("patient", &self.patient),
            ("physician", &self.physician),
            ("practice", &self.practice),
        ]
        .into_iter()
        .flat_map(|(key, ids)| ids.iter().map(move |id| format!("{}[]={}", key, id)))
        .collect();

        if query.is_empty() {
            "visit_notes/".to_string()
        } else {
            format!("visit_notes/?{}", query.join("&"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeletedNote {
    pub id: Id,
    pub deleted: bool,
}

/// Visit-note operations bound to an authenticated client
#[derive(Clone)]
pub struct Notes {
    client: Arc<ApiClient>,
}

impl Notes {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Build and save a new note
    pub async fn create(&self, input: NewNote) -> Result<Note, ApiError> {
        self.save(&Note::build(input)).await
    }

    pub async fn save(&self, note: &Note) -> Result<Note, ApiError> {
        let response = self.client.post("visit_notes/", to_body(note)?, None).await?;
        decode(response).await
    }

    pub async fn get(&self, id: Id) -> Result<Note, ApiError> {
        let response = self.client.get(&format!("visit_notes/{}", id), None).await?;
        decode(response).await
    }

    pub async fn find(&self, search: &NoteSearch) -> Result<Vec<Note>, ApiError> {
        let response = self.client.get(&search.path(), None).await?;
        let page: Page<Note> = decode(response).await?;
        Ok(page.results)
    }

    pub async fn delete(&self, id: Id) -> Result<DeletedNote, ApiError> {
        self.client.delete(&format!("visit_notes/{}", id), None).await?;
        Ok(DeletedNote { id, deleted: true })
    }
}
