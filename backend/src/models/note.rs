//! The `Note` entity and its write payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id_type!(i64, NoteId);

/// A persisted note.
///
/// `id` and `created_at` are assigned by the storage backend at creation and
/// never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a single note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub name: String,
    pub body: String,
    /// Creation time override. `None` lets storage stamp the current time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewNote {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            created_at: None,
        }
    }

    /// Back-date (or forward-date) the note being inserted.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Partial update payload. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl NoteChanges {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// True when applying these changes would not touch any column.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.body.is_none()
    }

    /// Apply the changes to an in-memory note.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(ref name) = self.name {
            note.name = name.clone();
        }
        if let Some(ref body) = self.body {
            note.body = body.clone();
        }
    }
}

/// Aggregate counters returned by the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStats {
    pub total: u64,
    /// Notes created within the trailing seven days.
    pub recently_created: u64,
}
