use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::notes;
use crate::models::{NewNote, Note, NoteChanges, NoteId};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NoteRow {
    pub id: i64,
    pub name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: NoteId(row.id),
            name: row.name,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// `created_at = None` inserts `DEFAULT`, i.e. `now()`.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notes)]
pub struct NewNoteRow {
    pub name: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&NewNote> for NewNoteRow {
    fn from(note: &NewNote) -> Self {
        NewNoteRow {
            name: note.name.clone(),
            body: note.body.clone(),
            created_at: note.created_at,
        }
    }
}

/// `None` fields are left out of the `SET` clause.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = notes)]
pub struct NoteChangeset {
    pub name: Option<String>,
    pub body: Option<String>,
}

impl From<&NoteChanges> for NoteChangeset {
    fn from(changes: &NoteChanges) -> Self {
        NoteChangeset {
            name: changes.name.clone(),
            body: changes.body.clone(),
        }
    }
}
