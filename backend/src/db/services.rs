//! High-level note service layer.
//!
//! This module provides repository-agnostic operations that work with any
//! implementation of [`NoteRepository`]. These functions hold the business
//! rules (required fields, trimming, the recent-notes window) that must stay
//! consistent regardless of the storage backend, and classify every failure
//! into a [`NoteServiceError`].
//!
//! # Usage
//!
//! ```no_run
//! use notes_backend::db::{services, repositories::LocalRepository};
//! use notes_backend::db::services::{CreateNoteRequest, NoteListFilters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = LocalRepository::new();
//!
//!     services::create_note(&repo, CreateNoteRequest::new("Groceries", "milk")).await?;
//!     let list = services::get_all_notes(&repo, NoteListFilters::default()).await?;
//!     println!("Found {} notes", list.total);
//!
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::repository::{NoteRepository, RepositoryError};
use crate::models::{NewNote, Note, NoteChanges, NoteFilter, NoteId, NoteQuery, NoteStats};

/// Notes created within this many days count as recently created.
pub const RECENT_WINDOW_DAYS: i64 = 7;

const OP_CREATE: &str = "create note";
const OP_LIST: &str = "fetch notes";
const OP_FETCH: &str = "fetch note";
const OP_UPDATE: &str = "update note";
const OP_DELETE: &str = "delete note";
const OP_STATS: &str = "fetch note stats";
const OP_HEALTH: &str = "check storage health";

// ==================== Errors ====================

/// Coarse classification of a [`NoteServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteErrorKind {
    Validation,
    NotFound,
    Storage,
}

/// Failure of a service operation. Every variant names the operation that
/// failed, and the `Display` output reads "Failed to <operation>: <cause>".
#[derive(Debug, thiserror::Error)]
pub enum NoteServiceError {
    /// Caller input was rejected.
    #[error("Failed to {operation}: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },

    /// The addressed note does not exist.
    #[error("Failed to {operation}: Note {id} not found")]
    NotFound { operation: &'static str, id: NoteId },

    /// The storage backend failed.
    #[error("Failed to {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl NoteServiceError {
    fn validation(operation: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!("Service layer: rejected {} request: {}", operation, message);
        Self::Validation { operation, message }
    }

    /// Classify a repository failure of an operation not addressed by id.
    fn from_repository(operation: &'static str, err: RepositoryError) -> Self {
        match err {
            RepositoryError::ValidationError { message, .. } => {
                Self::Validation { operation, message }
            }
            source => Self::Storage { operation, source },
        }
    }

    /// Classify a repository failure of an operation addressed by `id`.
    fn for_note(operation: &'static str, id: NoteId, err: RepositoryError) -> Self {
        if err.is_not_found() {
            Self::NotFound { operation, id }
        } else {
            Self::from_repository(operation, err)
        }
    }

    pub fn kind(&self) -> NoteErrorKind {
        match self {
            Self::Validation { .. } => NoteErrorKind::Validation,
            Self::NotFound { .. } => NoteErrorKind::NotFound,
            Self::Storage { .. } => NoteErrorKind::Storage,
        }
    }

    /// The operation that failed, e.g. `"create note"`.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Validation { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Storage { operation, .. } => operation,
        }
    }

    /// True when the underlying storage failure is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { source, .. } if source.is_retryable())
    }
}

/// Result type for service operations
pub type NoteResult<T> = Result<T, NoteServiceError>;

// ==================== Requests & Responses ====================

/// Input of [`create_note`]. Both fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateNoteRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
        }
    }
}

/// Input of [`update_note`]. At least one field must be non-blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateNoteRequest {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input of [`get_all_notes`].
///
/// `limit` and `offset` are applied only when present. `Some(0)` is honored
/// literally: a zero limit returns no notes (the total is still reported),
/// a zero offset skips nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteListFilters {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl NoteListFilters {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Output of [`get_all_notes`]. `total` counts the whole filtered set, not
/// just the returned window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteList {
    pub notes: Vec<Note>,
    pub total: u64,
}

/// Trimmed, non-empty text or `None`.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require_id(operation: &'static str, id: Option<NoteId>) -> NoteResult<NoteId> {
    match id {
        None => Err(NoteServiceError::validation(operation, "Note ID is required")),
        Some(id) if id.value() <= 0 => Err(NoteServiceError::validation(
            operation,
            format!("Note ID must be a positive integer, got {}", id),
        )),
        Some(id) => Ok(id),
    }
}

// ==================== Health ====================

/// Check if the storage backend is healthy.
///
/// This is a simple pass-through to the repository's health check.
pub async fn health_check<R: NoteRepository + ?Sized>(repo: &R) -> NoteResult<bool> {
    repo.health_check()
        .await
        .map_err(|e| NoteServiceError::from_repository(OP_HEALTH, e))
}

// ==================== Note Operations ====================

/// Create a note.
///
/// Both `name` and `description` are trimmed and must be non-empty;
/// `description` is stored as the note body.
///
/// # Returns
/// * `Ok(Note)` - The stored note with its assigned id and timestamp
/// * `Err(NoteServiceError::Validation)` - If either field is missing or blank
pub async fn create_note<R: NoteRepository + ?Sized>(
    repo: &R,
    request: CreateNoteRequest,
) -> NoteResult<Note> {
    let name = non_blank(request.name.as_deref());
    let body = non_blank(request.description.as_deref());
    let (Some(name), Some(body)) = (name, body) else {
        return Err(NoteServiceError::validation(
            OP_CREATE,
            "Name and description are required",
        ));
    };

    let note = repo
        .create(&NewNote::new(name, body))
        .await
        .map_err(|e| NoteServiceError::from_repository(OP_CREATE, e))?;
    info!("Service layer: created note id={}", note.id);
    Ok(note)
}

/// List notes, newest first, optionally filtered by a search term.
///
/// A non-blank `search` matches `name` or `body` case-insensitively. The
/// term is matched as given, surrounding whitespace included. The list and
/// the total count are fetched concurrently.
pub async fn get_all_notes<R: NoteRepository + ?Sized>(
    repo: &R,
    filters: NoteListFilters,
) -> NoteResult<NoteList> {
    let filter = match filters.search.as_deref() {
        Some(term) if !term.trim().is_empty() => NoteFilter::text_search(term),
        _ => NoteFilter::All,
    };
    debug!(
        "Service layer: listing notes (filter={:?}, limit={:?}, offset={:?})",
        filter, filters.limit, filters.offset
    );

    let query = NoteQuery {
        filter,
        skip: filters.offset,
        take: filters.limit,
        ..Default::default()
    };
    let (notes, total) = tokio::try_join!(repo.find_many(&query), repo.count(&query.filter))
        .map_err(|e| NoteServiceError::from_repository(OP_LIST, e))?;

    Ok(NoteList { notes, total })
}

/// Fetch a single note.
///
/// # Returns
/// * `Err(NoteServiceError::Validation)` - If `id` is absent or not positive
/// * `Err(NoteServiceError::NotFound)` - If no note has this id
pub async fn get_note_by_id<R: NoteRepository + ?Sized>(
    repo: &R,
    id: Option<NoteId>,
) -> NoteResult<Note> {
    let id = require_id(OP_FETCH, id)?;
    debug!("Service layer: loading note id={}", id);

    repo.find_unique(id)
        .await
        .map_err(|e| NoteServiceError::for_note(OP_FETCH, id, e))?
        .ok_or(NoteServiceError::NotFound {
            operation: OP_FETCH,
            id,
        })
}

/// Apply a partial update to a note.
///
/// Only supplied, non-blank fields are trimmed and written. The write is a
/// single conditional update, so a missing note surfaces as `NotFound`
/// without a prior existence read.
pub async fn update_note<R: NoteRepository + ?Sized>(
    repo: &R,
    id: Option<NoteId>,
    request: UpdateNoteRequest,
) -> NoteResult<Note> {
    let id = require_id(OP_UPDATE, id)?;

    let changes = NoteChanges {
        name: non_blank(request.name.as_deref()),
        body: non_blank(request.description.as_deref()),
    };
    if changes.is_empty() {
        return Err(NoteServiceError::validation(
            OP_UPDATE,
            "At least one of name or description must be provided",
        ));
    }

    let note = repo
        .update(id, &changes)
        .await
        .map_err(|e| NoteServiceError::for_note(OP_UPDATE, id, e))?;
    info!("Service layer: updated note id={}", id);
    Ok(note)
}

/// Delete a note, returning it as it was before removal.
pub async fn delete_note<R: NoteRepository + ?Sized>(
    repo: &R,
    id: Option<NoteId>,
) -> NoteResult<Note> {
    let id = require_id(OP_DELETE, id)?;

    let note = repo
        .delete(id)
        .await
        .map_err(|e| NoteServiceError::for_note(OP_DELETE, id, e))?;
    info!("Service layer: deleted note id={}", id);
    Ok(note)
}

/// Total note count and the number created in the trailing seven days.
pub async fn get_notes_stats<R: NoteRepository + ?Sized>(repo: &R) -> NoteResult<NoteStats> {
    get_notes_stats_at(repo, Utc::now()).await
}

/// [`get_notes_stats`] relative to an explicit reference instant.
pub async fn get_notes_stats_at<R: NoteRepository + ?Sized>(
    repo: &R,
    now: DateTime<Utc>,
) -> NoteResult<NoteStats> {
    let recent = NoteFilter::created_since(now - Duration::days(RECENT_WINDOW_DAYS));

    let (total, recently_created) =
        tokio::try_join!(repo.count(&NoteFilter::All), repo.count(&recent))
            .map_err(|e| NoteServiceError::from_repository(OP_STATS, e))?;

    Ok(NoteStats {
        total,
        recently_created,
    })
}
