//! Data Transfer Objects for the HTTP API.
//!
//! Request bodies and response payloads that already derive
//! Serialize/Deserialize are re-exported from the service and model layers.

use serde::{Deserialize, Serialize};

pub use crate::db::services::{CreateNoteRequest, NoteList, UpdateNoteRequest};
pub use crate::models::{Note, NoteStats, Page};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Query parameters for `GET /v1/notes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNotesQuery {
    /// Case-insensitive text matched against name and body
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

/// Query parameters for `GET /v1/notes/page`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: Option<u64>,
    /// Page size (default: 10)
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
}
