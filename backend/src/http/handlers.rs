//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    CreateNoteRequest, HealthResponse, ListNotesQuery, Note, NoteList, NoteStats, Page, PageQuery,
    UpdateNoteRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::services::{self as db_services, NoteListFilters};
use crate::models::{NoteFilter, NoteId, PageRequest, DEFAULT_PAGE_SIZE};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn parse_note_id(raw: &str) -> Result<NoteId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid note id: {}", raw)))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and database is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Note CRUD
// =============================================================================

/// POST /v1/notes
pub async fn create_note(
    State(state): State<AppState>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let note = db_services::create_note(state.repository.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /v1/notes
///
/// List notes newest first, optionally filtered by `search` and windowed by
/// `limit`/`offset`.
pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> HandlerResult<NoteList> {
    let filters = NoteListFilters {
        search: query.search,
        limit: query.limit,
        offset: query.offset,
    };
    let list = db_services::get_all_notes(state.repository.as_ref(), filters).await?;
    Ok(Json(list))
}

/// GET /v1/notes/page
///
/// Paginated listing with page bookkeeping (`has_more`, `page`, `total_pages`).
pub async fn list_notes_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> HandlerResult<Page<Note>> {
    let filter = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => NoteFilter::text_search(term),
        _ => NoteFilter::All,
    };
    let request = PageRequest::new(
        query.skip.unwrap_or(0),
        query.take.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .filter(filter);

    let page = state.repository.find_with_pagination(&request).await?;
    Ok(Json(page))
}

/// GET /v1/notes/stats
pub async fn get_notes_stats(State(state): State<AppState>) -> HandlerResult<NoteStats> {
    let stats = db_services::get_notes_stats(state.repository.as_ref()).await?;
    Ok(Json(stats))
}

/// GET /v1/notes/{id}
pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Note> {
    let id = parse_note_id(&id)?;
    let note = db_services::get_note_by_id(state.repository.as_ref(), Some(id)).await?;
    Ok(Json(note))
}

/// PATCH /v1/notes/{id}
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> HandlerResult<Note> {
    let id = parse_note_id(&id)?;
    let note = db_services::update_note(state.repository.as_ref(), Some(id), request).await?;
    Ok(Json(note))
}

/// DELETE /v1/notes/{id}
///
/// Returns the note as it was before deletion.
pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Note> {
    let id = parse_note_id(&id)?;
    let note = db_services::delete_note(state.repository.as_ref(), Some(id)).await?;
    Ok(Json(note))
}
