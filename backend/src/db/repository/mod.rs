//! Repository trait for abstracting note storage.
//!
//! [`NoteRepository`] is split in two halves:
//!
//! - **Required methods** are the storage primitives every backend must
//!   provide: single-row create/read/update/delete, filtered listing and
//!   counting, and the bulk variants.
//! - **Provided methods** are derived read patterns (existence checks,
//!   paginated listings, text search, date ranges) built on top of the
//!   primitives, so every backend gets them for free.
//!
//! Implementations are swapped via dependency injection
//! (`Arc<dyn NoteRepository>`), see [`crate::db::factory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    NewNote, Note, NoteChanges, NoteFilter, NoteId, NoteOrder, NoteQuery, Page, PageRequest,
    SearchOptions,
};

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// Storage operations over the `notes` table.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so a single instance can be shared
/// by every request handler.
///
/// # Error Handling
/// Writes addressed by id (`update`, `delete`) are conditional: when no row
/// matches they fail with [`RepositoryError::NotFound`] instead of reporting
/// success. Reads by id return `Ok(None)` for a missing row.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the storage backend is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Single-row Operations ====================

    /// Insert a note; storage assigns `id` (and `created_at` unless supplied).
    async fn create(&self, data: &NewNote) -> RepositoryResult<Note>;

    /// Fetch a note by its unique id.
    async fn find_unique(&self, id: NoteId) -> RepositoryResult<Option<Note>>;

    /// Apply a partial update to the note with `id` in a single statement.
    ///
    /// # Returns
    /// * `Ok(Note)` - The note after the update
    /// * `Err(RepositoryError::NotFound)` - If no note has this id
    async fn update(&self, id: NoteId, changes: &NoteChanges) -> RepositoryResult<Note>;

    /// Remove the note with `id` in a single statement.
    ///
    /// # Returns
    /// * `Ok(Note)` - The note as it was before deletion
    /// * `Err(RepositoryError::NotFound)` - If no note has this id
    async fn delete(&self, id: NoteId) -> RepositoryResult<Note>;

    // ==================== Filtered Operations ====================

    /// Return every note matching the query's filter, ordering and window.
    async fn find_many(&self, query: &NoteQuery) -> RepositoryResult<Vec<Note>>;

    /// Count the notes matching `filter`.
    async fn count(&self, filter: &NoteFilter) -> RepositoryResult<u64>;

    // ==================== Bulk Operations ====================

    /// Insert several notes atomically. Returns the number inserted.
    async fn create_many(&self, data: &[NewNote]) -> RepositoryResult<u64>;

    /// Apply `changes` to every note matching `filter`. Returns the number changed.
    async fn update_many(&self, filter: &NoteFilter, changes: &NoteChanges)
        -> RepositoryResult<u64>;

    /// Delete every note matching `filter`. Returns the number removed.
    async fn delete_many(&self, filter: &NoteFilter) -> RepositoryResult<u64>;

    // ==================== Derived Operations ====================

    /// Alias of [`NoteRepository::find_unique`].
    async fn find_by_id(&self, id: NoteId) -> RepositoryResult<Option<Note>> {
        self.find_unique(id).await
    }

    /// True when a note with `id` exists.
    async fn exists(&self, id: NoteId) -> RepositoryResult<bool> {
        Ok(self.count(&NoteFilter::Id(id)).await? > 0)
    }

    /// Fetch one page of a filtered listing together with the total count.
    ///
    /// The list query and the count query run concurrently; if either fails
    /// the whole call fails.
    ///
    /// # Returns
    /// * `Err(RepositoryError::ValidationError)` - If `request.take` is zero
    async fn find_with_pagination(&self, request: &PageRequest) -> RepositoryResult<Page<Note>> {
        if request.take == 0 {
            return Err(
                RepositoryError::validation("page size (take) must be greater than zero")
                    .with_operation("find_with_pagination"),
            );
        }

        let query = NoteQuery {
            filter: request.filter.clone(),
            order: request.order,
            skip: Some(request.skip),
            take: Some(request.take),
        };
        let (items, total) =
            tokio::try_join!(self.find_many(&query), self.count(&request.filter))?;

        Ok(Page::new(items, total, request.skip, request.take))
    }

    /// Case-insensitive substring search over `name` and `body`, newest first.
    async fn search_notes(
        &self,
        term: &str,
        options: SearchOptions,
    ) -> RepositoryResult<Vec<Note>> {
        let query = NoteQuery::new(NoteFilter::text_search(term))
            .order(NoteOrder::newest_first())
            .take(options.limit)
            .skip(options.offset);
        self.find_many(&query).await
    }

    /// Notes created within `[start, end]`, newest first.
    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Note>> {
        let query = NoteQuery::new(NoteFilter::created_between(start, end))
            .order(NoteOrder::newest_first());
        self.find_many(&query).await
    }
}
