//! In-memory local repository implementation.
//!
//! Notes are kept in a `BTreeMap` behind an `RwLock`, which gives fast,
//! deterministic and isolated storage for unit tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::repository::{NoteRepository, RepositoryError, RepositoryResult};
use crate::models::{NewNote, Note, NoteChanges, NoteFilter, NoteId, NoteQuery};

/// In-memory local repository.
///
/// Cloning is cheap and every clone shares the same underlying data.
///
/// # Example
/// ```
/// use notes_backend::db::repositories::LocalRepository;
/// use notes_backend::db::repository::NoteRepository;
/// use notes_backend::models::NewNote;
///
/// # tokio_test_block(async {
/// let repo = LocalRepository::new();
/// let note = repo.create(&NewNote::new("title", "body")).await.unwrap();
/// assert!(repo.exists(note.id).await.unwrap());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    notes: BTreeMap<NoteId, Note>,
    next_note_id: i64,
    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            notes: BTreeMap::new(),
            next_note_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn insert(&mut self, data: &NewNote) -> Note {
        let id = NoteId(self.next_note_id);
        self.next_note_id += 1;

        let note = Note {
            id,
            name: data.name.clone(),
            body: data.body.clone(),
            created_at: data.created_at.unwrap_or_else(Utc::now),
        };
        self.notes.insert(id, note.clone());
        note
    }

    fn matching_ids(&self, filter: &NoteFilter) -> Vec<NoteId> {
        self.notes
            .values()
            .filter(|note| filter.matches(note))
            .map(|note| note.id)
            .collect()
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    ///
    /// While unhealthy every operation except `health_check` fails with a
    /// retryable connection error.
    pub fn set_healthy(&self, healthy: bool) {
        if let Ok(mut data) = self.data.write() {
            data.is_healthy = healthy;
        }
    }

    /// Overwrite the creation time of a stored note.
    ///
    /// This is a helper for tests exercising recency and date-range queries.
    /// Returns `false` when the note does not exist.
    pub fn set_created_at(&self, id: NoteId, created_at: DateTime<Utc>) -> bool {
        match self.data.write() {
            Ok(mut data) => match data.notes.get_mut(&id) {
                Some(note) => {
                    note.created_at = created_at;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            let is_healthy = data.is_healthy;
            *data = LocalData {
                is_healthy,
                ..Default::default()
            };
        }
    }

    /// Get the number of notes stored, bypassing the health flag.
    pub fn note_count(&self) -> usize {
        self.data.read().map(|d| d.notes.len()).unwrap_or(0)
    }

    fn read(&self, operation: &'static str) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        let data = self.data.read().map_err(|_| poisoned(operation))?;
        if !data.is_healthy {
            return Err(unhealthy(operation));
        }
        Ok(data)
    }

    fn write(&self, operation: &'static str) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        let data = self.data.write().map_err(|_| poisoned(operation))?;
        if !data.is_healthy {
            return Err(unhealthy(operation));
        }
        Ok(data)
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(operation: &'static str) -> RepositoryError {
    RepositoryError::internal("Local storage lock poisoned").with_operation(operation)
}

fn unhealthy(operation: &'static str) -> RepositoryError {
    RepositoryError::connection("Database is not healthy").with_operation(operation)
}

fn to_usize(value: Option<u64>) -> Option<usize> {
    value.map(|v| usize::try_from(v).unwrap_or(usize::MAX))
}

#[async_trait]
impl NoteRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self.data.read().map_err(|_| poisoned("health_check"))?;
        Ok(data.is_healthy)
    }

    async fn create(&self, data: &NewNote) -> RepositoryResult<Note> {
        let mut store = self.write("create")?;
        Ok(store.insert(data))
    }

    async fn find_unique(&self, id: NoteId) -> RepositoryResult<Option<Note>> {
        let store = self.read("find_unique")?;
        Ok(store.notes.get(&id).cloned())
    }

    async fn update(&self, id: NoteId, changes: &NoteChanges) -> RepositoryResult<Note> {
        let mut store = self.write("update")?;
        let note = store
            .notes
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(id).with_operation("update"))?;
        changes.apply_to(note);
        Ok(note.clone())
    }

    async fn delete(&self, id: NoteId) -> RepositoryResult<Note> {
        let mut store = self.write("delete")?;
        store
            .notes
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found(id).with_operation("delete"))
    }

    async fn find_many(&self, query: &NoteQuery) -> RepositoryResult<Vec<Note>> {
        let store = self.read("find_many")?;

        let mut notes: Vec<Note> = store
            .notes
            .values()
            .filter(|note| query.filter.matches(note))
            .cloned()
            .collect();
        notes.sort_by(|a, b| query.order.compare(a, b));

        let skip = to_usize(query.skip).unwrap_or(0);
        let take = to_usize(query.take).unwrap_or(usize::MAX);
        Ok(notes.into_iter().skip(skip).take(take).collect())
    }

    async fn count(&self, filter: &NoteFilter) -> RepositoryResult<u64> {
        let store = self.read("count")?;
        Ok(store.notes.values().filter(|note| filter.matches(note)).count() as u64)
    }

    async fn create_many(&self, data: &[NewNote]) -> RepositoryResult<u64> {
        let mut store = self.write("create_many")?;
        for new_note in data {
            store.insert(new_note);
        }
        Ok(data.len() as u64)
    }

    async fn update_many(
        &self,
        filter: &NoteFilter,
        changes: &NoteChanges,
    ) -> RepositoryResult<u64> {
        let mut store = self.write("update_many")?;
        let ids = store.matching_ids(filter);
        for id in &ids {
            if let Some(note) = store.notes.get_mut(id) {
                changes.apply_to(note);
            }
        }
        Ok(ids.len() as u64)
    }

    async fn delete_many(&self, filter: &NoteFilter) -> RepositoryResult<u64> {
        let mut store = self.write("delete_many")?;
        let ids = store.matching_ids(filter);
        for id in &ids {
            store.notes.remove(id);
        }
        Ok(ids.len() as u64)
    }
}
