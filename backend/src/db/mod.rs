//! Database module for note storage.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! The database module follows a layered architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API)                           │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs) - Business Logic           │
//! │  - Input validation and trimming                        │
//! │  - Statistics                                           │
//! │  - Error classification                                 │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository/) - Abstract Interface    │
//! │  - Derived reads: pagination, search, date ranges       │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!          ┌──────────┴───────────┐
//!          ▼                      ▼
//!     ┌──────────┐         ┌──────────────┐
//!     │  Local   │         │   Postgres   │
//!     │(in-mem.) │         │   (Diesel)   │
//!     └──────────┘         └──────────────┘
//! ```
//!
//! # Repository Pattern
//! The module includes:
//! - `services`: High-level business logic functions (use these in your application!)
//! - `repository`: Trait definition for database operations
//! - `repositories::postgres`: Postgres implementation with Diesel ORM
//! - `repositories::local`: In-memory implementation for unit testing and local development
//! - `factory`: Factory for creating repository instances
//!
//! # Recommended Usage
//!
//! ```ignore
//! use notes_backend::db::{services, RepositoryFactory};
//! use notes_backend::db::services::CreateNoteRequest;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!
//!     let note = services::create_note(
//!         repo.as_ref(),
//!         CreateNoteRequest::new("Groceries", "milk, eggs"),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
/// Placeholder so factory signatures stay the same without the Postgres backend.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

// ==================== Service Layer ====================

pub use services::{
    create_note, delete_note, get_all_notes, get_note_by_id, get_notes_stats, get_notes_stats_at,
    health_check, update_note, CreateNoteRequest, NoteErrorKind, NoteList, NoteListFilters,
    NoteServiceError, UpdateNoteRequest,
};

// ==================== Repository Pattern Exports ====================

pub use repo_config::RepositoryConfig;

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{ErrorContext, NoteRepository, RepositoryError, RepositoryResult};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn NoteRepository>> = OnceLock::new();

/// Initialize the global repository singleton.
///
/// The backend is picked by [`RepositoryFactory::open`]: a `repository.toml`
/// when one is found, otherwise the environment. Calling this again after a
/// successful initialization is a no-op.
pub async fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::open()
        .await
        .map_err(|e| anyhow::Error::msg(e.to_string()))?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn NoteRepository>> {
    REPOSITORY
        .get()
        .context("Database not initialized. Call init_repository() first.")
}
