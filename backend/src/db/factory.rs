//! Picks and opens a note storage backend.
//!
//! The backend comes from one of three places: an explicit
//! [`RepositoryType`], the process environment, or a `repository.toml` file.
//! All paths end in [`RepositoryBuilder::build`], which hands back an
//! `Arc<dyn NoteRepository>` for the service and HTTP layers.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use super::repo_config::RepositoryConfig;
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{NoteRepository, RepositoryError, RepositoryResult};
use super::PostgresConfig;

/// Which storage backend holds the notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum RepositoryType {
    Postgres,
    /// In-memory, lost on exit
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Accepts `postgres`/`pg` and `local`/`memory`, ignoring case and
    /// surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl TryFrom<String> for RepositoryType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl RepositoryType {
    /// `REPOSITORY_TYPE` when set, else Postgres when a database URL is
    /// present, else Local. An unrecognised `REPOSITORY_TYPE` falls back to
    /// Local with a warning.
    pub fn from_env() -> Self {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return val.parse().unwrap_or_else(|e| {
                log::warn!("{}; falling back to the local repository", e);
                Self::Local
            });
        }

        let has_url = ["DATABASE_URL", "PG_DATABASE_URL"]
            .iter()
            .any(|key| std::env::var(key).is_ok());
        if has_url {
            Self::Postgres
        } else {
            Self::Local
        }
    }
}

#[cfg(feature = "postgres-repo")]
fn postgres_from_env() -> RepositoryResult<Option<PostgresConfig>> {
    PostgresConfig::from_env()
        .map(Some)
        .map_err(RepositoryError::configuration)
}

#[cfg(not(feature = "postgres-repo"))]
fn postgres_from_env() -> RepositoryResult<Option<PostgresConfig>> {
    Err(RepositoryError::configuration(
        "Postgres repository feature not enabled",
    ))
}

/// A backend choice plus the settings needed to open it.
///
/// ```ignore
/// let repo = RepositoryBuilder::new(RepositoryType::Postgres)
///     .postgres_config(PostgresConfig::with_url("postgres://localhost/notes"))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryBuilder {
    repo_type: RepositoryType,
    #[cfg_attr(not(feature = "postgres-repo"), allow(dead_code))]
    postgres_config: Option<PostgresConfig>,
}

impl RepositoryBuilder {
    pub fn new(repo_type: RepositoryType) -> Self {
        Self {
            repo_type,
            postgres_config: None,
        }
    }

    /// Connection settings, required when building a Postgres backend.
    pub fn postgres_config(mut self, config: PostgresConfig) -> Self {
        self.postgres_config = Some(config);
        self
    }

    /// Backend and connection settings from environment variables.
    pub fn from_env() -> RepositoryResult<Self> {
        let repo_type = RepositoryType::from_env();
        let postgres_config = match repo_type {
            RepositoryType::Postgres => postgres_from_env()?,
            RepositoryType::Local => None,
        };
        Ok(Self {
            repo_type,
            postgres_config,
        })
    }

    /// Backend and connection settings from a parsed `repository.toml`.
    pub fn from_config(config: &RepositoryConfig) -> RepositoryResult<Self> {
        Ok(Self {
            repo_type: config.repository_type(),
            postgres_config: config.postgres_config()?,
        })
    }

    pub async fn build(self) -> RepositoryResult<Arc<dyn NoteRepository>> {
        match self.repo_type {
            RepositoryType::Local => Ok(Arc::new(LocalRepository::new())),
            RepositoryType::Postgres => self.open_postgres(),
        }
    }

    #[cfg(feature = "postgres-repo")]
    fn open_postgres(self) -> RepositoryResult<Arc<dyn NoteRepository>> {
        let config = self.postgres_config.ok_or_else(|| {
            RepositoryError::configuration("Postgres repository requires PostgresConfig")
        })?;
        log::info!(
            "Opening Postgres repository (pool max {})",
            config.max_pool_size
        );
        Ok(Arc::new(PostgresRepository::new(config)?))
    }

    #[cfg(not(feature = "postgres-repo"))]
    fn open_postgres(self) -> RepositoryResult<Arc<dyn NoteRepository>> {
        Err(RepositoryError::configuration(
            "Postgres repository feature not enabled",
        ))
    }
}

/// Shorthands over [`RepositoryBuilder`].
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// `postgres_config` is required for [`RepositoryType::Postgres`].
    pub async fn create(
        repo_type: RepositoryType,
        postgres_config: Option<&PostgresConfig>,
    ) -> RepositoryResult<Arc<dyn NoteRepository>> {
        RepositoryBuilder {
            repo_type,
            postgres_config: postgres_config.cloned(),
        }
        .build()
        .await
    }

    /// A fresh, empty in-memory repository.
    pub fn create_local() -> Arc<dyn NoteRepository> {
        Arc::new(LocalRepository::new())
    }

    pub async fn from_env() -> RepositoryResult<Arc<dyn NoteRepository>> {
        RepositoryBuilder::from_env()?.build().await
    }

    pub async fn from_config_file(
        path: impl AsRef<Path>,
    ) -> RepositoryResult<Arc<dyn NoteRepository>> {
        let config = RepositoryConfig::from_file(path)?;
        RepositoryBuilder::from_config(&config)?.build().await
    }

    /// Open the backend named by a `repository.toml` in the standard
    /// locations, or by the environment when there is no such file.
    pub async fn open() -> RepositoryResult<Arc<dyn NoteRepository>> {
        let builder = match RepositoryConfig::discover()? {
            Some(config) => RepositoryBuilder::from_config(&config)?,
            None => RepositoryBuilder::from_env()?,
        };
        builder.build().await
    }
}
