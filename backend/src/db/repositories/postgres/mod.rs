//! Postgres repository implementation using Diesel.
//!
//! The `notes` table is expected to exist already (see `schema.rs`); this
//! backend never creates or alters tables.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Retry with exponential backoff for transient failures (writes only
//!   replay pool checkout failures)
//! - Filter trees compiled into boxed Diesel predicates
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Bool;
use std::time::Duration;
use tokio::task;

use crate::db::repository::{NoteRepository, RepositoryError, RepositoryResult};
use crate::models::{
    NewNote, Note, NoteChanges, NoteFilter, NoteId, NoteOrder, NoteQuery, NoteSortField,
    SortDirection,
};

mod models;
mod schema;

use models::*;
use schema::notes;

type PgPool = Pool<ConnectionManager<PgConnection>>;

type BoxedPredicate = Box<dyn BoxableExpression<notes::table, Pg, SqlType = Bool>>;

/// Rows per INSERT statement in `create_many`, well under the 65535
/// bind-parameter limit.
const INSERT_CHUNK_SIZE: usize = 1000;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the variables and their defaults.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

/// When a failed attempt may be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Reads: any retryable failure is replayed.
    Always,
    /// Writes: only failures before the statement was sent are replayed.
    BeforeStatement,
}

impl Replay {
    fn allows(self, err: &RepositoryError, statement_sent: bool) -> bool {
        err.is_retryable() && (!statement_sent || self == Replay::Always)
    }
}

impl PostgresRepository {
    /// Create a new repository with a connection pool.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection(e.to_string())
                    .with_operation("create_pool")
                    .with_details(format!("max_size={}", config.max_pool_size))
            })?;

        Ok(Self { pool, config })
    }

    /// Run a blocking Diesel closure on the blocking thread pool.
    ///
    /// Failures that `replay` allows are attempted again up to `max_retries`
    /// times, doubling the delay after each attempt.
    async fn with_conn<T, F>(
        &self,
        operation: &'static str,
        replay: Replay,
        f: F,
    ) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let outcome = match pool.get() {
                    Ok(mut conn) => f.clone()(&mut *conn).map_err(|e| (e, true)),
                    Err(e) => Err((RepositoryError::from(e), false)),
                };
                let (err, statement_sent) = match outcome {
                    Ok(value) => return Ok(value),
                    Err(failure) => failure,
                };

                if attempt >= max_retries || !replay.allows(&err, statement_sent) {
                    return Err(err.with_operation(operation));
                }
                attempt += 1;
                log::warn!(
                    "Retrying {} (attempt {}/{}) after {:?}: {}",
                    operation,
                    attempt + 1,
                    max_retries + 1,
                    delay,
                    err
                );
                std::thread::sleep(delay);
                delay *= 2;
            }
        })
        .await
        .map_err(|e| {
            RepositoryError::internal(format!("Task join error: {}", e)).with_operation(operation)
        })?
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Escape LIKE metacharacters and wrap the term for substring matching.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn always(value: bool) -> BoxedPredicate {
    Box::new(sql::<Bool>(if value { "TRUE" } else { "FALSE" }))
}

/// Compile a filter tree into a Diesel predicate over `notes`.
fn build_predicate(filter: &NoteFilter) -> BoxedPredicate {
    match filter {
        NoteFilter::All => always(true),
        NoteFilter::Id(id) => Box::new(notes::id.eq(id.value())),
        NoteFilter::IdIn(ids) => {
            let ids: Vec<i64> = ids.iter().map(NoteId::value).collect();
            Box::new(notes::id.eq_any(ids))
        }
        NoteFilter::NameContains(term) => Box::new(notes::name.ilike(like_pattern(term))),
        NoteFilter::BodyContains(term) => Box::new(notes::body.ilike(like_pattern(term))),
        NoteFilter::CreatedBetween { from, to } => {
            let mut predicate = always(true);
            if let Some(from) = *from {
                predicate = Box::new(predicate.and(notes::created_at.ge(from)));
            }
            if let Some(to) = *to {
                predicate = Box::new(predicate.and(notes::created_at.le(to)));
            }
            predicate
        }
        NoteFilter::Any(filters) => filters
            .iter()
            .map(build_predicate)
            .reduce(|acc, next| Box::new(acc.or(next)))
            .unwrap_or_else(|| always(false)),
        NoteFilter::Every(filters) => filters
            .iter()
            .map(build_predicate)
            .reduce(|acc, next| Box::new(acc.and(next)))
            .unwrap_or_else(|| always(true)),
    }
}

fn apply_order(query: notes::BoxedQuery<'static, Pg>, order: NoteOrder) -> notes::BoxedQuery<'static, Pg> {
    use NoteSortField::*;
    use SortDirection::*;

    match (order.field, order.direction) {
        (CreatedAt, Asc) => query
            .order_by(notes::created_at.asc())
            .then_order_by(notes::id.asc()),
        (CreatedAt, Desc) => query
            .order_by(notes::created_at.desc())
            .then_order_by(notes::id.desc()),
        (Name, Asc) => query
            .order_by(notes::name.asc())
            .then_order_by(notes::id.asc()),
        (Name, Desc) => query
            .order_by(notes::name.desc())
            .then_order_by(notes::id.desc()),
        (Id, Asc) => query.order_by(notes::id.asc()),
        (Id, Desc) => query.order_by(notes::id.desc()),
    }
}

#[async_trait]
impl NoteRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn("health_check", Replay::Always, |conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn create(&self, data: &NewNote) -> RepositoryResult<Note> {
        let row = NewNoteRow::from(data);
        self.with_conn("create", Replay::BeforeStatement, move |conn| {
            diesel::insert_into(notes::table)
                .values(&row)
                .returning(NoteRow::as_returning())
                .get_result::<NoteRow>(conn)
                .map(Note::from)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn find_unique(&self, id: NoteId) -> RepositoryResult<Option<Note>> {
        self.with_conn("find_unique", Replay::Always, move |conn| {
            notes::table
                .find(id.value())
                .select(NoteRow::as_select())
                .first::<NoteRow>(conn)
                .optional()
                .map(|row| row.map(Note::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn update(&self, id: NoteId, changes: &NoteChanges) -> RepositoryResult<Note> {
        if changes.is_empty() {
            // An empty SET clause is invalid SQL; report the current row instead.
            return self
                .find_unique(id)
                .await?
                .ok_or_else(|| RepositoryError::not_found(id).with_operation("update"));
        }

        let changeset = NoteChangeset::from(changes);
        self.with_conn("update", Replay::BeforeStatement, move |conn| {
            diesel::update(notes::table.find(id.value()))
                .set(&changeset)
                .returning(NoteRow::as_returning())
                .get_result::<NoteRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(Note::from)
                .ok_or_else(|| RepositoryError::not_found(id))
        })
        .await
    }

    async fn delete(&self, id: NoteId) -> RepositoryResult<Note> {
        self.with_conn("delete", Replay::BeforeStatement, move |conn| {
            diesel::delete(notes::table.find(id.value()))
                .returning(NoteRow::as_returning())
                .get_result::<NoteRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(Note::from)
                .ok_or_else(|| RepositoryError::not_found(id))
        })
        .await
    }

    async fn find_many(&self, query: &NoteQuery) -> RepositoryResult<Vec<Note>> {
        let query = query.clone();
        self.with_conn("find_many", Replay::Always, move |conn| {
            let mut statement = apply_order(
                notes::table
                    .into_boxed()
                    .filter(build_predicate(&query.filter)),
                query.order,
            );
            if let Some(skip) = query.skip {
                statement = statement.offset(to_i64(skip));
            }
            if let Some(take) = query.take {
                statement = statement.limit(to_i64(take));
            }

            let rows = statement.load::<NoteRow>(conn).map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(Note::from).collect())
        })
        .await
    }

    async fn count(&self, filter: &NoteFilter) -> RepositoryResult<u64> {
        let filter = filter.clone();
        self.with_conn("count", Replay::Always, move |conn| {
            let total: i64 = notes::table
                .filter(build_predicate(&filter))
                .count()
                .get_result(conn)
                .map_err(map_diesel_error)?;
            Ok(total.max(0) as u64)
        })
        .await
    }

    async fn create_many(&self, data: &[NewNote]) -> RepositoryResult<u64> {
        if data.is_empty() {
            return Ok(0);
        }

        let rows: Vec<NewNoteRow> = data.iter().map(NewNoteRow::from).collect();
        self.with_conn("create_many", Replay::BeforeStatement, move |conn| {
            conn.transaction(|tx| {
                let mut inserted = 0usize;
                for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
                    inserted += diesel::insert_into(notes::table)
                        .values(chunk)
                        .execute(tx)?;
                }
                Ok::<_, diesel::result::Error>(inserted as u64)
            })
            .map_err(map_diesel_error)
        })
        .await
    }

    async fn update_many(
        &self,
        filter: &NoteFilter,
        changes: &NoteChanges,
    ) -> RepositoryResult<u64> {
        if changes.is_empty() {
            return self.count(filter).await;
        }

        let filter = filter.clone();
        let changeset = NoteChangeset::from(changes);
        self.with_conn("update_many", Replay::BeforeStatement, move |conn| {
            diesel::update(notes::table.filter(build_predicate(&filter)))
                .set(&changeset)
                .execute(conn)
                .map(|n| n as u64)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn delete_many(&self, filter: &NoteFilter) -> RepositoryResult<u64> {
        let filter = filter.clone();
        self.with_conn("delete_many", Replay::BeforeStatement, move |conn| {
            diesel::delete(notes::table.filter(build_predicate(&filter)))
                .execute(conn)
                .map(|n| n as u64)
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("foo"), "%foo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_config_with_url_uses_defaults() {
        let config = PostgresConfig::with_url("postgres://localhost/notes");
        assert_eq!(config.database_url, "postgres://localhost/notes");
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.max_retries, 3);
    }

    fn filter_sql(filter: &NoteFilter) -> String {
        diesel::debug_query::<Pg, _>(&notes::table.filter(build_predicate(filter))).to_string()
    }

    fn order_sql(order: NoteOrder) -> String {
        let query = apply_order(notes::table.into_boxed(), order);
        diesel::debug_query::<Pg, _>(&query).to_string()
    }

    #[test]
    fn test_search_predicate_renders_ilike() {
        let sql = filter_sql(&NoteFilter::text_search("foo"));
        assert!(sql.contains("ILIKE"));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_created_between_bounds_are_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();

        let sql = filter_sql(&NoteFilter::CreatedBetween {
            from: Some(from),
            to: Some(to),
        });
        assert!(sql.contains(r#""notes"."created_at" >= $1"#), "{}", sql);
        assert!(sql.contains(r#""notes"."created_at" <= $2"#), "{}", sql);
    }

    #[test]
    fn test_created_between_drops_open_bounds() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let since = filter_sql(&NoteFilter::CreatedBetween {
            from: Some(at),
            to: None,
        });
        assert!(since.contains(">="));
        assert!(!since.contains("<="));

        let until = filter_sql(&NoteFilter::CreatedBetween {
            from: None,
            to: Some(at),
        });
        assert!(until.contains("<="));
        assert!(!until.contains(">="));

        let unbounded = filter_sql(&NoteFilter::CreatedBetween {
            from: None,
            to: None,
        });
        assert!(unbounded.contains("WHERE TRUE"), "{}", unbounded);
    }

    #[test]
    fn test_empty_combinators() {
        assert!(filter_sql(&NoteFilter::Any(vec![])).contains("WHERE FALSE"));
        assert!(filter_sql(&NoteFilter::Every(vec![])).contains("WHERE TRUE"));
        assert!(filter_sql(&NoteFilter::All).contains("WHERE TRUE"));
    }

    #[test]
    fn test_id_in_renders_any_array() {
        let sql = filter_sql(&NoteFilter::IdIn(vec![NoteId(1), NoteId(2)]));
        assert!(sql.contains(r#""notes"."id" = ANY($1)"#), "{}", sql);
    }

    #[test]
    fn test_order_breaks_ties_by_id_in_same_direction() {
        let sql = order_sql(NoteOrder::new(NoteSortField::CreatedAt, SortDirection::Desc));
        let primary = sql.find(r#""notes"."created_at" DESC"#).unwrap();
        let tie_break = sql.find(r#""notes"."id" DESC"#).unwrap();
        assert!(primary < tie_break, "{}", sql);

        let sql = order_sql(NoteOrder::new(NoteSortField::Name, SortDirection::Asc));
        let primary = sql.find(r#""notes"."name" ASC"#).unwrap();
        let tie_break = sql.find(r#""notes"."id" ASC"#).unwrap();
        assert!(primary < tie_break, "{}", sql);

        let sql = order_sql(NoteOrder::new(NoteSortField::Id, SortDirection::Asc));
        assert_eq!(sql.matches(r#""notes"."id" ASC"#).count(), 1);
    }

    #[test]
    fn test_writes_replay_only_before_the_statement() {
        let checkout = RepositoryError::timeout("pool exhausted");
        let dropped = RepositoryError::connection("connection reset");

        assert!(Replay::BeforeStatement.allows(&checkout, false));
        assert!(!Replay::BeforeStatement.allows(&dropped, true));

        assert!(Replay::Always.allows(&checkout, false));
        assert!(Replay::Always.allows(&dropped, true));
    }

    #[test]
    fn test_permanent_failures_are_never_replayed() {
        let syntax = RepositoryError::query("syntax error");
        assert!(!Replay::Always.allows(&syntax, true));
        assert!(!Replay::BeforeStatement.allows(&syntax, false));
    }
}
