//! Structured query vocabulary for note lookups.
//!
//! Backends translate these types into their own predicates: the in-memory
//! repository evaluates them directly, the Postgres repository turns them
//! into Diesel boxed expressions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::note::{Note, NoteId};

/// Default page size for paginated listings and searches.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Predicate tree over the `notes` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteFilter {
    /// Matches every note.
    #[default]
    All,
    Id(NoteId),
    IdIn(Vec<NoteId>),
    /// Case-insensitive substring match on `name`.
    NameContains(String),
    /// Case-insensitive substring match on `body`.
    BodyContains(String),
    /// Inclusive range on `created_at`; either end may be open.
    CreatedBetween {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Logical OR. An empty list matches nothing.
    Any(Vec<NoteFilter>),
    /// Logical AND. An empty list matches everything.
    Every(Vec<NoteFilter>),
}

impl NoteFilter {
    /// `name ILIKE %term% OR body ILIKE %term%`.
    pub fn text_search(term: impl Into<String>) -> Self {
        let term = term.into();
        NoteFilter::Any(vec![
            NoteFilter::NameContains(term.clone()),
            NoteFilter::BodyContains(term),
        ])
    }

    pub fn created_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        NoteFilter::CreatedBetween {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn created_since(from: DateTime<Utc>) -> Self {
        NoteFilter::CreatedBetween {
            from: Some(from),
            to: None,
        }
    }

    /// Evaluate the predicate against a note held in memory.
    pub fn matches(&self, note: &Note) -> bool {
        match self {
            NoteFilter::All => true,
            NoteFilter::Id(id) => note.id == *id,
            NoteFilter::IdIn(ids) => ids.contains(&note.id),
            NoteFilter::NameContains(term) => contains_ignore_case(&note.name, term),
            NoteFilter::BodyContains(term) => contains_ignore_case(&note.body, term),
            NoteFilter::CreatedBetween { from, to } => {
                from.is_none_or(|from| note.created_at >= from)
                    && to.is_none_or(|to| note.created_at <= to)
            }
            NoteFilter::Any(filters) => filters.iter().any(|f| f.matches(note)),
            NoteFilter::Every(filters) => filters.iter().all(|f| f.matches(note)),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSortField {
    #[default]
    CreatedAt,
    Name,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort order for list queries. `id` is always the secondary key, in the
/// same direction, so equal primary keys still page deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteOrder {
    pub field: NoteSortField,
    pub direction: SortDirection,
}

impl NoteOrder {
    pub fn newest_first() -> Self {
        Self::default()
    }

    pub fn new(field: NoteSortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &Note, b: &Note) -> Ordering {
        let primary = match self.field {
            NoteSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            NoteSortField::Name => a.name.cmp(&b.name),
            NoteSortField::Id => a.id.cmp(&b.id),
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Arbitrary filter / sort / window conditions for `find_many`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    pub filter: NoteFilter,
    pub order: NoteOrder,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl NoteQuery {
    pub fn new(filter: NoteFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn order(mut self, order: NoteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }
}

/// Input of `find_with_pagination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: u64,
    pub take: u64,
    pub filter: NoteFilter,
    pub order: NoteOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            skip: 0,
            take: DEFAULT_PAGE_SIZE,
            filter: NoteFilter::All,
            order: NoteOrder::default(),
        }
    }
}

impl PageRequest {
    pub fn new(skip: u64, take: u64) -> Self {
        Self {
            skip,
            take,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: NoteFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order(mut self, order: NoteOrder) -> Self {
        self.order = order;
        self
    }
}

/// One window of a filtered listing plus the bookkeeping callers need to
/// fetch the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub has_more: bool,
    /// 1-based page number.
    pub page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page. `take` must be non-zero.
    pub fn new(items: Vec<T>, total: u64, skip: u64, take: u64) -> Self {
        debug_assert!(take > 0, "page size must be positive");
        Self {
            items,
            total,
            has_more: skip.saturating_add(take) < total,
            page: skip / take + 1,
            total_pages: total.div_ceil(take),
        }
    }
}

/// Window for `search_notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: u64,
    pub offset: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
