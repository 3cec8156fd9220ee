//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use notes_backend::db::repositories::LocalRepository;
use notes_backend::db::repository::NoteRepository;
use notes_backend::models::{NewNote, Note};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with the given environment variables set (`Some`) or removed
/// (`None`), restoring the previous values afterwards, even on panic.
///
/// Calls are serialized because the environment is process-global and the
/// test harness runs tests on several threads.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _restore = EnvRestore::apply(changes);
    f()
}

struct EnvRestore(Vec<(String, Option<String>)>);

impl EnvRestore {
    fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let mut previous: Vec<(String, Option<String>)> = Vec::new();
        for (key, value) in changes {
            if !previous.iter().any(|(k, _)| k == key) {
                previous.push((key.to_string(), std::env::var(key).ok()));
            }
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        Self(previous)
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.0.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(&key, v),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Fixed reference instant used by fixtures.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Insert `names` one hour apart, oldest first, ending at `reference_time()`.
///
/// Returned notes are in insertion order, so the last one is the newest.
pub async fn seed_notes<R: NoteRepository + ?Sized>(repo: &R, names: &[&str]) -> Vec<Note> {
    let count = names.len() as i64;
    let mut notes = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let created_at = reference_time() - Duration::hours(count - 1 - i as i64);
        let note = repo
            .create(&NewNote::new(*name, format!("body of {}", name)).created_at(created_at))
            .await
            .unwrap();
        notes.push(note);
    }
    notes
}

/// A fresh in-memory repository holding `names` (see [`seed_notes`]).
pub async fn seeded_local(names: &[&str]) -> LocalRepository {
    let repo = LocalRepository::new();
    seed_notes(&repo, names).await;
    repo
}
