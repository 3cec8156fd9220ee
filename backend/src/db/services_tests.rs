use chrono::{Duration, TimeZone, Utc};

use super::repositories::LocalRepository;
use super::repository::NoteRepository;
use super::services::*;
use crate::models::{NewNote, NoteId};

async fn repo_with(names: &[&str]) -> LocalRepository {
    let repo = LocalRepository::new();
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let notes: Vec<NewNote> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            NewNote::new(*name, format!("body of {}", name))
                .created_at(base + Duration::hours(i as i64))
        })
        .collect();
    repo.create_many(&notes).await.unwrap();
    repo
}

#[tokio::test]
async fn test_create_note_trims_and_persists() {
    let repo = LocalRepository::new();
    let note = create_note(&repo, CreateNoteRequest::new("  Groceries ", "\tmilk, eggs\n"))
        .await
        .unwrap();

    assert_eq!(note.name, "Groceries");
    assert_eq!(note.body, "milk, eggs");

    let fetched = get_note_by_id(&repo, Some(note.id)).await.unwrap();
    assert_eq!(fetched, note);
}

#[tokio::test]
async fn test_create_note_requires_both_fields() {
    let repo = LocalRepository::new();

    let missing_name = CreateNoteRequest {
        name: None,
        description: Some("body".to_string()),
    };
    let err = create_note(&repo, missing_name).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);
    assert_eq!(
        err.to_string(),
        "Failed to create note: Name and description are required"
    );

    let blank_description = CreateNoteRequest::new("title", "   ");
    let err = create_note(&repo, blank_description).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);

    assert_eq!(repo.note_count(), 0);
}

#[tokio::test]
async fn test_get_note_by_id_validation_and_not_found() {
    let repo = LocalRepository::new();

    let err = get_note_by_id(&repo, None).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);

    let err = get_note_by_id(&repo, Some(NoteId(0))).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);

    let err = get_note_by_id(&repo, Some(NoteId(7))).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::NotFound);
    assert_eq!(err.to_string(), "Failed to fetch note: Note 7 not found");
}

#[tokio::test]
async fn test_update_note_changes_only_supplied_fields() {
    let repo = LocalRepository::new();
    let note = create_note(&repo, CreateNoteRequest::new("draft", "original body"))
        .await
        .unwrap();

    let updated = update_note(
        &repo,
        Some(note.id),
        UpdateNoteRequest::default().name(" final ").description("   "),
    )
    .await
    .unwrap();

    assert_eq!(updated.id, note.id);
    assert_eq!(updated.name, "final");
    assert_eq!(updated.body, "original body");
    assert_eq!(updated.created_at, note.created_at);
}

#[tokio::test]
async fn test_update_note_rejects_empty_changes() {
    let repo = LocalRepository::new();
    let note = create_note(&repo, CreateNoteRequest::new("a", "b"))
        .await
        .unwrap();

    let err = update_note(&repo, Some(note.id), UpdateNoteRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);
    assert_eq!(err.operation(), "update note");

    let err = update_note(&repo, None, UpdateNoteRequest::default().name("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Validation);
}

#[tokio::test]
async fn test_update_and_delete_missing_note_have_no_side_effects() {
    let repo = LocalRepository::new();
    create_note(&repo, CreateNoteRequest::new("keep", "me"))
        .await
        .unwrap();

    let err = update_note(&repo, Some(NoteId(99)), UpdateNoteRequest::default().name("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::NotFound);

    let err = delete_note(&repo, Some(NoteId(99))).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::NotFound);
    assert_eq!(err.to_string(), "Failed to delete note: Note 99 not found");

    let list = get_all_notes(&repo, NoteListFilters::default())
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.notes[0].name, "keep");
}

#[tokio::test]
async fn test_delete_note_returns_prior_state() {
    let repo = LocalRepository::new();
    let note = create_note(&repo, CreateNoteRequest::new("gone", "soon"))
        .await
        .unwrap();

    let deleted = delete_note(&repo, Some(note.id)).await.unwrap();
    assert_eq!(deleted, note);
    assert!(!repo.exists(note.id).await.unwrap());
}

#[tokio::test]
async fn test_get_all_notes_window_and_total() {
    let repo = repo_with(&["a", "b", "c", "d", "e"]).await;

    let list = get_all_notes(&repo, NoteListFilters::default().limit(2).offset(1))
        .await
        .unwrap();
    assert_eq!(list.total, 5);
    let names: Vec<&str> = list.notes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["d", "c"]);

    let everything = get_all_notes(&repo, NoteListFilters::default())
        .await
        .unwrap();
    assert_eq!(everything.notes.len(), 5);
    assert_eq!(everything.notes[0].name, "e");
}

#[tokio::test]
async fn test_get_all_notes_zero_policy() {
    let repo = repo_with(&["a", "b", "c"]).await;

    let none = get_all_notes(&repo, NoteListFilters::default().limit(0))
        .await
        .unwrap();
    assert!(none.notes.is_empty());
    assert_eq!(none.total, 3);

    let from_start = get_all_notes(&repo, NoteListFilters::default().offset(0))
        .await
        .unwrap();
    assert_eq!(from_start.notes.len(), 3);
}

#[tokio::test]
async fn test_get_all_notes_search() {
    let repo = LocalRepository::new();
    create_note(&repo, CreateNoteRequest::new("Foo bar", "x"))
        .await
        .unwrap();
    create_note(&repo, CreateNoteRequest::new("other", "contains foo"))
        .await
        .unwrap();
    create_note(&repo, CreateNoteRequest::new("unrelated", "nothing"))
        .await
        .unwrap();

    let list = get_all_notes(&repo, NoteListFilters::default().search("FOO"))
        .await
        .unwrap();
    assert_eq!(list.total, 2);
    assert!(list.notes.iter().all(|n| n.name != "unrelated"));

    let blank = get_all_notes(&repo, NoteListFilters::default().search("   "))
        .await
        .unwrap();
    assert_eq!(blank.total, 3);
}

#[tokio::test]
async fn test_get_notes_stats_counts_trailing_week() {
    let repo = LocalRepository::new();
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    repo.create(&NewNote::new("fresh", "now").created_at(now))
        .await
        .unwrap();
    repo.create(&NewNote::new("stale", "old").created_at(now - Duration::days(10)))
        .await
        .unwrap();

    let stats = get_notes_stats_at(&repo, now).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.recently_created, 1);
}

#[tokio::test]
async fn test_get_notes_stats_uses_current_time() {
    let repo = LocalRepository::new();
    create_note(&repo, CreateNoteRequest::new("today", "hello"))
        .await
        .unwrap();
    let old = create_note(&repo, CreateNoteRequest::new("ancient", "hi"))
        .await
        .unwrap();
    assert!(repo.set_created_at(old.id, Utc::now() - Duration::days(10)));

    let stats = get_notes_stats(&repo).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.recently_created, 1);
}

#[tokio::test]
async fn test_storage_failures_are_classified() {
    let repo = LocalRepository::new();
    repo.set_healthy(false);

    let err = create_note(&repo, CreateNoteRequest::new("a", "b"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Storage);
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("Failed to create note: "));

    let err = get_note_by_id(&repo, Some(NoteId(1))).await.unwrap_err();
    assert_eq!(err.kind(), NoteErrorKind::Storage);

    assert!(!health_check(&repo).await.unwrap());
}

#[tokio::test]
async fn test_services_accept_trait_objects() {
    let repo: std::sync::Arc<dyn NoteRepository> = std::sync::Arc::new(LocalRepository::new());
    let note = create_note(repo.as_ref(), CreateNoteRequest::new("dyn", "works"))
        .await
        .unwrap();
    assert_eq!(
        get_note_by_id(repo.as_ref(), Some(note.id)).await.unwrap(),
        note
    );
    assert!(health_check(repo.as_ref()).await.unwrap());
}
