//! # Notes Backend
//!
//! A small notes-taking backend: create, read, update, delete, search and
//! paginate notes over a swappable storage backend.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: The `Note` entity and the structured query vocabulary
//!   (filters, ordering, pages)
//! - [`db`]: Repository trait, storage backends, configuration and the
//!   service layer
//! - [`http`]: Axum-based HTTP server and request handlers (feature `http-server`)

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;

#[cfg(feature = "http-server")]
pub mod http;
