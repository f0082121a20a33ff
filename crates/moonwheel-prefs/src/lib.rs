//! `moonwheel-prefs`: durable per-user state in SQLite.
//!
//! Three tables share one connection:
//!
//! | Table              | Owner            | Purpose                                   |
//! |--------------------|------------------|-------------------------------------------|
//! | `users`            | [`PreferenceStore`] | one row per user, partial-upsert semantics |
//! | `quotes`/`prompts` | [`ContentPool`]  | append-only community submissions         |
//! | `delivery_markers` | [`MarkerStore`]  | last-fired guard per (user, notification kind) |
//!
//! The connection lives behind a `Mutex`, so every write is serialised and a
//! read-modify-write upsert can never interleave with another writer.

pub mod content;
pub mod db;
pub mod error;
pub mod markers;
pub mod store;
pub mod types;

pub use content::{ContentPool, PoolKind};
pub use db::SharedConnection;
pub use error::{PrefsError, Result};
pub use markers::{Claim, MarkerStore};
pub use store::PreferenceStore;
pub use types::{PreferenceUpdate, UserPreference};
