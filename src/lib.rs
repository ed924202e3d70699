//! Transactional, undoable store for captioned image datasets.
//!
//! A [`Store`] wraps one SQLite file holding images, tags, categories and
//! their assignments. Mutations are queued to a single worker thread, applied
//! in their own transaction and recorded in a persisted command log so they
//! can be undone and redone, across restarts, until the store is compacted.
//! Readers see immutable [`Snapshot`]s and subscribe to a broadcast stream of
//! progress and error [`Event`]s.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod import;
pub mod logging;
pub mod model;
pub mod projection;
mod store;
mod worker;

pub use config::Config;
pub use error::{ErrorCode, Result, StoreError};
pub use events::{ErrorEvent, Event, EventBus, EventKind, InfoEvent};
pub use export::ExportSummary;
pub use import::{Dataset, ImportSummary};
pub use model::{Assignment, Category, CategoryId, Image, ImageId, NewImage, Tag, TagId};
pub use projection::{Snapshot, Status, TagSummary};
pub use store::Store;
pub use worker::Pending;
