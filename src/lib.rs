//! Timetable Reconciler Service
//!
//! This library keeps an editable draft of a timetable's schedule blocks
//! and saves it back to the school storage API as the minimal set of
//! create, update and delete calls.
//!
//! # Modules
//!
//! - `services::reconciler`: TimetableReconciler holding baseline, draft and creation contexts
//! - `services::diff`: change detection between baseline and draft
//! - `services::time_slots`: time slot lookup and creation by exact time pair
//! - `store`: the TimetableStore trait and its in-memory implementation
//! - `client`: HttpTimetableStore talking to the storage REST API
//! - `handlers` / `routes`: the editing session HTTP service
//!
//! # Saving
//!
//! Saves are not transactional. A failure stops the save and already
//! applied calls stay applied; the baseline is only refreshed by an
//! explicit reload.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export the main API types for ease of use
pub use client::HttpTimetableStore;
pub use config::{ConfigError, Settings, StorageMode};
pub use error::{ReconcileError, ReconcileResult};
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::reconciler::{ApplyMode, ReconcilerOptions, SaveReport, TimetableReconciler};
pub use store::{MemoryTimetableStore, TimetableStore};
