use thiserror::Error;

use crate::models::schedule::ClockTime;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised while loading or saving a timetable editing session.
///
/// Storage failures carry the collaborator's own message, or a generic
/// fallback when it reported failure without one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("Block {block_id} has no creation context; class and teacher are required")]
    MissingCreateContext { block_id: String },

    #[error("Block {block_id} cannot be created without {field}")]
    IncompleteCreateContext {
        block_id: String,
        field: &'static str,
    },

    #[error("Block {block_id} has an invalid time range {start}-{end}")]
    InvalidTimeRange {
        block_id: String,
        start: ClockTime,
        end: ClockTime,
    },

    #[error("Failed to load time slots: {message}")]
    TimeSlotLoad { message: String },

    #[error("Failed to load timetable items: {message}")]
    ItemLoad { message: String },

    #[error("Failed to create time slot {start}-{end}: {message}")]
    TimeSlotCreate {
        start: ClockTime,
        end: ClockTime,
        message: String,
    },

    #[error("Failed to create timetable item for block {block_id}: {message}")]
    ItemCreate { block_id: String, message: String },

    #[error("Failed to update timetable item {block_id}: {message}")]
    ItemUpdate { block_id: String, message: String },

    #[error("Failed to delete timetable item {block_id}: {message}")]
    ItemDelete { block_id: String, message: String },
}

impl ReconcileError {
    /// True for errors detected locally, before anything was sent to storage
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReconcileError::MissingCreateContext { .. }
                | ReconcileError::IncompleteCreateContext { .. }
                | ReconcileError::InvalidTimeRange { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::MissingCreateContext { .. } => "MISSING_CREATE_CONTEXT",
            ReconcileError::IncompleteCreateContext { .. } => "INCOMPLETE_CREATE_CONTEXT",
            ReconcileError::InvalidTimeRange { .. } => "INVALID_TIME_RANGE",
            ReconcileError::TimeSlotLoad { .. } => "TIME_SLOT_LOAD_FAILED",
            ReconcileError::ItemLoad { .. } => "ITEM_LOAD_FAILED",
            ReconcileError::TimeSlotCreate { .. } => "TIME_SLOT_CREATE_FAILED",
            ReconcileError::ItemCreate { .. } => "ITEM_CREATE_FAILED",
            ReconcileError::ItemUpdate { .. } => "ITEM_UPDATE_FAILED",
            ReconcileError::ItemDelete { .. } => "ITEM_DELETE_FAILED",
        }
    }
}
