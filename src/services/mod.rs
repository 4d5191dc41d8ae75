pub mod diff;
pub mod reconciler;
pub mod time_slots;
