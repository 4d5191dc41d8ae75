//! Storage collaborator contract for timetable items and time slots.
//!
//! Every operation reports success or failure through a `StoreResponse`
//! envelope instead of returning an error, matching the REST API it fronts.

use async_trait::async_trait;

use crate::models::common::StoreResponse;
use crate::models::timetable::{
    CreateTimeSlotRequest, CreateTimetableItemRequest, TimeSlot, TimetableItem,
    UpdateTimetableItemRequest,
};

pub mod memory;

pub use memory::MemoryTimetableStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimetableStore: Send + Sync {
    /// All items currently stored for a timetable
    async fn list_timetable_items(&self, timetable_id: &str) -> StoreResponse<Vec<TimetableItem>>;

    async fn get_all_time_slots(&self) -> StoreResponse<Vec<TimeSlot>>;

    async fn create_time_slot(&self, request: &CreateTimeSlotRequest) -> StoreResponse<TimeSlot>;

    async fn create_timetable_item(
        &self,
        request: &CreateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem>;

    async fn update_timetable_item(
        &self,
        id: &str,
        request: &UpdateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem>;

    async fn delete_timetable_item(&self, id: &str) -> StoreResponse<()>;
}
