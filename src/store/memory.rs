use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::models::common::{Field, StoreResponse};
use crate::models::timetable::{
    CreateTimeSlotRequest, CreateTimetableItemRequest, TimeSlot, TimetableItem,
    UpdateTimetableItemRequest,
};
use crate::store::TimetableStore;

/// In-memory storage backend.
///
/// Used when the service runs without a storage API (simulation mode) and
/// as the backing store for end-to-end tests. Ids are assigned sequentially
/// (`slot-1`, `item-2`, ...) so results are predictable.
#[derive(Default)]
pub struct MemoryTimetableStore {
    items: Mutex<Vec<TimetableItem>>,
    time_slots: Mutex<Vec<TimeSlot>>,
    next_id: AtomicU64,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, String> {
    mutex
        .lock()
        .map_err(|e| format!("Failed to acquire store lock: {}", e))
}

impl MemoryTimetableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(items: Vec<TimetableItem>, time_slots: Vec<TimeSlot>) -> Self {
        Self {
            items: Mutex::new(items),
            time_slots: Mutex::new(time_slots),
            next_id: AtomicU64::new(0),
        }
    }

    /// Next sequential id that no record in `existing` already uses
    fn generate_id<'a>(
        &self,
        prefix: &str,
        existing: impl Iterator<Item = &'a str> + Clone,
    ) -> String {
        loop {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("{}-{}", prefix, n);
            if !existing.clone().any(|taken| taken == id) {
                return id;
            }
        }
    }

    /// Snapshot of every stored item, in insertion order
    pub fn items(&self) -> Vec<TimetableItem> {
        locked(&self.items).map(|items| items.clone()).unwrap_or_default()
    }

    /// Snapshot of every stored time slot, in insertion order
    pub fn time_slots(&self) -> Vec<TimeSlot> {
        locked(&self.time_slots)
            .map(|slots| slots.clone())
            .unwrap_or_default()
    }

    pub fn item(&self, id: &str) -> Option<TimetableItem> {
        self.items().into_iter().find(|item| item.id == id)
    }
}

#[async_trait]
impl TimetableStore for MemoryTimetableStore {
    async fn list_timetable_items(&self, timetable_id: &str) -> StoreResponse<Vec<TimetableItem>> {
        match locked(&self.items) {
            Ok(items) => StoreResponse::ok(
                items
                    .iter()
                    .filter(|item| item.timetable_id == timetable_id)
                    .cloned()
                    .collect(),
            ),
            Err(e) => StoreResponse::failure(e),
        }
    }

    async fn get_all_time_slots(&self) -> StoreResponse<Vec<TimeSlot>> {
        match locked(&self.time_slots) {
            Ok(slots) => StoreResponse::ok(slots.clone()),
            Err(e) => StoreResponse::failure(e),
        }
    }

    async fn create_time_slot(&self, request: &CreateTimeSlotRequest) -> StoreResponse<TimeSlot> {
        let mut slots = match locked(&self.time_slots) {
            Ok(slots) => slots,
            Err(e) => return StoreResponse::failure(e),
        };

        let slot = TimeSlot {
            id: self.generate_id("slot", slots.iter().map(|s| s.id.as_str())),
            name: request.name.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            duration: request.duration,
            is_break: request.is_break,
            order: request.order,
        };
        debug!("Memory store created time slot {} ({})", slot.id, slot.name);
        slots.push(slot.clone());
        StoreResponse::ok(slot)
    }

    async fn create_timetable_item(
        &self,
        request: &CreateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem> {
        let mut items = match locked(&self.items) {
            Ok(items) => items,
            Err(e) => return StoreResponse::failure(e),
        };

        let item = TimetableItem {
            id: self.generate_id("item", items.iter().map(|i| i.id.as_str())),
            timetable_id: request.timetable_id.clone(),
            class_id: request.class_id.clone(),
            teacher_id: request.teacher_id.clone(),
            room_id: request.room_id.as_value().cloned(),
            day_of_week: request.day_of_week,
            time_slot_id: request.time_slot_id.clone(),
            start_date: Some(request.start_date),
            end_date: request.end_date.as_value().copied(),
            notes: request.notes.as_value().cloned(),
            is_recurring: request.is_recurring,
        };
        debug!("Memory store created timetable item {}", item.id);
        items.push(item.clone());
        StoreResponse::ok(item)
    }

    async fn update_timetable_item(
        &self,
        id: &str,
        request: &UpdateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem> {
        let mut items = match locked(&self.items) {
            Ok(items) => items,
            Err(e) => return StoreResponse::failure(e),
        };

        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return StoreResponse::failure(format!("Timetable item {} not found", id));
        };

        item.day_of_week = request.day_of_week;
        item.time_slot_id = request.time_slot_id.clone();
        match &request.notes {
            Field::Absent => {}
            Field::Null => item.notes = None,
            Field::Value(notes) => item.notes = Some(notes.clone()),
        }
        StoreResponse::ok(item.clone())
    }

    async fn delete_timetable_item(&self, id: &str) -> StoreResponse<()> {
        let mut items = match locked(&self.items) {
            Ok(items) => items,
            Err(e) => return StoreResponse::failure(e),
        };

        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            StoreResponse::failure(format!("Timetable item {} not found", id))
        } else {
            StoreResponse::done()
        }
    }
}
