use tracing::debug;

use crate::models::schedule::ClockTime;
use crate::models::timetable::{CreateTimeSlotRequest, TimeSlot};

/// Session-local view of the stored time slots.
///
/// Holds at most one slot per `(start, end)` pair; only exact matches count
/// as the same slot.
#[derive(Debug, Clone, Default)]
pub struct TimeSlotCache {
    slots: Vec<TimeSlot>,
}

impl TimeSlotCache {
    pub fn new(slots: Vec<TimeSlot>) -> Self {
        let mut cache = Self::default();
        for slot in slots {
            cache.insert(slot);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn find(&self, start: &ClockTime, end: &ClockTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|slot| slot.matches(start, end))
    }

    pub fn get(&self, id: &str) -> Option<&TimeSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    /// Add a slot unless one with the same times is already cached.
    /// Returns the id callers should use for that time range.
    pub fn insert(&mut self, slot: TimeSlot) -> String {
        if let Some(existing) = self.find(&slot.start_time, &slot.end_time) {
            debug!(
                "Time slot {}-{} already cached as {}, ignoring {}",
                slot.start_time, slot.end_time, existing.id, slot.id
            );
            return existing.id.clone();
        }
        let id = slot.id.clone();
        self.slots.push(slot);
        id
    }

    /// Request for a new slot covering `start..end`, ordered after every
    /// slot currently cached.
    pub fn new_slot_request(&self, start: ClockTime, end: ClockTime) -> CreateTimeSlotRequest {
        CreateTimeSlotRequest {
            name: slot_name(&start, &end),
            start_time: start,
            end_time: end,
            duration: start.minutes_until(&end),
            is_break: false,
            order: self.slots.len() as u32 + 1,
        }
    }
}

pub fn slot_name(start: &ClockTime, end: &ClockTime) -> String {
    format!("{}-{}", start, end)
}
