use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::common::Field;
use crate::models::schedule::{ClockTime, DayOfWeek};

/// Canonical storage-level `(startTime, endTime)` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    /// Length in minutes
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub is_break: bool,
    #[serde(default)]
    pub order: u32,
}

impl TimeSlot {
    pub fn matches(&self, start: &ClockTime, end: &ClockTime) -> bool {
        self.start_time == *start && self.end_time == *end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeSlotRequest {
    pub name: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub duration: i64,
    pub is_break: bool,
    pub order: u32,
}

/// A persisted timetable entry as returned by storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableItem {
    pub id: String,
    pub timetable_id: String,
    pub class_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    pub day_of_week: DayOfWeek,
    pub time_slot_id: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

/// Create payload. Optional references are always present on the wire,
/// as `null` when the editor did not supply them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimetableItemRequest {
    pub timetable_id: String,
    pub class_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub room_id: Field<String>,
    pub day_of_week: DayOfWeek,
    pub time_slot_id: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Field<NaiveDate>,
    #[serde(default)]
    pub notes: Field<String>,
    pub is_recurring: bool,
}

/// Partial update payload; absent fields are left out of the request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimetableItemRequest {
    pub day_of_week: DayOfWeek,
    pub time_slot_id: String,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub notes: Field<String>,
}
