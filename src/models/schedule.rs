use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReconcileError, ReconcileResult};
use crate::models::common::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time of day, written as `HH:MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn minutes_since_midnight(&self) -> i64 {
        i64::from(self.0.hour()) * 60 + i64::from(self.0.minute())
    }

    /// Minutes from `self` to `end` on a 24-hour clock. No overnight wrap:
    /// an `end` earlier than `self` gives a negative value.
    pub fn minutes_until(&self, end: &ClockTime) -> i64 {
        end.minutes_since_midnight() - self.minutes_since_midnight()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|e| format!("Invalid time of day '{}': {}", s, e))?;
        // slots are keyed by minute; a seconds part must not be dropped silently
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(format!(
                "Invalid time of day '{}': seconds are not supported",
                s
            ));
        }
        Ok(ClockTime(time))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of the timetable editor's draft or baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBlock {
    pub id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScheduleBlock {
    pub fn new(
        id: impl Into<String>,
        day_of_week: DayOfWeek,
        start_time: ClockTime,
        end_time: ClockTime,
    ) -> Self {
        Self {
            id: id.into(),
            day_of_week,
            start_time,
            end_time,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Serialized form used for change detection. JSON object keys come out
    /// sorted, so two structurally equal blocks always compare equal.
    pub fn canonical(&self) -> String {
        serde_json::to_value(self)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    pub fn validate_time_range(&self) -> ReconcileResult<()> {
        if self.start_time < self.end_time {
            Ok(())
        } else {
            Err(ReconcileError::InvalidTimeRange {
                block_id: self.id.clone(),
                start: self.start_time,
                end: self.end_time,
            })
        }
    }
}

/// Partial update of a draft block. Unset fields are left alone;
/// `notes: Field::Null` clears the notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub notes: Field<String>,
}

impl BlockPatch {
    pub fn apply_to(&self, block: &mut ScheduleBlock) {
        if let Some(day) = self.day_of_week {
            block.day_of_week = day;
        }
        if let Some(start) = self.start_time {
            block.start_time = start;
        }
        if let Some(end) = self.end_time {
            block.end_time = end;
        }
        match &self.notes {
            Field::Absent => {}
            Field::Null => block.notes = None,
            Field::Value(notes) => block.notes = Some(notes.clone()),
        }
    }
}

/// References a brand-new block needs before it can be stored as a
/// timetable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationContext {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl CreationContext {
    pub fn new(
        class_id: impl Into<String>,
        teacher_id: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            class_id: Some(class_id.into()),
            teacher_id: Some(teacher_id.into()),
            room_id: None,
            start_date,
            end_date: None,
        }
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Returns `(class_id, teacher_id)`, failing when either is missing or blank
    pub fn required_refs(&self, block_id: &str) -> ReconcileResult<(&str, &str)> {
        let class_id = non_blank(self.class_id.as_deref()).ok_or_else(|| {
            ReconcileError::IncompleteCreateContext {
                block_id: block_id.to_string(),
                field: "classId",
            }
        })?;
        let teacher_id = non_blank(self.teacher_id.as_deref()).ok_or_else(|| {
            ReconcileError::IncompleteCreateContext {
                block_id: block_id.to_string(),
                field: "teacherId",
            }
        })?;
        Ok((class_id, teacher_id))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
