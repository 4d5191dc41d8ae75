use chrono::NaiveDate;

use crate::models::schedule::{ClockTime, CreationContext, DayOfWeek, ScheduleBlock};
use crate::models::timetable::{TimeSlot, TimetableItem};

pub const TIMETABLE_ID: &str = "timetable_1";

pub fn time(s: &str) -> ClockTime {
    s.parse().expect("Invalid time in fixture")
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("Invalid date in fixture")
}

/// Build a schedule block for tests
pub fn block(id: &str, day: DayOfWeek, start: &str, end: &str) -> ScheduleBlock {
    ScheduleBlock::new(id, day, time(start), time(end))
}

/// Build a stored time slot for tests
pub fn slot(id: &str, start: &str, end: &str) -> TimeSlot {
    TimeSlot {
        id: id.to_string(),
        name: format!("{}-{}", start, end),
        start_time: time(start),
        end_time: time(end),
        duration: time(start).minutes_until(&time(end)),
        is_break: false,
        order: 1,
    }
}

/// Build a stored timetable item that references `time_slot_id`
pub fn item(id: &str, day: DayOfWeek, time_slot_id: &str) -> TimetableItem {
    TimetableItem {
        id: id.to_string(),
        timetable_id: TIMETABLE_ID.to_string(),
        class_id: "class_existing".to_string(),
        teacher_id: "teacher_existing".to_string(),
        room_id: None,
        day_of_week: day,
        time_slot_id: time_slot_id.to_string(),
        start_date: Some(date("2024-01-08")),
        end_date: None,
        notes: None,
        is_recurring: false,
    }
}

/// Creation context with class `c1`, teacher `t1`, starting 2024-03-01
pub fn context() -> CreationContext {
    CreationContext::new("c1", "t1", date("2024-03-01"))
}
