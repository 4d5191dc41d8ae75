pub mod common;
pub mod schedule;
pub mod timetable;
