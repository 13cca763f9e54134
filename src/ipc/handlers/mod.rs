pub mod classes;
pub mod core;
pub mod setup;
pub mod teachers;
pub mod timetable;
