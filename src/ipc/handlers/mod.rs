pub mod announcements;
pub mod attendance;
pub mod auth;
pub mod batches;
pub mod certificates;
pub mod core;
pub mod exams;
pub mod grades;
pub mod schedule;
