use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde_json::{json, Value};

use crate::api::Batch;

/// List and calendar views show one adjacent week of context on each
/// side of the batch span when no explicit window is given.
pub const WINDOW_BUFFER_DAYS: i64 = 7;

const NO_TRAINER: &str = "No trainer assigned";
const NO_ROOM: &str = "TBA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
        }
    }
}

/// One concrete calendar occurrence of a batch's weekly schedule.
/// Recomputed from the batch on every request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInstance {
    pub id: String,
    pub title: String,
    pub program: String,
    pub batch_code: String,
    pub instructor: String,
    pub date: NaiveDate,
    pub time_start: Option<NaiveTime>,
    pub time_end: Option<NaiveTime>,
    pub duration: String,
    pub room: String,
    pub enrolled: i64,
    pub max_students: i64,
    pub status: SessionStatus,
}

impl SessionInstance {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "program": self.program,
            "batchCode": self.batch_code,
            "instructor": self.instructor,
            "date": self.date.format("%Y-%m-%d").to_string(),
            "startTime": format_clock(self.time_start),
            "endTime": format_clock(self.time_end),
            "duration": self.duration,
            "room": self.room,
            "enrolled": self.enrolled,
            "maxStudents": self.max_students,
            "status": self.status.as_str(),
        })
    }
}

/// Expands a batch's recurring weekly pattern into dated sessions over
/// `window` (default: batch span padded by [`WINDOW_BUFFER_DAYS`]).
///
/// A session exists for date d iff `start_date <= d <= end_date` and the
/// weekday of d is one of `schedule_days`. The scan is a linear walk over
/// the window; spans are weeks to months, so there is nothing to gain
/// from a closed-form weekday jump. Malformed schedule fields (missing
/// dates, empty day set, end before start, inverted window) all yield an
/// empty list.
pub fn expand_sessions(
    batch: &Batch,
    window: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Vec<SessionInstance> {
    let (Some(start), Some(end)) = (
        batch.start_date.as_deref().and_then(parse_date),
        batch.end_date.as_deref().and_then(parse_date),
    ) else {
        return Vec::new();
    };
    let days: Vec<Weekday> = batch
        .schedule_days
        .iter()
        .filter_map(|name| parse_weekday(name))
        .collect();

    let (win_start, win_end) = window.unwrap_or((
        start - Duration::days(WINDOW_BUFFER_DAYS),
        end + Duration::days(WINDOW_BUFFER_DAYS),
    ));

    let time_start = batch.schedule_time_start.as_deref().and_then(parse_time);
    let time_end = batch.schedule_time_end.as_deref().and_then(parse_time);
    let duration = match (time_start, time_end) {
        (Some(s), Some(e)) => format_duration(s, e),
        _ => "0m".to_string(),
    };

    let program = batch
        .program
        .as_ref()
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let title = if program.is_empty() {
        batch.batch_id.clone()
    } else {
        program.clone()
    };
    let instructor = batch
        .trainer
        .as_ref()
        .and_then(|t| t.name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| NO_TRAINER.to_string());
    let room = batch
        .room
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| NO_ROOM.to_string());

    let mut out = Vec::new();
    let mut d = win_start;
    while d <= win_end {
        if d >= start && d <= end && days.contains(&d.weekday()) {
            out.push(SessionInstance {
                id: format!("{}-{}", batch.id, d.format("%Y-%m-%d")),
                title: title.clone(),
                program: program.clone(),
                batch_code: batch.batch_id.clone(),
                instructor: instructor.clone(),
                date: d,
                time_start,
                time_end,
                duration: duration.clone(),
                room: room.clone(),
                enrolled: batch.enrolled_students_count.unwrap_or(0),
                max_students: batch.max_students.unwrap_or(0),
                status: derive_status(d, today),
            });
        }
        d = d + Duration::days(1);
    }
    out
}

/// Status comes from the session date against a midnight-normalized
/// "today" only. The batch-level `status` field is never consulted.
pub fn derive_status(date: NaiveDate, today: NaiveDate) -> SessionStatus {
    if date < today {
        SessionStatus::Completed
    } else if date == today {
        SessionStatus::Ongoing
    } else {
        SessionStatus::Scheduled
    }
}

/// Clock-time difference rendered as "4h", "1h 30m" or "45m".
/// Non-positive spans render "0m".
pub fn format_duration(start: NaiveTime, end: NaiveTime) -> String {
    let minutes = (end - start).num_minutes();
    if minutes <= 0 {
        return "0m".to_string();
    }
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let t = s.trim();
    NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .ok()
}

/// Full English day names as the backend stores them, any casing.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn format_clock(t: Option<NaiveTime>) -> String {
    t.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}
