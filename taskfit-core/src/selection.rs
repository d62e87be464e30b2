//! Task selection over merged state.
//!
//! Pure functions a front end calls against a snapshot of records: quiet
//! hours decide whether to surface anything at all, time fitting ranks
//! what fits into an open slot. Nothing here reads clocks or stores;
//! results are recomputed fresh on every call.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::{Task, User};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("quiet hours must be HH:mm, got '{0}'")]
    MalformedQuietHours(String),
}

/// Whether `at` falls inside the user's quiet hours.
///
/// The window is built from the user's wall-clock settings on the calendar
/// day of `at` in the user's zone. When start <= end the window is within
/// one day; when start > end it crosses midnight. Both boundary instants
/// are inside. A window with start == end covers exactly that one instant
/// of the day, nothing more.
pub fn is_in_quiet_hours(user: &User, at: DateTime<Utc>) -> Result<bool, SelectionError> {
    let tz: Tz = user
        .timezone
        .parse()
        .map_err(|_| SelectionError::UnknownTimezone(user.timezone.clone()))?;

    let start = parse_wall_clock(&user.quiet_hours_start)?;
    let end = parse_wall_clock(&user.quiet_hours_end)?;

    // Wall-clock comparison on the calendar day of `at`; instants are not
    // rebuilt through the zone, which keeps DST transitions out of it.
    let local = at.with_timezone(&tz).naive_local();
    let day = local.date();
    let window_start = day.and_time(start);
    let window_end = day.and_time(end);

    if start <= end {
        Ok(local >= window_start && local <= window_end)
    } else {
        Ok(local >= window_start || local <= window_end)
    }
}

fn parse_wall_clock(value: &str) -> Result<NaiveTime, SelectionError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| SelectionError::MalformedQuietHours(value.to_string()))
}

/// Tasks that fit into `available_minutes`, best candidates first.
///
/// Completed and tombstoned tasks are excluded, as is anything longer than
/// the slot. Tasks with a due date come first, nearest due date leading;
/// tasks without one follow, longest first so the slot is filled with as
/// little slack as possible. The sort is stable for equal keys.
pub fn find_fitting_tasks(tasks: &[Task], available_minutes: u32) -> Vec<Task> {
    let mut fitting: Vec<Task> = tasks
        .iter()
        .filter(|t| t.is_active() && t.duration_minutes <= available_minutes)
        .cloned()
        .collect();

    fitting.sort_by(|a, b| match (&a.due_at, &b.due_at) {
        (Some(a_due), Some(b_due)) => a_due.cmp(b_due),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.duration_minutes.cmp(&a.duration_minutes),
    });

    fitting
}
