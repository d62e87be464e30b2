//! Task-string parsing.
//!
//! Turns free text like "Write report tomorrow at 10am (30m)" into a
//! title, a duration, and an optional due date. Durations are a
//! parenthesized amount with a unit; due dates are recognized from
//! explicit forms only (RFC 3339, `YYYY-MM-DD` with optional `HH:MM`, and
//! today/tomorrow with an optional `at` clause), resolved against the
//! caller's timezone and reference time so results are reproducible.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

/// Duration assumed when the input does not spell one out.
pub const DEFAULT_DURATION_MINUTES: u32 = 15;

/// Time of day used when a date is given without a time.
const DEFAULT_HOUR: u32 = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTaskError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// The structured result of parsing a task string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub duration_minutes: u32,
    pub due_at: Option<DateTime<Utc>>,
    pub timezone: String,
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\((\d+)\s*(m|min|minutes|h|hr|hours)\)").expect("valid regex")
    })
}

fn rfc3339_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})")
            .expect("valid regex")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:\s+(\d{1,2}):(\d{2}))?\b").expect("valid regex")
    })
}

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(today|tomorrow)(?:\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?)?\b")
            .expect("valid regex")
    })
}

/// Extracts a parenthesized duration, returning the remaining title and
/// the duration in minutes.
///
/// The first duration wins; any later ones stay in the title. Falls back
/// to [`DEFAULT_DURATION_MINUTES`] when none is present.
pub fn parse_duration(input: &str) -> (String, u32) {
    if let Some(caps) = duration_re().captures(input) {
        let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let value: u32 = caps[1].parse().unwrap_or(DEFAULT_DURATION_MINUTES);
        let unit = caps[2].to_lowercase();

        let minutes = if unit.starts_with('h') { value * 60 } else { value };
        let title = collapse_whitespace(&input.replacen(full, "", 1));
        return (title, minutes);
    }

    (collapse_whitespace(input), DEFAULT_DURATION_MINUTES)
}

/// Parses a full task string: duration, then due date, rest is the title.
pub fn parse_task_string(
    input: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<ParsedTask, ParseTaskError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ParseTaskError::UnknownTimezone(timezone.to_string()))?;

    let (after_duration, duration_minutes) = parse_duration(input);
    let (title, due_at) = extract_due_date(&after_duration, tz, now);

    let title = if title.trim().is_empty() {
        let fallback = collapse_whitespace(&after_duration);
        if fallback.is_empty() {
            "Untitled Task".to_string()
        } else {
            fallback
        }
    } else {
        title
    };

    Ok(ParsedTask {
        title,
        duration_minutes,
        due_at,
        timezone: timezone.to_string(),
    })
}

/// Parses a standalone due-date string ("2026-04-15 09:00", RFC 3339,
/// "tomorrow at 9"). Returns `None` when nothing recognizable is present.
pub fn parse_due_string(
    input: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ParseTaskError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ParseTaskError::UnknownTimezone(timezone.to_string()))?;
    Ok(extract_due_date(input, tz, now).1)
}

fn extract_due_date(input: &str, tz: Tz, now: DateTime<Utc>) -> (String, Option<DateTime<Utc>>) {
    if let Some(m) = rfc3339_re().find(input) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(m.as_str()) {
            let title = collapse_whitespace(&input.replacen(m.as_str(), "", 1));
            return (title, Some(parsed.with_timezone(&Utc)));
        }
    }

    if let Some(caps) = date_re().captures(input) {
        let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let date = chrono::NaiveDate::from_ymd_opt(
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(0),
            caps[3].parse().unwrap_or(0),
        );
        let time = match (caps.get(4), caps.get(5)) {
            (Some(h), Some(m)) => NaiveTime::from_hms_opt(
                h.as_str().parse().unwrap_or(0),
                m.as_str().parse().unwrap_or(0),
                0,
            ),
            _ => NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0),
        };
        if let (Some(date), Some(time)) = (date, time) {
            if let Some(due) = local_to_utc(tz, date.and_time(time)) {
                let title = collapse_whitespace(&input.replacen(full, "", 1));
                return (title, Some(due));
            }
        }
    }

    if let Some(caps) = relative_re().captures(input) {
        let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let local_today = now.with_timezone(&tz).date_naive();
        let date = if caps[1].to_lowercase() == "tomorrow" {
            local_today + Duration::days(1)
        } else {
            local_today
        };

        let time = match caps.get(2) {
            Some(h) => {
                let mut hour: u32 = h.as_str().parse().unwrap_or(0);
                let minute: u32 = caps
                    .get(3)
                    .map(|m| m.as_str().parse().unwrap_or(0))
                    .unwrap_or(0);
                match caps.get(4).map(|m| m.as_str().to_lowercase()) {
                    Some(ref meridiem) if meridiem == "pm" && hour < 12 => hour += 12,
                    Some(ref meridiem) if meridiem == "am" && hour == 12 => hour = 0,
                    _ => {}
                }
                NaiveTime::from_hms_opt(hour, minute, 0)
            }
            None => NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0),
        };

        if let Some(time) = time {
            if let Some(due) = local_to_utc(tz, date.and_time(time)) {
                let title = collapse_whitespace(&input.replacen(full, "", 1));
                return (title, Some(due));
            }
        }
    }

    (collapse_whitespace(input), None)
}

/// Resolves a wall-clock time in a zone to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier offset; times inside a
/// DST gap are pushed forward an hour.
fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_duration_extraction() {
        let (title, duration) = parse_duration("Buy milk (15m)");
        assert_eq!(title, "Buy milk");
        assert_eq!(duration, 15);
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(parse_duration("Task (2h)").1, 120);
        assert_eq!(parse_duration("Task (1 hr)").1, 60);
        assert_eq!(parse_duration("Task (90 min)").1, 90);
        assert_eq!(parse_duration("Task (10 minutes)").1, 10);
    }

    #[test]
    fn test_duration_default_when_unspecified() {
        let (title, duration) = parse_duration("Buy milk");
        assert_eq!(title, "Buy milk");
        assert_eq!(duration, DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn test_duration_first_match_wins() {
        let (title, duration) = parse_duration("Buy milk (15m) (30m)");
        assert_eq!(title, "Buy milk (30m)");
        assert_eq!(duration, 15);
    }

    #[test]
    fn test_empty_input_gets_untitled_fallback() {
        let parsed = parse_task_string("", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "Untitled Task");
        assert_eq!(parsed.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert!(parsed.due_at.is_none());
    }

    #[test]
    fn test_only_duration_gets_untitled_fallback() {
        let parsed = parse_task_string("(45m)", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "Untitled Task");
        assert_eq!(parsed.duration_minutes, 45);
    }

    #[test]
    fn test_tomorrow_with_time() {
        let parsed =
            parse_task_string("Call mom tomorrow at 10am (30m)", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "Call mom");
        assert_eq!(parsed.duration_minutes, 30);
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_tomorrow_resolves_in_user_timezone() {
        // 15:00 UTC on 2026-03-10 is already 00:00 on 2026-03-11 in Tokyo,
        // so "tomorrow" there is the 12th.
        let parsed =
            parse_task_string("Standup tomorrow at 9", "Asia/Tokyo", reference_now()).unwrap();
        let due = parsed.due_at.unwrap();
        let local = due.with_timezone(&chrono_tz::Asia::Tokyo);
        assert_eq!(local.date_naive().to_string(), "2026-03-12");
        assert_eq!(parsed.title, "Standup");
    }

    #[test]
    fn test_today_without_time_defaults_to_noon() {
        let parsed = parse_task_string("Pay rent today", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "Pay rent");
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_pm_clause() {
        let parsed =
            parse_task_string("Review PRs today at 4:30pm", "UTC", reference_now()).unwrap();
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 16, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_explicit_date_with_time() {
        let parsed =
            parse_task_string("File taxes 2026-04-15 09:00 (2h)", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "File taxes");
        assert_eq!(parsed.duration_minutes, 120);
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 4, 15, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_explicit_date_resolves_in_user_timezone() {
        let parsed = parse_task_string(
            "Board meeting 2026-04-15 09:00",
            "America/New_York",
            reference_now(),
        )
        .unwrap();
        // 09:00 EDT is 13:00 UTC.
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 4, 15, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_rfc3339_passthrough() {
        let parsed = parse_task_string(
            "Deploy 2026-05-01T08:00:00Z (20m)",
            "Asia/Tokyo",
            reference_now(),
        )
        .unwrap();
        assert_eq!(parsed.title, "Deploy");
        assert_eq!(
            parsed.due_at,
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_plain_text_has_no_due_date() {
        let parsed = parse_task_string("Read a chapter", "UTC", reference_now()).unwrap();
        assert_eq!(parsed.title, "Read a chapter");
        assert!(parsed.due_at.is_none());
    }

    #[test]
    fn test_parse_due_string_alone() {
        let due = parse_due_string("2026-04-15 09:00", "UTC", reference_now()).unwrap();
        assert_eq!(due, Some(Utc.with_ymd_and_hms(2026, 4, 15, 9, 0, 0).unwrap()));

        let none = parse_due_string("someday", "UTC", reference_now()).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        assert_eq!(
            parse_task_string("Anything", "Mars/Olympus", reference_now()),
            Err(ParseTaskError::UnknownTimezone("Mars/Olympus".to_string()))
        );
    }
}
