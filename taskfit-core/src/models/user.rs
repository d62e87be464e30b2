use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A user profile as the selection engine sees it.
///
/// Users are read-only input here: quiet hours and the home timezone gate
/// what gets surfaced, but the sync engine never versions or merges them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Local wall-clock "HH:mm".
    pub quiet_hours_start: String,
    /// Local wall-clock "HH:mm".
    pub quiet_hours_end: String,
    /// IANA zone name.
    pub timezone: String,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            quiet_hours_start: "22:00".to_string(),
            quiet_hours_end: "08:00".to_string(),
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_quiet_hours(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.quiet_hours_start = start.into();
        self.quiet_hours_end = end.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Checks that the quiet-hours strings and timezone are well-formed.
    pub fn validate(&self) -> Result<(), String> {
        for (label, value) in [
            ("quiet_hours_start", &self.quiet_hours_start),
            ("quiet_hours_end", &self.quiet_hours_end),
        ] {
            if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                return Err(format!("{} must be HH:mm, got '{}'", label, value));
            }
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(format!("unknown timezone '{}'", self.timezone));
        }
        Ok(())
    }
}
