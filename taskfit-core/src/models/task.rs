use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::hlc::Timestamp;

/// Maximum number of tags a task may carry.
pub const MAX_TAGS: usize = 10;

/// Broad category of a task, used by front ends to group work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DeepWork,
    #[default]
    Admin,
    Quick,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::DeepWork => "deep_work",
            TaskType::Admin => "admin",
            TaskType::Quick => "quick",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deep_work" | "deep-work" | "deepwork" => Ok(TaskType::DeepWork),
            "admin" => Ok(TaskType::Admin),
            "quick" => Ok(TaskType::Quick),
            _ => Err(format!(
                "Unknown task type '{}'. Use deep_work, admin, or quick.",
                s
            )),
        }
    }
}

/// How a due date relates to time zones.
///
/// A floating due date means "this wall-clock time wherever the user is";
/// a fixed one pins the instant to the task's recorded zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimezoneMode {
    #[default]
    Floating,
    Fixed,
}

impl fmt::Display for TimezoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimezoneMode::Floating => "floating",
            TimezoneMode::Fixed => "fixed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TimezoneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "floating" => Ok(TimezoneMode::Floating),
            "fixed" => Ok(TimezoneMode::Fixed),
            _ => Err(format!(
                "Unknown timezone mode '{}'. Use floating or fixed.",
                s
            )),
        }
    }
}

/// Schema-level problems that make a record unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRecord {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("duration must be a positive number of minutes")]
    ZeroDuration,

    #[error("too many tags: {0} (max {MAX_TAGS})")]
    TooManyTags(usize),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// A task record.
///
/// Tasks are versioned by `hlc_timestamp`: every mutation goes through
/// [`Task::stamp`] (directly or via the helpers below), so two records with
/// the same id and different content always carry different timestamps and
/// the one with the greater timestamp is authoritative.
///
/// Deletion is a tombstone. `deleted_at` is set and the row is kept, so a
/// delete merges like any other write instead of resurrecting when a stale
/// update arrives late.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone_mode: TimezoneMode,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub hlc_timestamp: Timestamp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Task {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        duration_minutes: u32,
        hlc_timestamp: Timestamp,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            duration_minutes,
            task_type: TaskType::default(),
            tags: Vec::new(),
            is_completed: false,
            due_at: None,
            timezone_mode: TimezoneMode::default(),
            timezone: default_timezone(),
            hlc_timestamp,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the due date along with how it should follow the user's zone.
    pub fn with_due(
        mut self,
        due_at: DateTime<Utc>,
        timezone_mode: TimezoneMode,
        timezone: impl Into<String>,
    ) -> Self {
        self.due_at = Some(due_at);
        self.timezone_mode = timezone_mode;
        self.timezone = timezone.into();
        self
    }

    /// Records a new version of this task.
    ///
    /// Call after any field change; the timestamp must come from the local
    /// clock's `tick`.
    pub fn stamp(&mut self, hlc_timestamp: Timestamp) {
        self.hlc_timestamp = hlc_timestamp;
        self.updated_at = Utc::now();
    }

    /// Marks the task complete as a new version.
    pub fn complete(&mut self, hlc_timestamp: Timestamp) {
        self.is_completed = true;
        self.stamp(hlc_timestamp);
    }

    /// Tombstones the task as a new version.
    pub fn tombstone(&mut self, hlc_timestamp: Timestamp) {
        self.deleted_at = Some(Utc::now());
        self.stamp(hlc_timestamp);
    }

    /// Whether the task should show up in day-to-day views.
    pub fn is_active(&self) -> bool {
        !self.is_completed && self.deleted_at.is_none()
    }

    /// Validates schema-level invariants.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.title.trim().is_empty() {
            return Err(InvalidRecord::EmptyTitle);
        }
        if self.duration_minutes == 0 {
            return Err(InvalidRecord::ZeroDuration);
        }
        if self.tags.len() > MAX_TAGS {
            return Err(InvalidRecord::TooManyTags(self.tags.len()));
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(InvalidRecord::UnknownTimezone(self.timezone.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "Id: {}", self.id)?;
        writeln!(f, "Duration: {}m", self.duration_minutes)?;
        writeln!(f, "Type: {}", self.task_type)?;
        if let Some(due) = self.due_at {
            writeln!(f, "Due: {} ({})", due.to_rfc3339(), self.timezone_mode)?;
        }
        if !self.tags.is_empty() {
            writeln!(f, "Tags: {}", self.tags.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::Clock;

    fn stamp() -> Timestamp {
        Clock::new("node-test").tick()
    }

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("user-1", "Write report", 30, stamp());
        assert_eq!(task.title, "Write report");
        assert_eq!(task.duration_minutes, 30);
        assert_eq!(task.task_type, TaskType::Admin);
        assert_eq!(task.timezone_mode, TimezoneMode::Floating);
        assert_eq!(task.timezone, "UTC");
        assert!(task.tags.is_empty());
        assert!(!task.is_completed);
        assert!(task.due_at.is_none());
        assert!(task.deleted_at.is_none());
        assert!(task.is_active());
    }

    #[test]
    fn test_task_builders() {
        let due = Utc::now();
        let task = Task::new("user-1", "Prep talk", 60, stamp())
            .with_description("Slides and dry run")
            .with_task_type(TaskType::DeepWork)
            .with_tags(vec!["work".to_string()])
            .with_due(due, TimezoneMode::Fixed, "Europe/Berlin");

        assert_eq!(task.description.as_deref(), Some("Slides and dry run"));
        assert_eq!(task.task_type, TaskType::DeepWork);
        assert_eq!(task.due_at, Some(due));
        assert_eq!(task.timezone_mode, TimezoneMode::Fixed);
        assert_eq!(task.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_stamp_changes_version() {
        let mut clock = Clock::new("node-1");
        let mut task = Task::new("user-1", "Title", 10, clock.tick());
        let v1 = task.hlc_timestamp.clone();

        task.title = "New title".to_string();
        task.stamp(clock.tick());
        assert!(task.hlc_timestamp > v1);
    }

    #[test]
    fn test_complete_and_tombstone_are_versioned() {
        let mut clock = Clock::new("node-1");
        let mut task = Task::new("user-1", "Title", 10, clock.tick());
        let v1 = task.hlc_timestamp.clone();

        task.complete(clock.tick());
        assert!(task.is_completed);
        assert!(!task.is_active());
        assert!(task.hlc_timestamp > v1);

        let v2 = task.hlc_timestamp.clone();
        task.tombstone(clock.tick());
        assert!(task.deleted_at.is_some());
        assert!(task.hlc_timestamp > v2);
        // The row survives tombstoning; only the marker is set.
        assert_eq!(task.title, "Title");
    }

    #[test]
    fn test_validate() {
        let ok = Task::new("user-1", "Title", 10, stamp());
        assert!(ok.validate().is_ok());

        let mut empty_title = ok.clone();
        empty_title.title = "   ".to_string();
        assert_eq!(empty_title.validate(), Err(InvalidRecord::EmptyTitle));

        let mut zero = ok.clone();
        zero.duration_minutes = 0;
        assert_eq!(zero.validate(), Err(InvalidRecord::ZeroDuration));

        let mut tagged = ok.clone();
        tagged.tags = (0..11).map(|i| format!("tag{i}")).collect();
        assert_eq!(tagged.validate(), Err(InvalidRecord::TooManyTags(11)));

        let mut zone = ok;
        zone.timezone = "Mars/Olympus".to_string();
        assert!(matches!(
            zone.validate(),
            Err(InvalidRecord::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_task_type_round_trip() {
        for t in [TaskType::DeepWork, TaskType::Admin, TaskType::Quick] {
            let parsed: TaskType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("weekly".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let task = Task::new("user-1", "Ship release", 45, stamp())
            .with_tags(vec!["release".to_string()]);
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_json_rejects_malformed_version() {
        let task = Task::new("user-1", "Ship release", 45, stamp());
        let mut value = serde_json::to_value(&task).unwrap();
        value["hlc_timestamp"] = serde_json::json!("not-a-timestamp");
        assert!(serde_json::from_value::<Task>(value).is_err());
    }
}
