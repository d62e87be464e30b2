//! Shared data models.

mod task;
mod user;

pub use task::{InvalidRecord, Task, TaskType, TimezoneMode, MAX_TAGS};
pub use user::User;
