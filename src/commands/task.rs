use chrono::Utc;
use clap::Args;

use taskfit_core::{parse_due_string, parse_task_string, Task, TaskType, TimezoneMode};

use crate::config::Config;
use crate::db::{load_clock, MetaRepository, TaskRepository};

/// Resolves a task from a (possibly partial) id.
async fn resolve_task(
    repo: &TaskRepository,
    prefix: &str,
) -> Result<Task, Box<dyn std::error::Error>> {
    let mut matches = repo.find_by_prefix(prefix).await?;
    match matches.len() {
        0 => Err(format!("No task matches id '{}'", prefix).into()),
        1 => Ok(matches.remove(0)),
        n => Err(format!(
            "Id '{}' is ambiguous ({} matches). Give more characters.",
            prefix, n
        )
        .into()),
    }
}

fn short_id(task: &Task) -> String {
    task.id.to_string()[..8].to_string()
}

#[derive(Args)]
pub struct AddCommand {
    /// Task text, e.g. "Write report tomorrow at 10am (30m)"
    #[arg(required = true)]
    pub text: Vec<String>,

    /// Task type (deep_work, admin, quick)
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub task_type: Option<String>,

    /// Add a tag (can be repeated)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Longer description
    #[arg(long, short)]
    pub description: Option<String>,
}

impl AddCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        meta: &MetaRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let text = self.text.join(" ");
        let parsed = parse_task_string(&text, &config.timezone, Utc::now())?;

        let task_type: Option<TaskType> = match &self.task_type {
            Some(raw) => Some(raw.parse().map_err(|e: String| e)?),
            None => None,
        };

        let mut clock = load_clock(meta).await?;
        let mut task = Task::new("local", parsed.title, parsed.duration_minutes, clock.tick());
        if let Some(task_type) = task_type {
            task = task.with_task_type(task_type);
        }
        if !self.tags.is_empty() {
            task = task.with_tags(self.tags.clone());
        }
        if let Some(description) = &self.description {
            task = task.with_description(description.clone());
        }
        if let Some(due) = parsed.due_at {
            task = task.with_due(due, TimezoneMode::Floating, parsed.timezone.clone());
        }

        task.validate()?;

        repo.upsert(&task, true).await?;
        meta.save_clock(&clock.last_issued()).await?;

        println!("Added task {}:", short_id(&task));
        println!("{}", task);
        Ok(())
    }
}

#[derive(Args)]
pub struct ListCommand {
    /// Include completed tasks
    #[arg(long, short)]
    pub all: bool,
}

impl ListCommand {
    pub async fn run(&self, repo: &TaskRepository) -> Result<(), Box<dyn std::error::Error>> {
        let tasks = repo.list(self.all).await?;
        if tasks.is_empty() {
            println!("No tasks. Add one with: taskfit add \"...\"");
            return Ok(());
        }

        for task in &tasks {
            let marker = if task.is_completed { "x" } else { " " };
            let due = task
                .due_at
                .map(|d| format!("  due {}", d.format("%Y-%m-%d %H:%M")))
                .unwrap_or_default();
            println!(
                "[{}] {}  {} ({}m, {}){}",
                marker,
                short_id(task),
                task.title,
                task.duration_minutes,
                task.task_type,
                due
            );
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct DoneCommand {
    /// Task id (or unique prefix)
    pub id: String,
}

impl DoneCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        meta: &MetaRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut task = resolve_task(repo, &self.id).await?;
        if task.is_completed {
            println!("Task {} is already done.", short_id(&task));
            return Ok(());
        }

        let mut clock = load_clock(meta).await?;
        task.complete(clock.tick());
        repo.upsert(&task, true).await?;
        meta.save_clock(&clock.last_issued()).await?;

        println!("Done: {} {}", short_id(&task), task.title);
        Ok(())
    }
}

#[derive(Args)]
pub struct RemoveCommand {
    /// Task id (or unique prefix)
    pub id: String,
}

impl RemoveCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        meta: &MetaRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut task = resolve_task(repo, &self.id).await?;

        let mut clock = load_clock(meta).await?;
        // Tombstone, never a row delete: the removal itself has to sync.
        task.tombstone(clock.tick());
        repo.upsert(&task, true).await?;
        meta.save_clock(&clock.last_issued()).await?;

        println!("Removed: {} {}", short_id(&task), task.title);
        Ok(())
    }
}

#[derive(Args)]
pub struct EditCommand {
    /// Task id (or unique prefix)
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New duration in minutes
    #[arg(long)]
    pub duration: Option<u32>,

    /// New due date ("2026-04-15 09:00", RFC 3339, "tomorrow at 9")
    #[arg(long)]
    pub due: Option<String>,

    /// Clear the due date
    #[arg(long, conflicts_with = "due")]
    pub clear_due: bool,

    /// New description
    #[arg(long, short)]
    pub description: Option<String>,

    /// New task type (deep_work, admin, quick)
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub task_type: Option<String>,
}

impl EditCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        meta: &MetaRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut task = resolve_task(repo, &self.id).await?;

        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(duration) = self.duration {
            task.duration_minutes = duration;
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(raw) = &self.task_type {
            task.task_type = raw.parse().map_err(|e: String| e)?;
        }
        if let Some(due_str) = &self.due {
            match parse_due_string(due_str, &config.timezone, Utc::now())? {
                Some(due) => {
                    task.due_at = Some(due);
                    task.timezone = config.timezone.clone();
                }
                None => return Err(format!("Could not parse due date '{}'", due_str).into()),
            }
        }
        if self.clear_due {
            task.due_at = None;
        }

        task.validate()?;

        let mut clock = load_clock(meta).await?;
        task.stamp(clock.tick());
        repo.upsert(&task, true).await?;
        meta.save_clock(&clock.last_issued()).await?;

        println!("Updated task {}:", short_id(&task));
        println!("{}", task);
        Ok(())
    }
}
