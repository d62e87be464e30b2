use chrono::Utc;
use clap::Args;

use taskfit_core::{find_fitting_tasks, is_in_quiet_hours};

use crate::config::Config;
use crate::db::TaskRepository;

#[derive(Args)]
pub struct FitCommand {
    /// Minutes available right now
    pub minutes: u32,
}

impl FitCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let user = config.user();
        if is_in_quiet_hours(&user, Utc::now())? {
            println!(
                "Heads up: you are inside quiet hours ({} - {}).",
                user.quiet_hours_start, user.quiet_hours_end
            );
        }

        let tasks = repo.list(false).await?;
        let fitting = find_fitting_tasks(&tasks, self.minutes);

        if fitting.is_empty() {
            println!("Nothing fits into {} minutes.", self.minutes);
            return Ok(());
        }

        println!("Tasks that fit into {} minutes:", self.minutes);
        for (i, task) in fitting.iter().enumerate() {
            let due = task
                .due_at
                .map(|d| format!("  due {}", d.format("%Y-%m-%d %H:%M")))
                .unwrap_or_default();
            println!(
                "{}. {}  {} ({}m){}",
                i + 1,
                &task.id.to_string()[..8],
                task.title,
                task.duration_minutes,
                due
            );
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct QuietCommand {}

impl QuietCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let user = config.user();
        let inside = is_in_quiet_hours(&user, Utc::now())?;
        if inside {
            println!(
                "Quiet hours are on ({} - {}, {}).",
                user.quiet_hours_start, user.quiet_hours_end, user.timezone
            );
        } else {
            println!(
                "Quiet hours are off ({} - {}, {}).",
                user.quiet_hours_start, user.quiet_hours_end, user.timezone
            );
        }
        Ok(())
    }
}
