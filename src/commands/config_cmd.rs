use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show => {
                println!("database_path: {}", config.database_path.display());
                println!(
                    "server_url: {}",
                    config.server_url.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "api_key: {}",
                    if config.api_key.is_some() {
                        "(set)"
                    } else {
                        "(not set)"
                    }
                );
                println!("name: {}", config.name);
                println!("email: {}", config.email);
                println!("timezone: {}", config.timezone);
                println!(
                    "quiet_hours: {} - {}",
                    config.quiet_hours_start, config.quiet_hours_end
                );
                Ok(())
            }
            ConfigSubcommand::Path => {
                println!("{}", Config::default_config_path().display());
                Ok(())
            }
        }
    }
}
