mod config_cmd;
mod fit;
mod sync_cmd;
mod task;

pub use config_cmd::ConfigCommand;
pub use fit::{FitCommand, QuietCommand};
pub use sync_cmd::SyncCommand;
pub use task::{AddCommand, DoneCommand, EditCommand, ListCommand, RemoveCommand};
