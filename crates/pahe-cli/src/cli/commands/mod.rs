//! CLI command handlers, one file per command.

mod completions;
mod config;
mod download;
mod episodes;
mod lookup;
mod search;

pub use completions::run_completions;
pub use config::run_config;
pub use download::{run_download, DownloadArgs};
pub use episodes::run_episodes;
pub use search::run_search;
