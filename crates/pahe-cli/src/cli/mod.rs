//! CLI for the apdl AnimePahe downloader.

mod commands;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use pahe_core::config::{self, DownloadBackend, PaheConfig};
use std::path::PathBuf;

use commands::{run_completions, run_config, run_download, run_episodes, run_search, DownloadArgs};

/// Top-level CLI for apdl.
#[derive(Debug, Parser)]
#[command(name = "apdl")]
#[command(about = "apdl: resolve and download AnimePahe episodes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Download backend as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    #[value(name = "yt-dlp")]
    YtDlp,
    Direct,
}

impl From<BackendArg> for DownloadBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::YtDlp => DownloadBackend::YtDlp,
            BackendArg::Direct => DownloadBackend::Direct,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Search the catalog. A trailing "(Dub)" or "(Sub)" filters by audio.
    Search {
        /// Search words.
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Show the episodes available for a series.
    Episodes {
        /// Search words.
        #[arg(required = true)]
        query: Vec<String>,
        /// Result number to use (1-based); prompted for when omitted.
        #[arg(long, value_name = "N")]
        pick: Option<usize>,
    },

    /// Resolve and download a selection of episodes.
    Download {
        /// Search words; prompted for when omitted.
        query: Vec<String>,
        /// Result number to use (1-based); prompted for when omitted.
        #[arg(long, value_name = "N")]
        pick: Option<usize>,
        /// Episode expression such as "1-3,7" or "all"; prompted for when omitted.
        #[arg(long, short = 'e', value_name = "EXPR")]
        episodes: Option<String>,
        /// Downloads root (default from config).
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
        /// Download backend (default from config).
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
        /// Overlap each download with the next episode's resolution.
        #[arg(long)]
        pipeline: bool,
        /// Show the browser window instead of running headless.
        #[arg(long)]
        headed: bool,
        /// WebDriver endpoint (default from config).
        #[arg(long, value_name = "URL")]
        webdriver: Option<String>,
    },

    /// Print the config file path and the effective configuration.
    Config,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Search { query } => run_search(&load_config()?, &query.join(" ")).await?,
            CliCommand::Episodes { query, pick } => {
                run_episodes(&load_config()?, &query.join(" "), pick).await?
            }
            CliCommand::Download {
                query,
                pick,
                episodes,
                output,
                backend,
                pipeline,
                headed,
                webdriver,
            } => {
                let args = DownloadArgs {
                    query: (!query.is_empty()).then(|| query.join(" ")),
                    pick,
                    episodes,
                    output,
                    backend: backend.map(Into::into),
                    pipeline,
                    headed,
                    webdriver,
                };
                run_download(load_config()?, args).await?;
            }
            CliCommand::Config => run_config(&load_config()?)?,
            CliCommand::Completions { shell } => run_completions(shell)?,
        }

        Ok(())
    }
}

fn load_config() -> Result<PaheConfig> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

#[cfg(test)]
mod tests;
