//! `apdl download` – search, select episodes, then resolve and download them.

use anyhow::{bail, Result};
use pahe_core::browser::WebDriverLauncher;
use pahe_core::catalog::{CatalogClient, PaheApi};
use pahe_core::config::{DownloadBackend, PaheConfig};
use pahe_core::control::RunControl;
use pahe_core::download::{executor_from_config, DownloadLayout};
use pahe_core::pipeline::{JobStatus, Orchestrator, PipelineEvent, RunReport};
use pahe_core::resolver::BrowserStreamResolver;
use pahe_core::retry::{RetryPolicy, Stage};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use super::lookup::find_series;
use crate::cli::prompt;

/// Command-line overrides for a download run; `None` keeps the config value.
#[derive(Debug, Default)]
pub struct DownloadArgs {
    pub query: Option<String>,
    pub pick: Option<usize>,
    pub episodes: Option<String>,
    pub output: Option<PathBuf>,
    pub backend: Option<DownloadBackend>,
    pub pipeline: bool,
    pub headed: bool,
    pub webdriver: Option<String>,
}

impl DownloadArgs {
    /// Folds the overrides into the loaded config.
    pub fn apply(&self, cfg: &mut PaheConfig) {
        if let Some(dir) = &self.output {
            cfg.download.root = Some(dir.clone());
        }
        if let Some(backend) = self.backend {
            cfg.download.backend = backend;
        }
        if self.pipeline {
            cfg.download.pipeline = true;
        }
        if self.headed {
            cfg.browser.headless = false;
        }
        if let Some(url) = &self.webdriver {
            cfg.browser.webdriver_url = url.clone();
        }
    }
}

pub async fn run_download(mut cfg: PaheConfig, args: DownloadArgs) -> Result<()> {
    args.apply(&mut cfg);

    let api = PaheApi::from_config(&cfg.catalog);
    let raw = match &args.query {
        Some(q) => q.clone(),
        None => prompt::ask("Search anime").await?,
    };
    let anime = find_series(&api, &raw, args.pick).await?;
    let episodes = api.list_episodes(&anime).await?;
    if episodes.is_empty() {
        bail!("{} has no episodes listed", anime.title);
    }
    let range = prompt::range_label(&episodes);
    println!("{}: episodes {} ({} available)", anime.title, range, episodes.len());

    let expr = match &args.episodes {
        Some(e) => e.clone(),
        None => prompt::ask(&format!("Episodes to download ({} or all)", range)).await?,
    };
    let selection = prompt::selection_from(&expr, &episodes)?;

    // Fail on a missing yt-dlp before any browser work.
    let executor = executor_from_config(&cfg.download)?;
    let launcher = WebDriverLauncher::from_config(&cfg.browser);
    let resolver = BrowserStreamResolver::from_config(launcher, &cfg.catalog, &cfg.browser);
    let layout = DownloadLayout::new(&cfg.downloads_root(), &anime.title);
    let series_dir = layout.series_dir().to_path_buf();
    let policy = RetryPolicy::from_config(&cfg);
    tracing::info!(
        anime = %anime.title,
        selection = %selection,
        backend = ?cfg.download.backend,
        dir = %series_dir.display(),
        "starting download run"
    );

    let control = RunControl::new();
    let interrupt = {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted; stopping after cleanup...");
                control.cancel();
            }
        })
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let report = {
        let mut orchestrator = Orchestrator::new(resolver, executor, layout)
            .with_control(control)
            .with_events(tx)
            .pipelined(cfg.download.pipeline);
        orchestrator.run(&selection, &episodes, &policy).await
    };
    // The orchestrator held the only sender, so the printer drains and exits.
    let _ = printer.await;
    interrupt.abort();

    print_summary(&report, &series_dir);
    Ok(())
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Resolve => "resolve",
        Stage::Download => "download",
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::EpisodeStarted { index } => {
                println!("[ep {:>3}] resolving stream", index);
            }
            PipelineEvent::Resolved { index, .. } => {
                println!("[ep {:>3}] stream resolved", index);
            }
            PipelineEvent::DownloadStarted { index, attempt } => {
                if attempt > 1 {
                    println!("[ep {:>3}] downloading (attempt {})", index, attempt);
                } else {
                    println!("[ep {:>3}] downloading", index);
                }
            }
            PipelineEvent::AttemptFailed {
                index,
                stage,
                attempt,
                error,
                retry_in,
            } => {
                println!(
                    "[ep {:>3}] {} attempt {} failed: {} (retry in {:.1}s)",
                    index,
                    stage_label(stage),
                    attempt,
                    error,
                    retry_in.as_secs_f64()
                );
            }
            PipelineEvent::EpisodeFinished(result) => {
                println!("[ep {:>3}] {}", result.episode.index, result.status);
            }
        }
    }
}

/// Comma-separated indices of failed episodes, for re-running with `-e`.
fn failed_episodes(report: &RunReport) -> Option<String> {
    let failed: Vec<String> = report
        .failures()
        .map(|r| r.episode.index.to_string())
        .collect();
    (!failed.is_empty()).then(|| failed.join(","))
}

fn print_summary(report: &RunReport, series_dir: &Path) {
    println!();
    if report.results.is_empty() && report.not_attempted.is_empty() {
        println!("Nothing was downloaded.");
        return;
    }
    println!("{:<8} {:<18} {:<9} {}", "EPISODE", "STATUS", "ATTEMPTS", "DETAIL");
    for r in &report.results {
        let detail = match (r.status, &r.output, &r.last_error) {
            (JobStatus::Succeeded, Some(path), _) => path.display().to_string(),
            (_, _, Some(err)) => err.clone(),
            _ => "-".to_string(),
        };
        println!(
            "{:<8} {:<18} {:<9} {}",
            r.episode.index,
            r.status.to_string(),
            r.attempts,
            detail
        );
    }
    for index in &report.not_attempted {
        println!("{:<8} {:<18} {:<9} {}", index, "not attempted", 0, "-");
    }

    println!();
    println!(
        "{} succeeded, {} failed{}",
        report.succeeded(),
        report.failed(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    if let Some(failed) = failed_episodes(report) {
        println!("Failed episodes: {}", failed);
    }
    if report.succeeded() > 0 {
        println!("Saved to {}", series_dir.display());
    }
}
