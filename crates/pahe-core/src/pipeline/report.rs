//! Per-episode results and the run report.

use std::fmt;
use std::path::PathBuf;

use crate::catalog::EpisodeRef;

/// Terminal status of one episode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    ResolutionFailed,
    DownloadFailed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::ResolutionFailed => "resolution failed",
            JobStatus::DownloadFailed => "download failed",
        };
        f.write_str(s)
    }
}

/// Finalized outcome of one selected episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeJobResult {
    pub episode: EpisodeRef,
    pub status: JobStatus,
    /// Total attempts across both stages.
    pub attempts: u32,
    pub resolve_attempts: u32,
    pub download_attempts: u32,
    pub last_error: Option<String>,
    /// Downloaded file, on success.
    pub output: Option<PathBuf>,
}

impl EpisodeJobResult {
    /// Result for a selected index the catalog did not list.
    pub(crate) fn not_found(index: u32) -> Self {
        Self {
            episode: EpisodeRef {
                index,
                watch_page_id: String::new(),
                title: format!("Episode {}", index),
            },
            status: JobStatus::ResolutionFailed,
            attempts: 0,
            resolve_attempts: 0,
            download_attempts: 0,
            last_error: Some("episode not found".to_string()),
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Ordered results of a run.
///
/// A run where every episode failed is still a complete report. `cancelled`
/// is set when the user stopped the run; `not_attempted` then lists the
/// interrupted episode and every later one, none of which has a result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub results: Vec<EpisodeJobResult>,
    pub cancelled: bool,
    pub not_attempted: Vec<u32>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EpisodeJobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: u32, status: JobStatus) -> EpisodeJobResult {
        EpisodeJobResult {
            status,
            ..EpisodeJobResult::not_found(index)
        }
    }

    #[test]
    fn counts() {
        let report = RunReport {
            results: vec![
                result(1, JobStatus::Succeeded),
                result(2, JobStatus::DownloadFailed),
                result(3, JobStatus::Succeeded),
                result(4, JobStatus::ResolutionFailed),
            ],
            ..RunReport::default()
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 2);
        let failed: Vec<u32> = report.failures().map(|r| r.episode.index).collect();
        assert_eq!(failed, vec![2, 4]);
    }

    #[test]
    fn not_found_result() {
        let r = EpisodeJobResult::not_found(9);
        assert_eq!(r.status, JobStatus::ResolutionFailed);
        assert_eq!(r.attempts, 0);
        assert_eq!(r.last_error.as_deref(), Some("episode not found"));
        assert_eq!(r.episode.title, "Episode 9");
    }

    #[test]
    fn status_display() {
        assert_eq!(JobStatus::ResolutionFailed.to_string(), "resolution failed");
    }
}
