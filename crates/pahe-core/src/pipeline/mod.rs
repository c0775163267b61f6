//! Pipeline orchestration: selected episodes → resolve → download → report.
//!
//! One browser-backed resolution at a time. Optionally the download of
//! episode N overlaps the resolution of episode N+1; results are always
//! reported in selection order.

mod download;
mod events;
mod orchestrator;
mod report;

pub use events::PipelineEvent;
pub use orchestrator::Orchestrator;
pub use report::{EpisodeJobResult, JobStatus, RunReport};
