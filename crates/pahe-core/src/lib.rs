//! Episode resolution-and-download pipeline for AnimePahe-style catalogs.
//!
//! Catalog client → range selection → browser-driven stream resolution →
//! download executor, coordinated by [`pipeline::Orchestrator`].

pub mod config;
pub mod logging;

pub mod browser;
pub mod catalog;
pub mod control;
pub mod download;
pub mod http;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod selection;
