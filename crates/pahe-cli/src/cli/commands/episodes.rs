//! `apdl episodes <query>` – show the episode listing of a series.

use anyhow::Result;
use pahe_core::catalog::{CatalogClient, PaheApi};
use pahe_core::config::PaheConfig;

use super::lookup::find_series;
use crate::cli::prompt;

pub async fn run_episodes(cfg: &PaheConfig, raw: &str, pick: Option<usize>) -> Result<()> {
    let api = PaheApi::from_config(&cfg.catalog);
    let anime = find_series(&api, raw, pick).await?;
    let episodes = api.list_episodes(&anime).await?;

    println!("{}", anime.title);
    println!(
        "Episodes: {} ({} available)",
        prompt::range_label(&episodes),
        episodes.len()
    );
    for ep in &episodes {
        println!("{:>5}  {}", ep.index, ep.title);
    }
    Ok(())
}
