//! `apdl search <query>` – list matching series.

use anyhow::Result;
use pahe_core::catalog::{filter_by_language, parse_search_query, CatalogClient, PaheApi};
use pahe_core::config::PaheConfig;

use crate::cli::prompt;

pub async fn run_search(cfg: &PaheConfig, raw: &str) -> Result<()> {
    let api = PaheApi::from_config(&cfg.catalog);
    let (query, language) = parse_search_query(raw);
    let results = api.search(&query).await?;
    let results = filter_by_language(results, language);
    if results.is_empty() {
        println!("No results for {:?}.", query);
    } else {
        prompt::print_results(&results);
    }
    Ok(())
}
