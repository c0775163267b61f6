//! Query to a single series: search, language filter, pick.

use anyhow::{bail, Result};
use pahe_core::catalog::{filter_by_language, parse_search_query, AnimeSummary, CatalogClient};

use crate::cli::prompt;

/// Searches for `raw` and narrows the results to one series, prompting for
/// the result number when `pick` is absent and the choice is ambiguous.
pub async fn find_series(
    catalog: &dyn CatalogClient,
    raw: &str,
    pick: Option<usize>,
) -> Result<AnimeSummary> {
    let (query, language) = parse_search_query(raw);
    if query.is_empty() {
        bail!("empty search query");
    }
    let results = catalog.search(&query).await?;
    let results = filter_by_language(results, language);
    tracing::debug!(query = %query, ?language, results = results.len(), "search finished");
    if results.is_empty() {
        bail!("no results for {:?}", query);
    }

    if let Some(anime) = prompt::choose(&results, pick)? {
        return Ok(anime.clone());
    }
    prompt::print_results(&results);
    let n = prompt::parse_pick(&prompt::ask("Select a series").await?)?;
    match prompt::choose(&results, Some(n))? {
        Some(anime) => Ok(anime.clone()),
        None => bail!("no series selected"),
    }
}
