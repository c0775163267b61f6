//! Stdin prompts for values not given on the command line, plus the pure
//! helpers that interpret the answers.

use anyhow::{bail, Context, Result};
use pahe_core::catalog::{index_bounds, AnimeSummary, EpisodeRef};
use pahe_core::selection::{self, EpisodeSelection};
use std::io::{self, BufRead, Write};

/// Prints `label: ` and reads one trimmed line from stdin on the blocking
/// pool. Empty answers are an error.
pub async fn ask(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let label = label.to_string();
    tokio::task::spawn_blocking(move || read_answer(&mut io::stdin().lock(), &label))
        .await
        .context("stdin reader failed")?
}

/// One trimmed, non-empty line from `input`.
fn read_answer(input: &mut impl BufRead, label: &str) -> Result<String> {
    let mut line = String::new();
    let read = input.read_line(&mut line).context("read from stdin")?;
    let answer = line.trim();
    if read == 0 || answer.is_empty() {
        bail!("no input for {:?}", label);
    }
    Ok(answer.to_string())
}

/// Numbered search results, one per line.
pub fn print_results(results: &[AnimeSummary]) {
    for (n, anime) in results.iter().enumerate() {
        let marker = if anime.is_dub() { " [DUB]" } else { "" };
        println!("{:>3}. {}{}", n + 1, anime.title, marker);
    }
}

/// Applies a 1-based pick to the results. A single result needs no pick.
pub fn choose(results: &[AnimeSummary], pick: Option<usize>) -> Result<Option<&AnimeSummary>> {
    match (pick, results.len()) {
        (_, 0) => bail!("no results"),
        (None, 1) => Ok(results.first()),
        (None, _) => Ok(None),
        (Some(n), len) if n >= 1 && n <= len => Ok(results.get(n - 1)),
        (Some(n), len) => bail!("pick {} is out of range (1-{})", n, len),
    }
}

/// Parses a pick typed at the prompt.
pub fn parse_pick(answer: &str) -> Result<usize> {
    answer
        .trim()
        .parse::<usize>()
        .with_context(|| format!("not a result number: {:?}", answer))
}

/// `"all"` selects every listed episode; anything else is a range expression
/// bounded by the highest listed index.
pub fn selection_from(expr: &str, episodes: &[EpisodeRef]) -> Result<EpisodeSelection> {
    if expr.trim().eq_ignore_ascii_case("all") {
        let sel = EpisodeSelection::from_available(episodes.iter().map(|e| e.index));
        if sel.is_empty() {
            bail!("no episodes available");
        }
        return Ok(sel);
    }
    let max = index_bounds(episodes).map(|(_, max)| max);
    Ok(selection::parse(expr, max)?)
}

/// `"1-12"`, or `"none"` for an empty listing.
pub fn range_label(episodes: &[EpisodeRef]) -> String {
    match index_bounds(episodes) {
        Some((min, max)) if min == max => min.to_string(),
        Some((min, max)) => format!("{}-{}", min, max),
        None => "none".to_string(),
    }
}
