//! Episode range selection.
//!
//! Turns expressions like `"1-3,5,7-9"` into an [`EpisodeSelection`]: an
//! ordered, deduplicated set of 1-based episode indices. Selections are kept
//! as merged inclusive ranges, so `"1-100000"` costs two integers, not a
//! hundred thousand.

mod parse;

pub use parse::parse;

use std::ops::RangeInclusive;

/// Error returned when a selection expression cannot be turned into a selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// A token is neither `N` nor `A-B`, a range is reversed, or a value is zero.
    #[error("invalid range syntax: {token:?}")]
    InvalidRangeSyntax { token: String },
    /// A parsed value exceeds the caller-supplied maximum.
    #[error("episode {value} is out of bounds (max {max})")]
    OutOfBounds { value: u32, max: u32 },
}

/// Strictly increasing set of episode indices (all >= 1).
///
/// Only produced by [`parse`] or [`EpisodeSelection::from_available`]; there is
/// no way to mutate one after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeSelection {
    /// Disjoint, non-adjacent, ascending ranges.
    ranges: Vec<RangeInclusive<u32>>,
}

impl EpisodeSelection {
    /// Selection covering every index in `available` (the `all` keyword).
    /// Zero indices are ignored.
    pub fn from_available<I>(available: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let ranges = available
            .into_iter()
            .filter(|&v| v >= 1)
            .map(|v| v..=v)
            .collect();
        Self::from_ranges(ranges)
    }

    /// Normalizes arbitrary ranges: sort, then merge overlapping or adjacent ones.
    pub(crate) fn from_ranges(mut ranges: Vec<RangeInclusive<u32>>) -> Self {
        ranges.sort_by_key(|r| *r.start());
        let mut merged: Vec<RangeInclusive<u32>> = Vec::with_capacity(ranges.len());
        for r in ranges {
            match merged.last_mut() {
                Some(last) if *r.start() <= last.end().saturating_add(1) => {
                    if r.end() > last.end() {
                        *last = *last.start()..=*r.end();
                    }
                }
                _ => merged.push(r),
            }
        }
        Self { ranges: merged }
    }

    /// Number of selected episodes.
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| (*r.end() - *r.start()) as usize + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Ascending iterator over the selected indices.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }

    pub fn contains(&self, index: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(&index))
    }

    /// Largest selected index, if any.
    pub fn max(&self) -> Option<u32> {
        self.ranges.last().map(|r| *r.end())
    }

    /// Selected indices as a vector (convenient for display and tests).
    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

impl std::fmt::Display for EpisodeSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for r in &self.ranges {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if r.start() == r.end() {
                write!(f, "{}", r.start())?;
            } else {
                write!(f, "{}-{}", r.start(), r.end())?;
            }
        }
        Ok(())
    }
}
