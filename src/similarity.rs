//! String similarity scoring for field-name resolution.
//!
//! Scores are integers on a 0-100 scale. The [`Similarity`] trait is the only
//! thing the mapper depends on, so tests can substitute a fixed scorer.

use std::{borrow::Cow, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;
use similar::{DiffOp, TextDiff};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("static pattern compiles"));

pub trait Similarity {
    /// Similarity between `left` and `right` on a 0-100 scale.
    fn score(&self, left: &str, right: &str) -> u8;
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> u8,
{
    fn score(&self, left: &str, right: &str) -> u8 {
        self(left, right)
    }
}

/// Case-insensitive best-of scorer: the maximum of [`ratio`],
/// [`partial_ratio`] and [`token_sort_ratio`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzScorer;

impl Similarity for FuzzScorer {
    fn score(&self, left: &str, right: &str) -> u8 {
        let left = left.to_lowercase();
        let right = right.to_lowercase();
        ratio(&left, &right)
            .max(partial_ratio(&left, &right))
            .max(token_sort_ratio(&left, &right))
    }
}

fn char_ratio(left: &str, right: &str) -> f64 {
    f64::from(TextDiff::from_chars(left, right).ratio())
}

fn scale(value: f64) -> u8 {
    (value * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Matching-character ratio `2 * M / (|left| + |right|)`.
pub fn ratio(left: &str, right: &str) -> u8 {
    if left.is_empty() || right.is_empty() {
        return 0;
    }
    scale(char_ratio(left, right))
}

/// Best [`ratio`] of the shorter string against equally long windows of the
/// longer one, anchored at each matching block.
pub fn partial_ratio(left: &str, right: &str) -> u8 {
    if left.is_empty() || right.is_empty() {
        return 0;
    }
    let (shorter, longer) = if left.chars().count() <= right.chars().count() {
        (left, right)
    } else {
        (right, left)
    };
    let long_chars: Vec<char> = longer.chars().collect();
    let short_len = shorter.chars().count();

    let diff = TextDiff::from_chars(shorter, longer);
    let mut anchors: Vec<usize> = diff
        .ops()
        .iter()
        .filter_map(|op| match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                ..
            } => Some(new_index.saturating_sub(old_index)),
            _ => None,
        })
        .collect();
    anchors.push(long_chars.len() - short_len);

    let mut best = 0.0f64;
    for start in anchors.into_iter().unique() {
        let end = (start + short_len).min(long_chars.len());
        let window: String = long_chars[start..end].iter().collect();
        let score = char_ratio(shorter, &window);
        if score > 0.995 {
            return 100;
        }
        best = best.max(score);
    }
    scale(best)
}

/// [`ratio`] after lowercasing, stripping punctuation and sorting tokens.
pub fn token_sort_ratio(left: &str, right: &str) -> u8 {
    let left = sorted_tokens(left);
    let right = sorted_tokens(right);
    ratio(&left, &right)
}

fn sorted_tokens(value: &str) -> String {
    let lowered = value.to_lowercase();
    let cleaned: Cow<'_, str> = NON_WORD.replace_all(&lowered, " ");
    cleaned.split_whitespace().sorted().join(" ")
}
