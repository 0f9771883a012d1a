//! Name similarity scoring between a local artist and a provider candidate.
//!
//! Scores are computed on normalized names (see [`crate::normalize`]).  An
//! exact normalized match short-circuits to 1.0; otherwise a character-level
//! longest-common-subsequence ratio is used, with a substring bonus so that
//! pairs like "The Beatles" / "Beatles" are not punished for a dropped
//! article.

use crate::normalize::normalize;

/// Result of comparing two artist names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameSimilarity {
    /// Bounded similarity in [0, 1].
    pub similarity: f64,
    /// True when the normalized names are identical.
    pub is_exact: bool,
}

/// Score the similarity between two raw artist names.
pub fn score(name_a: &str, name_b: &str) -> NameSimilarity {
    let norm_a = normalize(name_a);
    let norm_b = normalize(name_b);

    if norm_a == norm_b {
        return NameSimilarity { similarity: 1.0, is_exact: true };
    }

    let sequence = lcs_ratio(&norm_a, &norm_b);

    // Substring bonus: "the beatles" contains "beatles", so also rate the
    // pair by length ratio and keep the better of the two scores.
    let similarity = if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        let (shorter, longer) = if norm_a.chars().count() <= norm_b.chars().count() {
            (&norm_a, &norm_b)
        } else {
            (&norm_b, &norm_a)
        };
        let contained = shorter.chars().count() as f64 / longer.chars().count().max(1) as f64;
        sequence.max(contained)
    } else {
        sequence
    };

    NameSimilarity { similarity, is_exact: false }
}

/// Character-level sequence similarity: `2 * lcs(a, b) / (|a| + |b|)`,
/// bounded to [0, 1].  Empty-vs-empty rates 1.0.
pub fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Two-row DP over the LCS table.
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let lcs = prev[b.len()];
    (2.0 * lcs as f64) / (a.len() + b.len()) as f64
}
