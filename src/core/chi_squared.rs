use std::path::{Path, PathBuf};

use crate::core::histogram::Histogram;
use crate::error::{AppError, Result};
use crate::models::result::{RankedEntry, RankedResult};

/// Chi-squared distance `Σ (P − Q)² / P` over the cells where `P` is non-zero.
///
/// `query` plays the role of `P`, so the distance is not symmetric. Histograms
/// built with different bin counts are rejected.
pub fn chi_squared_distance(query: &Histogram, candidate: &Histogram) -> Result<f64> {
    if query.bins() != candidate.bins() {
        return Err(AppError::InvalidConfiguration(format!(
            "cannot compare a {}-bin histogram with a {}-bin one",
            query.bins(),
            candidate.bins()
        )));
    }

    // Merge-walk the two sorted cell lists
    let others = candidate.nonzero();
    let mut j = 0;
    let mut total = 0.0f64;

    for &(idx, p) in query.nonzero() {
        while j < others.len() && others[j].0 < idx {
            j += 1;
        }
        let q = match others.get(j) {
            Some(&(other, value)) if other == idx => value,
            _ => 0.0,
        };

        let p = p as f64;
        if p.abs() > f64::EPSILON {
            let d = p - q as f64;
            total += d * d / p;
        }
    }

    Ok(total)
}

/// Ranks candidate histograms by chi-squared distance to the query
#[derive(Clone, Copy, Debug)]
pub struct ChiSquaredRanker {
    k: usize,
}

impl ChiSquaredRanker {
    /// Ranker keeping the `k` closest candidates
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// `candidates` must not contain the query; it is prepended at distance 0.
    pub fn rank(
        &self,
        query_path: &Path,
        query: &Histogram,
        candidates: &[(PathBuf, Histogram)],
    ) -> Result<RankedResult> {
        let scored = candidates
            .iter()
            .map(|(path, hist)| {
                chi_squared_distance(query, hist).map(|d| RankedEntry::new(path.clone(), d))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RankedResult::from_scored(query_path, scored, self.k))
    }
}
