//! Brute-force nearest-neighbour search under cosine distance.

use std::path::PathBuf;

use ndarray::ArrayView1;

use crate::core::embeddings::Embedding;
use crate::error::{AppError, Result};
use crate::models::result::{RankedEntry, RankedResult};

/// `1 − cos(a, b)`, in `[0, 2]`.
///
/// A zero vector has no direction; its distance to anything is 1.
pub fn cosine_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a > 0.0 && norm_b > 0.0 {
        // One sqrt over the product keeps cos(a, a) at exactly 1
        let similarity = (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0);
        (1.0 - similarity).clamp(0.0, 2.0)
    } else {
        1.0
    }
}

/// A hit returned by [`NearestNeighborIndex::kneighbors`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Position of the point in the fitted set
    pub index: usize,
    /// Cosine distance to the query
    pub distance: f64,
}

/// Exhaustive index over a fixed set of embeddings
#[derive(Clone, Debug)]
pub struct NearestNeighborIndex {
    points: Vec<Embedding>,
    dim: usize,
}

impl NearestNeighborIndex {
    /// Index `points`; every point must have the same length
    pub fn fit(points: Vec<Embedding>) -> Result<Self> {
        let dim = points.first().map(|p| p.len()).unwrap_or(0);
        if let Some((i, bad)) = points.iter().enumerate().find(|(_, p)| p.len() != dim) {
            return Err(AppError::Model(format!(
                "embedding {} has {} dimensions, expected {}",
                i,
                bad.len(),
                dim
            )));
        }
        Ok(Self { points, dim })
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indexed point at `index`
    pub fn point(&self, index: usize) -> Option<&Embedding> {
        self.points.get(index)
    }

    /// Up to `n` closest points to `query`, ascending; ties by index
    pub fn kneighbors(&self, query: &Embedding, n: usize) -> Result<Vec<Neighbor>> {
        if !self.points.is_empty() && query.len() != self.dim {
            return Err(AppError::Model(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }

        let mut hits: Vec<Neighbor> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| Neighbor {
                index,
                distance: cosine_distance(query.view(), point.view()),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(n);
        Ok(hits)
    }
}

/// Ranks images by cosine distance between their embeddings
#[derive(Clone, Copy, Debug)]
pub struct NearestNeighborRanker {
    k: usize,
}

impl NearestNeighborRanker {
    /// Ranker keeping the `k` closest images
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// `embeddings[i]` belongs to `images[i]`; the query is `images[query_index]`.
    ///
    /// Asks the index for `k + 1` neighbours, drops the query's own hit and
    /// returns the rest behind the query entry.
    pub fn rank(
        &self,
        images: &[PathBuf],
        embeddings: Vec<Embedding>,
        query_index: usize,
    ) -> Result<RankedResult> {
        if images.len() != embeddings.len() {
            return Err(AppError::Internal(format!(
                "{} images but {} embeddings",
                images.len(),
                embeddings.len()
            )));
        }
        let query_path = images.get(query_index).ok_or_else(|| {
            AppError::Internal(format!(
                "query index {} out of range for {} images",
                query_index,
                images.len()
            ))
        })?;

        let index = NearestNeighborIndex::fit(embeddings)?;
        let query = &index.points[query_index];
        let hits = index.kneighbors(query, self.k.saturating_add(1))?;

        // Drop the query's own hit, not just the first one at distance 0
        let scored: Vec<RankedEntry> = hits
            .into_iter()
            .filter(|hit| hit.index != query_index)
            .map(|hit| RankedEntry::new(images[hit.index].clone(), hit.distance))
            .collect();

        Ok(RankedResult::from_scored(query_path.clone(), scored, self.k))
    }
}
