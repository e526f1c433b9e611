//! Core feature extraction and ranking

/// Chi-squared distance and ranking over histograms.
pub mod chi_squared;
/// Frozen-model feature extraction producing unit-length embeddings.
pub mod embeddings;
/// Joint color histograms.
pub mod histogram;
/// Brute-force cosine nearest-neighbour search.
pub mod knn;
/// Decoded images and the loader seam.
pub mod loader;
