#![doc(html_root_url = "https://docs.rs/imagesearch/0.1.0")]
#![cfg_attr(not(test), forbid(unsafe_code))]
// ndarray's `s!` macro emits `allow(unsafe_code)`, which `forbid` rejects in tests
#![cfg_attr(test, deny(unsafe_code))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # ImageSearch
//!
//! Query-by-example image search: given one image from a collection, find the
//! `k` images that look most like it.
//!
//! ## Similarity models
//!
//! - **Histogram**: a joint 3-channel color histogram per image, min-max
//!   normalized so its fullest bin is 1.0, compared with the (asymmetric)
//!   chi-squared distance.
//! - **Embedding**: features from a frozen convolutional network, L2
//!   normalized, compared with cosine distance through a brute-force
//!   nearest-neighbour index.
//!
//! Both return a [`RankedResult`]: the query at distance 0 followed by up to
//! `k` neighbours in ascending distance.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagesearch::{utils, Result, SearchConfig, SimilaritySearch};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let images = utils::list_images(Path::new("data/flowers"))?;
//!     let search = SimilaritySearch::new(SearchConfig::default());
//!     let ranked = search.search(Path::new("data/flowers/image_0268.jpg"), &images)?;
//!     ranked.save_csv("out/5_most_similar_image_0268.csv")?;
//!     Ok(())
//! }
//! ```

/// Search configuration and method selection.
pub mod config;
pub mod core;
/// Defines the library's error types and result aliases.
pub mod error;
pub mod models;
pub mod render;
pub mod search;
pub mod utils;

// Public API exports
pub use crate::{
    config::{SearchConfig, SearchMethod},
    core::{
        chi_squared::{chi_squared_distance, ChiSquaredRanker},
        embeddings::{Embedding, FeatureExtractor, FeatureModel, Preprocessing},
        histogram::{Histogram, HistogramExtractor},
        knn::{cosine_distance, NearestNeighborIndex, NearestNeighborRanker, Neighbor},
        loader::{DiskLoader, Image, ImageLoader},
    },
    error::{AppError, Result, ResultExt},
    models::result::{RankedEntry, RankedResult},
    render::{render_grid, GridOptions},
    search::SimilaritySearch,
};

#[cfg(feature = "embeddings")]
pub use crate::core::embeddings::TorchModel;

/// Initialize logging with sensible defaults
///
/// Reads `RUST_LOG` (default `info`). Call once, early.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Internal(format!("logger already initialized: {}", e)))?;

    log::info!("Initializing ImageSearch v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
