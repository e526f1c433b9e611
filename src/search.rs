//! Top-k similarity search over a candidate set.
//!
//! [`SimilaritySearch`] resolves the configured [`SearchMethod`] once and runs
//! either the histogram pipeline (extract, chi-squared, stable sort) or the
//! embedding pipeline (extract, cosine k-NN). Both return a [`RankedResult`]
//! whose first entry is the query at distance 0. The caller's candidate slice
//! is only read, never modified.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use rayon::prelude::*;

use crate::config::{SearchConfig, SearchMethod};
use crate::core::chi_squared::ChiSquaredRanker;
use crate::core::embeddings::{FeatureExtractor, FeatureModel};
use crate::core::histogram::{Histogram, HistogramExtractor};
use crate::core::knn::NearestNeighborRanker;
use crate::core::loader::{DiskLoader, ImageLoader};
use crate::error::{AppError, Result, ResultExt};
use crate::models::result::RankedResult;

/// Query-by-example search over a set of images
pub struct SimilaritySearch<L = DiskLoader> {
    config: SearchConfig,
    loader: L,
    model: Option<Box<dyn FeatureModel>>,
}

impl<L: fmt::Debug> fmt::Debug for SimilaritySearch<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilaritySearch")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("model", &self.model.as_ref().map(|_| "<feature model>"))
            .finish()
    }
}

impl SimilaritySearch<DiskLoader> {
    /// Search reading images from disk
    pub fn new(config: SearchConfig) -> Self {
        Self::with_loader(config, DiskLoader)
    }
}

impl<L: ImageLoader + Sync> SimilaritySearch<L> {
    /// Search reading images through `loader`
    pub fn with_loader(config: SearchConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            model: None,
        }
    }

    /// Attach the frozen model used by [`SearchMethod::Embedding`]
    pub fn with_model<M: FeatureModel + 'static>(mut self, model: M) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    /// Active configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The `config.k` images closest to `query`
    pub fn search(&self, query: &Path, candidates: &[PathBuf]) -> Result<RankedResult> {
        self.search_k(query, candidates, self.config.k)
    }

    /// The `k` images in `candidates` closest to `query`.
    ///
    /// Returns `min(k, |candidates \ {query}|) + 1` entries. Any load or
    /// inference failure aborts the whole search.
    pub fn search_k(&self, query: &Path, candidates: &[PathBuf], k: usize) -> Result<RankedResult> {
        self.config.validate()?;

        let result = match self.config.method {
            SearchMethod::Histogram => self.search_histograms(query, candidates, k)?,
            SearchMethod::Embedding => {
                let model = self.model.as_deref().ok_or_else(|| {
                    AppError::InvalidConfiguration(
                        "embedding search needs a feature model".to_string(),
                    )
                })?;
                self.search_embeddings(model, query, candidates, k)?
            }
        };

        log::info!(
            "{} search for {}: {} of {} candidates returned",
            self.config.method,
            query.display(),
            result.len() - 1,
            candidates.len()
        );
        Ok(result)
    }

    fn search_histograms(
        &self,
        query: &Path,
        candidates: &[PathBuf],
        k: usize,
    ) -> Result<RankedResult> {
        let extractor = HistogramExtractor::new(self.config.bins)?;
        let loader = &self.loader;
        let query_hist = histogram_of(loader, &extractor, query)?;

        // Drop duplicates and the query itself
        let pool: Vec<PathBuf> = unique(candidates)
            .into_iter()
            .filter(|path| path.as_path() != query)
            .collect();

        let bar = progress_bar(pool.len(), "Computing histograms")?;
        let histograms: Vec<(PathBuf, Histogram)> = if self.config.parallel {
            pool.into_par_iter()
                .progress_with(bar)
                .map(|path| histogram_of(loader, &extractor, &path).map(|h| (path, h)))
                .collect::<Result<_>>()?
        } else {
            pool.into_iter()
                .progress_with(bar)
                .map(|path| histogram_of(loader, &extractor, &path).map(|h| (path, h)))
                .collect::<Result<_>>()?
        };

        ChiSquaredRanker::new(k).rank(query, &query_hist, &histograms)
    }

    fn search_embeddings(
        &self,
        model: &dyn FeatureModel,
        query: &Path,
        candidates: &[PathBuf],
        k: usize,
    ) -> Result<RankedResult> {
        let mut pool = unique(candidates);
        let query_index = match pool.iter().position(|path| path.as_path() == query) {
            Some(index) => index,
            None => {
                pool.push(query.to_path_buf());
                pool.len() - 1
            }
        };

        let extractor = FeatureExtractor::new(model);
        let bar = progress_bar(pool.len(), "Computing embeddings")?;
        let embeddings = pool
            .iter()
            .progress_with(bar)
            .map(|path| {
                let image = self.loader.load(path)?;
                log::debug!("Embedding of {}", path.display());
                extractor.extract(&image)
            })
            .collect::<Result<Vec<_>>>()?;

        NearestNeighborRanker::new(k).rank(&pool, embeddings, query_index)
    }
}

fn histogram_of<L: ImageLoader>(
    loader: &L,
    extractor: &HistogramExtractor,
    path: &Path,
) -> Result<Histogram> {
    let image = loader.load(path)?;
    log::debug!("Histogram of {}", path.display());
    Ok(extractor.extract(&image))
}

/// Bar over `len` images; draws nothing when stderr is not a terminal
fn progress_bar(len: usize, message: &'static str) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
        .context("progress bar template")?
        .progress_chars("=> ");
    Ok(ProgressBar::new(len as u64)
        .with_style(style)
        .with_message(message))
}

/// First occurrence of each path, in order
fn unique(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|&path| seen.insert(path.as_path()))
        .cloned()
        .collect()
}
