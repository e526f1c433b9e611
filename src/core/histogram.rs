//! Joint 3-channel color histograms with min-max normalization.
//!
//! A histogram with `B` bins per channel covers `B³` cells. Most cells of a
//! natural image are empty, so only non-zero cells are stored, sorted by their
//! flat index `c0 * B² + c1 * B + c2`. [`Histogram::to_dense`] materializes the
//! full cube when a caller needs it.

use ndarray::Array3;

use crate::core::loader::Image;
use crate::error::{AppError, Result};

/// Bins per channel in the reference configuration
pub const DEFAULT_BINS: usize = 256;

/// Min-max normalized joint color histogram
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    bins: usize,
    cells: Vec<(u32, f32)>,
}

impl Histogram {
    /// Bins per channel
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Value of the cell at `(c0, c1, c2)`; out-of-range coordinates read as 0
    pub fn get(&self, c0: usize, c1: usize, c2: usize) -> f32 {
        if c0 >= self.bins || c1 >= self.bins || c2 >= self.bins {
            return 0.0;
        }
        let flat = (c0 * self.bins + c1) * self.bins + c2;
        self.cells
            .binary_search_by_key(&(flat as u32), |&(idx, _)| idx)
            .map(|pos| self.cells[pos].1)
            .unwrap_or(0.0)
    }

    /// Largest cell value: 1.0, or 0.0 for a degenerate histogram
    pub fn max(&self) -> f32 {
        self.cells.iter().map(|&(_, v)| v).fold(0.0, f32::max)
    }

    /// True when every cell is 0
    pub fn is_zero(&self) -> bool {
        self.cells.is_empty()
    }

    /// Non-zero cells as `(flat_index, value)`, ascending by index
    pub fn nonzero(&self) -> &[(u32, f32)] {
        &self.cells
    }

    /// The full `B×B×B` cube
    pub fn to_dense(&self) -> Array3<f32> {
        let b = self.bins;
        let mut dense = Array3::<f32>::zeros((b, b, b));
        for &(flat, value) in &self.cells {
            let flat = flat as usize;
            dense[[flat / (b * b), (flat / b) % b, flat % b]] = value;
        }
        dense
    }
}

/// Computes [`Histogram`]s over the full `[0, 256)` range of each channel
#[derive(Clone, Copy, Debug)]
pub struct HistogramExtractor {
    bins: usize,
}

impl Default for HistogramExtractor {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl HistogramExtractor {
    /// Extractor with `bins` bins per channel (1..=256)
    pub fn new(bins: usize) -> Result<Self> {
        if !(1..=256).contains(&bins) {
            return Err(AppError::InvalidConfiguration(format!(
                "bins must be between 1 and 256, got {}",
                bins
            )));
        }
        Ok(Self { bins })
    }

    /// Bins per channel
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Histogram of `image`, rescaled so the fullest cell is 1.0
    pub fn extract(&self, image: &Image) -> Histogram {
        let b = self.bins;

        // Bin every pixel into its flat cell index
        let mut flat: Vec<u32> = image
            .pixels()
            .pixels()
            .map(|p| {
                let c0 = p[0] as usize * b / 256;
                let c1 = p[1] as usize * b / 256;
                let c2 = p[2] as usize * b / 256;
                ((c0 * b + c1) * b + c2) as u32
            })
            .collect();
        flat.sort_unstable();

        // Count each occupied cell
        let mut counts: Vec<(u32, u32)> = Vec::new();
        for idx in flat {
            match counts.last_mut() {
                Some((last, n)) if *last == idx => *n += 1,
                _ => counts.push((idx, 1)),
            }
        }

        // Rescale to [0, 1]
        let histogram = normalize_min_max(b, &counts);
        if histogram.is_zero() {
            log::warn!(
                "Histogram of {} is all zero; chi-squared distances from it are 0",
                image.path().display()
            );
        }
        histogram
    }
}

/// `(v - min) / (max - min)` over every cell, empty cells included
fn normalize_min_max(bins: usize, counts: &[(u32, u32)]) -> Histogram {
    let total_cells = (bins as u64).pow(3);
    let max = counts.iter().map(|&(_, n)| n).max().unwrap_or(0);
    let min = if (counts.len() as u64) < total_cells {
        0
    } else {
        counts.iter().map(|&(_, n)| n).min().unwrap_or(0)
    };

    if max == min {
        return Histogram {
            bins,
            cells: Vec::new(),
        };
    }

    let range = (max - min) as f64;
    let cells = counts
        .iter()
        .filter(|&&(_, n)| n > min)
        .map(|&(idx, n)| (idx, ((n - min) as f64 / range) as f32))
        .collect();

    Histogram { bins, cells }
}
