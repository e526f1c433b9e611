use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{AppError, Result};

/// A decoded image in canonical RGB order, tagged with where it came from
#[derive(Clone, Debug)]
pub struct Image {
    path: PathBuf,
    pixels: RgbImage,
}

impl Image {
    /// Wrap already-decoded pixels
    pub fn from_rgb(path: impl Into<PathBuf>, pixels: RgbImage) -> Self {
        Self {
            path: path.into(),
            pixels,
        }
    }

    /// Identifier of the image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pixel data, 8 bits per channel, RGB
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Source of decoded images
pub trait ImageLoader {
    /// Load and decode the image at `path`
    fn load(&self, path: &Path) -> Result<Image>;
}

/// Reads images from the local filesystem with the `image` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskLoader;

impl ImageLoader for DiskLoader {
    fn load(&self, path: &Path) -> Result<Image> {
        log::debug!("Loading image: {}", path.display());

        let decoded = image::open(path).map_err(|source| AppError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Image::from_rgb(path, decoded.to_rgb8()))
    }
}

impl<L: ImageLoader + ?Sized> ImageLoader for &L {
    fn load(&self, path: &Path) -> Result<Image> {
        (**self).load(path)
    }
}
