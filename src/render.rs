//! Contact-sheet rendering of a ranking.

use std::fmt;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::core::loader::ImageLoader;
use crate::error::{AppError, Result};
use crate::models::result::RankedResult;

const HIGHLIGHT: Rgb<u8> = Rgb([220, 20, 20]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL: Rgb<u8> = Rgb([0, 0, 0]);

/// Layout and styling of a rendered grid
pub struct GridOptions {
    /// Edge length of each square tile
    pub tile_size: u32,
    /// Height of the caption strip above each tile
    pub label_height: u32,
    /// Thickness of the frame around the query tile
    pub border: u32,
    /// Caption font; captions are skipped without one
    pub font: Option<Font<'static>>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            tile_size: 300,
            label_height: 36,
            border: 7,
            font: None,
        }
    }
}

impl fmt::Debug for GridOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridOptions")
            .field("tile_size", &self.tile_size)
            .field("label_height", &self.label_height)
            .field("border", &self.border)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl GridOptions {
    /// Reads a TrueType font for captions
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| AppError::Font(format!("{} is not a usable font", path.display())))?;
        self.font = Some(font);
        Ok(self)
    }
}

/// Rows and columns for `n` tiles: square when possible, otherwise
/// `floor(√n)` columns and as many rows as needed.
pub fn nrows_ncols(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }

    let mut root = (n as f64).sqrt() as usize;
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    while root * root > n {
        root -= 1;
    }

    if root * root == n {
        (root, root)
    } else {
        let ncols = root;
        (n.div_ceil(ncols), ncols)
    }
}

/// Rounded to three decimals, as shown in captions
pub fn format_distance(distance: f64) -> String {
    format!("Distance: {}", (distance * 1000.0).round() / 1000.0)
}

/// Draws the ranking as a grid, query first and framed.
pub fn render_grid<L: ImageLoader>(
    result: &RankedResult,
    loader: &L,
    options: &GridOptions,
) -> Result<RgbImage> {
    let (nrows, ncols) = nrows_ncols(result.len());
    let cell_w = options.tile_size;
    let cell_h = options.tile_size + options.label_height;
    let mut canvas = RgbImage::from_pixel(cell_w * ncols as u32, cell_h * nrows as u32, BACKGROUND);

    for (i, entry) in result.iter().enumerate() {
        let x0 = (i % ncols) as u32 * cell_w;
        let y0 = (i / ncols) as u32 * cell_h;

        let image = loader.load(&entry.image)?;
        let tile = DynamicImage::ImageRgb8(image.pixels().clone())
            .resize(options.tile_size, options.tile_size, FilterType::Triangle)
            .to_rgb8();
        let (tw, th) = tile.dimensions();
        let tx = x0 + (options.tile_size - tw) / 2;
        let ty = y0 + options.label_height + (options.tile_size - th) / 2;
        image::imageops::replace(&mut canvas, &tile, tx as i64, ty as i64);

        let is_query = i == 0;
        if is_query {
            frame(&mut canvas, tx, ty, tw, th, options.border);
        }

        if let Some(font) = &options.font {
            let text = if is_query {
                let name = entry
                    .image
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("Chosen image: {}", name)
            } else {
                format_distance(entry.distance)
            };
            let color = if is_query { HIGHLIGHT } else { LABEL };
            let scale = Scale::uniform(options.label_height as f32 * 0.7);
            draw_text_mut(&mut canvas, color, x0 as i32 + 4, y0 as i32 + 4, scale, font, &text);
        }
    }

    Ok(canvas)
}

fn frame(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, border: u32) {
    if w == 0 || h == 0 {
        return;
    }
    if border == 1 {
        draw_hollow_rect_mut(canvas, Rect::at(x as i32, y as i32).of_size(w, h), HIGHLIGHT);
        return;
    }

    let b = border.min(w).min(h).max(1);
    let (xi, yi) = (x as i32, y as i32);
    draw_filled_rect_mut(canvas, Rect::at(xi, yi).of_size(w, b), HIGHLIGHT);
    draw_filled_rect_mut(canvas, Rect::at(xi, yi + (h - b) as i32).of_size(w, b), HIGHLIGHT);
    draw_filled_rect_mut(canvas, Rect::at(xi, yi).of_size(b, h), HIGHLIGHT);
    draw_filled_rect_mut(canvas, Rect::at(xi + (w - b) as i32, yi).of_size(b, h), HIGHLIGHT);
}
