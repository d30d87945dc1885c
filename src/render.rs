//! Render Adapter and the built-in ASCII renderer.
//!
//! The adapter only cares that a renderer reads the staged source and writes
//! one artifact into the configured output directory under the derived name.

use std::fs;
use std::path::{Path, PathBuf};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use thiserror::Error;
use tracing::debug;

use crate::error::PipelineError;
use crate::naming;
use crate::options::{Dimensions, RenderOptions};
use crate::staging::{StagedAsset, StagingArea};

/// Columns used when the request asks for no particular size.
pub const DEFAULT_COLUMNS: u32 = 100;

/// Upper bound on characters per rendering.
pub const MAX_CELLS: u64 = 250_000;

/// Glyph cell in output pixels. Twice as tall as wide.
pub const CELL_WIDTH: u32 = 8;
pub const CELL_HEIGHT: u32 = 16;

pub const SIMPLE_CHARSET: &str = " .:-=+*#%@";
pub const COMPLEX_CHARSET: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("empty dimensions: {0}")]
    EmptyDimensions(String),

    #[error("rendering too large: {columns}x{rows} characters")]
    TooLarge { columns: u32, rows: u32 },

    #[error("failed to write {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{0}")]
    Other(String),
}

/// An image-to-ASCII-art transformation writing its result to `output`.
pub trait Renderer {
    fn render(
        &self,
        source: &Path,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), RenderFailure>;
}

impl<T: Renderer + ?Sized> Renderer for &T {
    fn render(
        &self,
        source: &Path,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), RenderFailure> {
        (**self).render(source, options, output)
    }
}

/// Run `renderer` on a staged source. The artifact lands in
/// `options.output_dir` as `naming::rendered_file_name(source)` and is
/// released if rendering fails.
pub fn render_staged<R: Renderer + ?Sized>(
    renderer: &R,
    source: &StagedAsset,
    options: &RenderOptions,
) -> Result<StagedAsset, PipelineError> {
    let file_name = naming::rendered_file_name(source.file_name());
    let output = StagingArea::new(&options.output_dir)
        .stage(&file_name)
        .map_err(|e| PipelineError::local_write(options.output_dir.join(&file_name), e))?;

    debug!(source = %source.path().display(), output = %output.path().display(), "rendering");
    renderer.render(source.path(), options, output.path())?;
    Ok(output)
}

/// Luminance-to-glyph renderer producing a PNG of white glyphs on black.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiRenderer;

impl AsciiRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Convert an already decoded image into rows of characters.
    pub fn to_lines(
        &self,
        image: &DynamicImage,
        options: &RenderOptions,
    ) -> Result<Vec<String>, RenderFailure> {
        let (columns, rows) = grid_size(options.dimensions, image.width(), image.height())?;

        let mut image = image.clone();
        if options.flip_x {
            image = image.fliph();
        }
        if options.flip_y {
            image = image.flipv();
        }
        let luma = image.resize_exact(columns, rows, FilterType::Triangle).to_luma8();

        let ramp: Vec<char> = if options.complex {
            COMPLEX_CHARSET.chars().collect()
        } else {
            SIMPLE_CHARSET.chars().collect()
        };
        let last = ramp.len() - 1;

        let lines: Vec<String> = luma
            .rows()
            .map(|row| {
                row.map(|Luma([l])| {
                    let idx = usize::from(*l) * last / 255;
                    if options.negative {
                        ramp[last - idx]
                    } else {
                        ramp[idx]
                    }
                })
                .collect::<String>()
            })
            .collect();
        Ok(lines)
    }
}

impl Renderer for AsciiRenderer {
    fn render(
        &self,
        source: &Path,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), RenderFailure> {
        let bytes = fs::read(source).map_err(|e| RenderFailure::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let image = image::load_from_memory(&bytes).map_err(|e| RenderFailure::Decode {
            path: source.to_path_buf(),
            source: e,
        })?;

        let lines = self.to_lines(&image, options)?;
        let canvas = draw_lines(&lines);
        canvas
            .save_with_format(output, ImageFormat::Png)
            .map_err(|e| RenderFailure::Encode {
                path: output.to_path_buf(),
                source: e,
            })?;

        debug!(
            columns = canvas.width() / CELL_WIDTH,
            rows = lines.len(),
            output = %output.display(),
            "saved ascii art"
        );
        Ok(())
    }
}

/// Resolve the character grid for an image of `width` x `height` pixels.
///
/// Inferred sides compensate for cells being twice as tall as wide.
pub fn grid_size(
    dimensions: Dimensions,
    width: u32,
    height: u32,
) -> Result<(u32, u32), RenderFailure> {
    if width == 0 || height == 0 {
        return Err(RenderFailure::EmptyDimensions(format!(
            "source image is {}x{}",
            width, height
        )));
    }
    let aspect = f64::from(height) / f64::from(width);
    let rows_for = |columns: u32| infer(f64::from(columns) * aspect / 2.0);
    let columns_for = |rows: u32| infer(f64::from(rows) / aspect * 2.0);

    let (columns, rows) = match dimensions {
        // Built-in sizing narrows the grid until it fits under MAX_CELLS.
        Dimensions::Default => {
            let mut columns = DEFAULT_COLUMNS;
            while columns > 1 && u64::from(columns) * u64::from(rows_for(columns)) > MAX_CELLS {
                columns -= 1;
            }
            let max_rows = (MAX_CELLS / u64::from(columns)) as u32;
            (columns, rows_for(columns).min(max_rows))
        }
        Dimensions::Width { width } => (width, rows_for(width)),
        Dimensions::Height { height } => (columns_for(height), height),
        Dimensions::Fixed { width, height } => (width, height),
    };

    if columns == 0 || rows == 0 {
        return Err(RenderFailure::EmptyDimensions(format!(
            "requested {}x{} characters",
            columns, rows
        )));
    }
    if u64::from(columns) * u64::from(rows) > MAX_CELLS {
        return Err(RenderFailure::TooLarge { columns, rows });
    }
    Ok((columns, rows))
}

fn infer(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

fn draw_lines(lines: &[String]) -> GrayImage {
    let columns = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
    let mut canvas = GrayImage::new(columns * CELL_WIDTH, lines.len() as u32 * CELL_HEIGHT);

    for (row, line) in lines.iter().enumerate() {
        for (column, ch) in line.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch) else {
                continue;
            };
            let x0 = column as u32 * CELL_WIDTH;
            let y0 = row as u32 * CELL_HEIGHT;
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..8u32 {
                    if bits & (1 << gx) == 0 {
                        continue;
                    }
                    // Each font row is drawn twice to fill the tall cell.
                    let y = y0 + gy as u32 * 2;
                    canvas.put_pixel(x0 + gx, y, Luma([255]));
                    canvas.put_pixel(x0 + gx, y + 1, Luma([255]));
                }
            }
        }
    }
    canvas
}
