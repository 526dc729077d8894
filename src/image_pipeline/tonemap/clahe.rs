//! Contrast-limited adaptive histogram equalization
//!
//! Tiled histogram equalization with a clip limit on per-bin contrast
//! amplification and bilinear blending between tile mappings, after
//! Zuiderveld's classic formulation.

use tracing::{debug, instrument};

use crate::image_pipeline::buffer::PixelBuffer;
use crate::image_pipeline::common::error::{PipelineError, Result};

/// Redistribution passes allowed before leftover excess is dropped. A
/// pathologically small clip limit pins every bin at the limit and can
/// never absorb the excess.
const MAX_REDISTRIBUTION_PASSES: usize = 16;

/// Tuning parameters for [`clahe`].
#[derive(Debug, Clone)]
pub struct ClaheParams {
    /// Tile columns; must be at least 2.
    pub tiles_x: usize,
    /// Tile rows; must be at least 2.
    pub tiles_y: usize,
    /// Histogram bins per tile.
    pub num_bins: usize,
    /// Clip limit as a fraction of the average pixels per tile.
    pub clip_limit: f64,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            tiles_x: 8,
            tiles_y: 8,
            num_bins: 128,
            clip_limit: 0.01,
        }
    }
}

impl ClaheParams {
    fn validate(&self) -> Result<()> {
        if self.tiles_x < 2 || self.tiles_y < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "CLAHE needs at least a 2x2 tile grid, got {}x{}",
                self.tiles_x, self.tiles_y
            )));
        }
        if self.num_bins == 0 {
            return Err(PipelineError::InvalidParameter(
                "CLAHE bin count must be positive".to_string(),
            ));
        }
        if self.clip_limit <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "CLAHE clip limit must be positive, got {}",
                self.clip_limit
            )));
        }
        Ok(())
    }
}

/// One tile of the region grid: its pixel rectangle and, once computed,
/// its cumulative mapping table.
struct Tile {
    x_start: usize,
    y_start: usize,
    width: usize,
    height: usize,
    mapping: Vec<f64>,
}

/// Applies CLAHE to `buffer` **in place** over the value range
/// `[value_min, value_max]`.
///
/// The image is partitioned into `tiles_x x tiles_y` quotient-sized tiles;
/// when the dimensions do not divide evenly the remainder is absorbed into
/// the last row and column, so every pixel belongs to exactly one tile.
/// Each tile's histogram is clipped to
/// `max(1, round(average_pixels_per_tile * clip_limit))` with the excess
/// redistributed uniformly, then turned into a monotone cumulative mapping
/// rescaled to `[value_min, value_max]`. Every output pixel bilinearly
/// interpolates the mappings of the up-to-four tiles whose centers surround
/// it; edge and corner pixels clamp to the nearest valid tile. Output
/// values never leave `[value_min, value_max]`.
#[instrument(skip(buffer, params), fields(width = buffer.width(), height = buffer.height()))]
pub fn clahe(
    buffer: &mut PixelBuffer,
    value_min: f64,
    value_max: f64,
    params: &ClaheParams,
) -> Result<()> {
    buffer.require_single_channel("CLAHE")?;
    params.validate()?;
    if value_min >= value_max {
        return Err(PipelineError::InvalidParameter(format!(
            "CLAHE value range is empty: [{value_min}, {value_max}]"
        )));
    }

    let width = buffer.width();
    let height = buffer.height();
    if width < params.tiles_x || height < params.tiles_y {
        return Err(PipelineError::InvalidParameter(format!(
            "image {width}x{height} is smaller than the {}x{} tile grid",
            params.tiles_x, params.tiles_y
        )));
    }

    let average_tile_pixels = (width * height) as f64 / (params.tiles_x * params.tiles_y) as f64;
    let clip = ((average_tile_pixels * params.clip_limit).round() as u64).max(1);
    debug!(clip, bins = params.num_bins, "computed clip limit");

    let mut tiles = layout_tiles(width, height, params.tiles_x, params.tiles_y);
    for tile in &mut tiles {
        let mut histogram = tile_histogram(buffer, tile, value_min, value_max, params.num_bins);
        clip_histogram(&mut histogram, clip);
        tile.mapping = cumulative_mapping(&histogram, value_min, value_max);
    }

    interpolate(buffer, &tiles, value_min, value_max, params);
    Ok(())
}

/// Quotient-sized tiles; the remainder goes to the last row/column.
fn layout_tiles(width: usize, height: usize, tiles_x: usize, tiles_y: usize) -> Vec<Tile> {
    let base_w = width / tiles_x;
    let base_h = height / tiles_y;

    let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        let y_start = ty * base_h;
        let tile_h = if ty == tiles_y - 1 {
            height - y_start
        } else {
            base_h
        };
        for tx in 0..tiles_x {
            let x_start = tx * base_w;
            let tile_w = if tx == tiles_x - 1 {
                width - x_start
            } else {
                base_w
            };
            tiles.push(Tile {
                x_start,
                y_start,
                width: tile_w,
                height: tile_h,
                mapping: Vec::new(),
            });
        }
    }
    tiles
}

fn bin_for_value(value: f64, value_min: f64, value_max: f64, num_bins: usize) -> usize {
    let t = (value.clamp(value_min, value_max) - value_min) / (value_max - value_min);
    ((t * num_bins as f64) as usize).min(num_bins - 1)
}

fn tile_histogram(
    buffer: &PixelBuffer,
    tile: &Tile,
    value_min: f64,
    value_max: f64,
    num_bins: usize,
) -> Vec<u64> {
    let mut histogram = vec![0u64; num_bins];
    for y in tile.y_start..tile.y_start + tile.height {
        for x in tile.x_start..tile.x_start + tile.width {
            let bin = bin_for_value(buffer.sample_at(x, y), value_min, value_max, num_bins);
            histogram[bin] += 1;
        }
    }
    histogram
}

/// Clips every bin to `clip` and redistributes the excess uniformly,
/// re-clipping until no bin exceeds the limit or the passes are exhausted.
/// Excess that can no longer be placed is dropped, so the post-condition
/// `bin <= clip` always holds.
fn clip_histogram(histogram: &mut [u64], clip: u64) {
    let bins = histogram.len() as u64;
    let mut excess = clip_pass(histogram, clip);

    for _ in 0..MAX_REDISTRIBUTION_PASSES {
        if excess == 0 {
            return;
        }
        let per_bin = excess / bins;
        let mut remainder = excess % bins;
        for bin in histogram.iter_mut() {
            *bin += per_bin;
        }
        // The leftover goes one count at a time into bins still under the
        // limit, so it cannot oscillate between passes.
        for bin in histogram.iter_mut() {
            if remainder == 0 {
                break;
            }
            if *bin < clip {
                *bin += 1;
                remainder -= 1;
            }
        }
        excess = clip_pass(histogram, clip) + remainder;
    }
}

fn clip_pass(histogram: &mut [u64], clip: u64) -> u64 {
    let mut excess = 0;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    excess
}

/// Monotone cumulative mapping table rescaled to `[value_min, value_max]`.
fn cumulative_mapping(histogram: &[u64], value_min: f64, value_max: f64) -> Vec<f64> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return vec![value_min; histogram.len()];
    }

    let scale = (value_max - value_min) / total as f64;
    let mut mapping = Vec::with_capacity(histogram.len());
    let mut running = 0u64;
    for &count in histogram {
        running += count;
        mapping.push(value_min + running as f64 * scale);
    }
    mapping
}

/// Neighbor pair and interpolation weight along one axis for coordinate
/// `pos`, clamping at the grid boundary.
fn axis_lookup(centers: &[f64], pos: f64) -> (usize, usize, f64) {
    let last = centers.len() - 1;
    if pos <= centers[0] {
        return (0, 0, 0.0);
    }
    if pos >= centers[last] {
        return (last, last, 0.0);
    }
    let mut hi = 1;
    while centers[hi] < pos {
        hi += 1;
    }
    let lo = hi - 1;
    let weight = (pos - centers[lo]) / (centers[hi] - centers[lo]);
    (lo, hi, weight)
}

fn interpolate(
    buffer: &mut PixelBuffer,
    tiles: &[Tile],
    value_min: f64,
    value_max: f64,
    params: &ClaheParams,
) {
    let width = buffer.width();
    let height = buffer.height();
    let tiles_x = params.tiles_x;

    let centers_x: Vec<f64> = tiles
        .iter()
        .take(tiles_x)
        .map(|t| t.x_start as f64 + t.width as f64 / 2.0)
        .collect();
    let centers_y: Vec<f64> = tiles
        .iter()
        .step_by(tiles_x)
        .map(|t| t.y_start as f64 + t.height as f64 / 2.0)
        .collect();

    let x_lookup: Vec<(usize, usize, f64)> = (0..width)
        .map(|x| axis_lookup(&centers_x, x as f64))
        .collect();
    let y_lookup: Vec<(usize, usize, f64)> = (0..height)
        .map(|y| axis_lookup(&centers_y, y as f64))
        .collect();

    for y in 0..height {
        let (ty0, ty1, wy) = y_lookup[y];
        for x in 0..width {
            let (tx0, tx1, wx) = x_lookup[x];
            let bin = bin_for_value(
                buffer.sample_at(x, y),
                value_min,
                value_max,
                params.num_bins,
            );

            let top_left = tiles[ty0 * tiles_x + tx0].mapping[bin];
            let top_right = tiles[ty0 * tiles_x + tx1].mapping[bin];
            let bottom_left = tiles[ty1 * tiles_x + tx0].mapping[bin];
            let bottom_right = tiles[ty1 * tiles_x + tx1].mapping[bin];

            let top = top_left * (1.0 - wx) + top_right * wx;
            let bottom = bottom_left * (1.0 - wx) + bottom_right * wx;
            let value = top * (1.0 - wy) + bottom * wy;

            buffer.set_sample_at(x, y, value.clamp(value_min, value_max));
        }
    }
}
