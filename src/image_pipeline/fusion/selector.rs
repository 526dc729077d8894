//! Exposure selection
//!
//! Finds the last (longest) exposure in a stack that is not washed out, so
//! badly saturated captures can be excluded from fusion.

use tracing::debug;

use crate::image_pipeline::buffer::PixelBuffer;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::fusion::stack::ExposureStack;
use crate::image_pipeline::tonemap::normalizer;

/// Default saturation threshold for [`select_last_usable_frame`].
pub const DEFAULT_SATURATION_THRESHOLD: f64 = 0.5;

/// Fraction of mass in the bottom bin above which a frame counts as
/// nearly all black.
const DEGENERATE_LOW_CDF: f64 = 0.99;
/// Fraction of mass below the top bin under which a frame counts as
/// nearly all saturated.
const DEGENERATE_HIGH_CDF: f64 = 0.01;

/// Scans the stack from the longest exposure backward and returns the index
/// of the last frame that is not already washed out.
///
/// Each frame is quantized to 8 bits over its mode's nominal range and
/// judged by the cumulative distribution of its 256-bin histogram,
/// normalized so `cdf[255] == 1`. Frames that are nearly all black
/// (`cdf[0] > 0.99`) or nearly all saturated (`cdf[254] < 0.01`) are
/// skipped. A frame qualifies as a candidate when `cdf[254] > threshold`,
/// i.e. the saturated top bin does not dominate the mass; the scan keeps
/// moving toward shorter exposures while candidates remain mostly saturated
/// (`cdf[254] <= 0.5`) and stops at the first one that is not.
///
/// Returns [`PipelineError::NoUsableExposure`] when the stack holds no
/// candidate at all. Deterministic for a given stack and threshold.
pub fn select_last_usable_frame(stack: &ExposureStack, threshold: f64) -> Result<usize> {
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "saturation threshold must lie in (0, 1), got {threshold}"
        )));
    }

    let mut best: Option<usize> = None;

    for index in (0..stack.len()).rev() {
        let quantized = normalizer::quantize_to_gray8(stack.frame(index))?;
        let cdf = normalized_cdf(&quantized);

        if cdf[0] > DEGENERATE_LOW_CDF || cdf[254] < DEGENERATE_HIGH_CDF {
            debug!(frame = index, "skipping degenerate exposure");
            continue;
        }

        if cdf[254] > threshold {
            best = Some(index);
            if cdf[254] > 0.5 {
                break;
            }
            debug!(
                frame = index,
                unsaturated_mass = cdf[254],
                "candidate still mostly saturated, scanning shorter exposures"
            );
        }
    }

    best.ok_or(PipelineError::NoUsableExposure)
}

/// 256-bin cumulative distribution of an 8-bit buffer, normalized so the
/// final entry equals 1.
fn normalized_cdf(quantized: &PixelBuffer) -> [f64; 256] {
    let mut histogram = [0u64; 256];
    for index in 0..quantized.sample_count() {
        histogram[quantized.sample(index) as usize] += 1;
    }

    let total = quantized.sample_count().max(1) as f64;
    let mut cdf = [0.0f64; 256];
    let mut running = 0u64;
    for (bin, count) in histogram.iter().enumerate() {
        running += count;
        cdf[bin] = running as f64 / total;
    }
    cdf
}
