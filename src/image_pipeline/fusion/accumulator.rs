//! Exposure-weighted fusion
//!
//! Folds the selected frames of a stack into a single double-precision
//! buffer by weighted in-place addition.

use tracing::{debug, instrument};

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::fusion::stack::ExposureStack;

/// Fuses frames `0..=limit_index` of the stack into one `Float64` buffer.
///
/// Every sample is converted to `f64` regardless of the source bit depth
/// and accumulated as `out[p] += in[p] * weights[i]`. `limit_index` is
/// normally the exposure selector's result; `None` folds in the whole
/// stack. The accumulator is allocated once, zero-filled, and sized to the
/// first frame; frame sizes are re-checked before any sample is read.
///
/// Multi-channel frames are rejected with
/// [`PipelineError::UnsupportedFormat`].
#[instrument(skip(stack, weights), fields(frames = stack.len()))]
pub fn fuse(
    stack: &ExposureStack,
    weights: &[f64],
    limit_index: Option<usize>,
) -> Result<PixelBuffer> {
    if stack.is_empty() {
        return Err(PipelineError::InvalidParameter(
            "cannot fuse an empty exposure stack".to_string(),
        ));
    }

    let last = match limit_index {
        Some(index) if index < stack.len() => index,
        Some(index) => {
            return Err(PipelineError::InvalidParameter(format!(
                "fusion limit {index} exceeds stack size {}",
                stack.len()
            )));
        }
        None => stack.len() - 1,
    };

    if weights.len() <= last {
        return Err(PipelineError::InvalidParameter(format!(
            "{} weights provided for {} frames",
            weights.len(),
            last + 1
        )));
    }

    let first = stack.frame(0);
    let width = first.width();
    let height = first.height();
    let mut accumulator = PixelBuffer::new(PixelMode::Float64, width, height)?;

    for index in 0..=last {
        let frame = stack.frame(index);
        frame.require_single_channel("fusion")?;
        if frame.width() != width || frame.height() != height {
            return Err(PipelineError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let weight = weights[index];
        for sample in 0..accumulator.sample_count() {
            let value = accumulator.sample(sample) + frame.sample(sample) * weight;
            accumulator.set_sample(sample, value);
        }
        debug!(frame = index, weight, "accumulated frame");
    }

    Ok(accumulator)
}

/// Convenience wrapper that weights each frame by its exposure duration.
pub fn fuse_stack(stack: &ExposureStack, limit_index: Option<usize>) -> Result<PixelBuffer> {
    fuse(stack, stack.exposures(), limit_index)
}
