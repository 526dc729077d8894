//! Linear range normalization
//!
//! Rescales an arbitrary-range single-channel buffer into a requested
//! output representation. Used both as the final output step and as the
//! pre/post step around CLAHE and the Retinex filter.

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
use crate::image_pipeline::common::error::{PipelineError, Result};

/// Linearly rescales `input` into `target_mode`.
///
/// Pass one finds the min and max sample values as `f64`; pass two maps
/// each sample to `(value - min) * target_range / (max - min)`, rounding
/// for integer targets and casting for float targets. The target range is
/// the mode's nominal full scale (255 for `Gray8`, `2^32 - 1` for
/// `Gray32`, 1.0 for the float modes).
///
/// A constant input (`max == min`) produces the target's zero value
/// everywhere; no NaN or infinity is ever emitted.
pub fn normalize(input: &PixelBuffer, target_mode: PixelMode) -> Result<PixelBuffer> {
    input.require_single_channel("normalize")?;
    if !target_mode.is_single_channel() {
        return Err(PipelineError::UnsupportedFormat(format!(
            "normalize cannot target multi-channel mode {target_mode:?}"
        )));
    }

    let mut output = PixelBuffer::new(target_mode, input.width(), input.height())?;
    let Some((min, max)) = sample_range(input) else {
        return Ok(output);
    };
    if max == min {
        // Degenerate flat input maps to the target's zero value uniformly.
        return Ok(output);
    }

    let scale = target_mode.max_value() / (max - min);
    for index in 0..input.sample_count() {
        output.set_sample(index, (input.sample(index) - min) * scale);
    }
    Ok(output)
}

/// Produces the 8-bit copy the exposure selector inspects.
///
/// Integer modes rescale from their nominal `[0, full-scale]` range so a
/// uniform frame keeps its level instead of collapsing to zero; float
/// modes, which have no nominal range, fall back to the observed min/max
/// rescale of [`normalize`].
pub fn quantize_to_gray8(input: &PixelBuffer) -> Result<PixelBuffer> {
    input.require_single_channel("quantize")?;
    if input.mode().is_float() {
        return normalize(input, PixelMode::Gray8);
    }

    let mut output = PixelBuffer::new(PixelMode::Gray8, input.width(), input.height())?;
    let scale = PixelMode::Gray8.max_value() / input.mode().max_value();
    for index in 0..input.sample_count() {
        output.set_sample(index, input.sample(index) * scale);
    }
    Ok(output)
}

/// Min and max sample values, or `None` for an empty buffer.
pub fn sample_range(input: &PixelBuffer) -> Option<(f64, f64)> {
    if input.sample_count() == 0 {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for index in 0..input.sample_count() {
        let value = input.sample(index);
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
    }
    Some((min, max))
}
