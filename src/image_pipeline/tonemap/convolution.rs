//! General 2-D convolution
//!
//! Variable-size odd-kernel convolution over single-channel buffers,
//! producing a double-precision output of the same dimensions.

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
use crate::image_pipeline::common::error::{PipelineError, Result};

/// An immutable odd-sized `(2k+1) x (2k+1)` weight matrix.
///
/// No normalization is enforced; callers are responsible for the kernel
/// weights summing to the intended gain.
#[derive(Debug, Clone)]
pub struct ConvolutionKernel {
    size: usize,
    weights: Vec<f64>,
}

impl ConvolutionKernel {
    /// Wraps `weights` as a `size x size` kernel. `size` must be odd and
    /// positive and `weights` must hold exactly `size * size` entries.
    pub fn new(size: usize, weights: Vec<f64>) -> Result<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(PipelineError::InvalidParameter(format!(
                "convolution kernel size must be odd and positive, got {size}"
            )));
        }
        if weights.len() != size * size {
            return Err(PipelineError::InvalidParameter(format!(
                "kernel of size {size} needs {} weights, got {}",
                size * size,
                weights.len()
            )));
        }
        Ok(Self { size, weights })
    }

    /// Builds a normalized Gaussian low-pass kernel of radius `radius`
    /// (size `2 * radius + 1`) with standard deviation `sigma`. The
    /// weights sum to 1 so the kernel has unity gain.
    pub fn gaussian(radius: usize, sigma: f64) -> Result<Self> {
        if radius == 0 {
            return Err(PipelineError::InvalidParameter(
                "Gaussian kernel radius must be positive".to_string(),
            ));
        }
        if sigma <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "Gaussian sigma must be positive, got {sigma}"
            )));
        }

        let size = 2 * radius + 1;
        let denominator = 2.0 * sigma * sigma;
        let mut weights = Vec::with_capacity(size * size);
        let mut sum = 0.0;
        for ky in 0..size {
            for kx in 0..size {
                let dx = kx as f64 - radius as f64;
                let dy = ky as f64 - radius as f64;
                let weight = (-(dx * dx + dy * dy) / denominator).exp();
                weights.push(weight);
                sum += weight;
            }
        }
        for weight in &mut weights {
            *weight /= sum;
        }
        Self::new(size, weights)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        self.size / 2
    }

    pub fn weight(&self, kx: usize, ky: usize) -> f64 {
        self.weights[ky * self.size + kx]
    }
}

/// Convolves `input` with `kernel`, returning a `Float64` buffer of the
/// same dimensions.
///
/// True 2-D convolution over the valid region: every output pixel whose
/// full kernel footprint lies inside the input gets the weighted sum.
/// Border pixels within `kernel.radius()` of an edge are set to zero (the
/// one border policy this engine implements). Convolving an impulse
/// reproduces the kernel's weights around the impulse position.
pub fn convolve(input: &PixelBuffer, kernel: &ConvolutionKernel) -> Result<PixelBuffer> {
    input.require_single_channel("convolution")?;

    let width = input.width();
    let height = input.height();
    let radius = kernel.radius();
    let size = kernel.size();

    // Zero-filled output doubles as the border fill.
    let mut output = PixelBuffer::new(PixelMode::Float64, width, height)?;
    if width < size || height < size {
        return Ok(output);
    }

    for y in radius..height - radius {
        for x in radius..width - radius {
            let mut accumulated = 0.0;
            for ky in 0..size {
                let sy = y + radius - ky;
                for kx in 0..size {
                    let sx = x + radius - kx;
                    accumulated += kernel.weight(kx, ky) * input.sample_at(sx, sy);
                }
            }
            output.set_sample_at(x, y, accumulated);
        }
    }
    Ok(output)
}
