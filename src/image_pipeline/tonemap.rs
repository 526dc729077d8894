//! Tone mapping module
//!
//! This module compresses the dynamic range of the fused image for display
//! and storage: linear normalization, CLAHE, and the Retinex-style local
//! contrast filter built on general 2-D convolution.

pub mod clahe;
pub mod convolution;
pub mod normalizer;
pub mod retinex;

#[cfg(test)]
mod tests;

pub use clahe::{ClaheParams, clahe};
pub use convolution::{ConvolutionKernel, convolve};
pub use normalizer::{normalize, quantize_to_gray8};
pub use retinex::{RetinexParams, SurroundScale, retinex_filter};
