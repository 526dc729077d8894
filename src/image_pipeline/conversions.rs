//! Pipeline orchestration module
//!
//! This module wires exposure selection, fusion, tone mapping, and the
//! TIFF codec boundary into one end-to-end conversion.

mod stack_to_tiff;

#[cfg(test)]
mod tests;

pub use stack_to_tiff::{HdrConfig, HdrConfigBuilder, StackToTiffPipeline};
