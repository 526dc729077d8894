//! Pixel buffer module
//!
//! This module provides the shared image representation used by every
//! pipeline stage: a closed set of pixel modes over a typed sample storage.

pub mod types;


pub use types::{PixelBuffer, PixelMode, SampleStorage};
