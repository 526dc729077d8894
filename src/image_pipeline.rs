//! HDR image processing pipeline module
//!
//! This module provides a structured approach to HDR exposure-stack
//! processing, with separate modules for the pixel buffer model, fusion,
//! tone mapping, TIFF I/O, and conversion orchestration.

pub mod buffer;
pub mod common;
pub mod conversions;
pub mod fusion;
pub mod tiff;
pub mod tonemap;

pub use common::{PipelineError, Result};

pub use buffer::{PixelBuffer, PixelMode, SampleStorage};

pub use fusion::{ExposureStack, fuse, fuse_stack, select_last_usable_frame};

pub use tonemap::{
    ClaheParams, ConvolutionKernel, RetinexParams, SurroundScale, clahe, convolve, normalize,
    retinex_filter,
};

pub use tiff::{
    FrameReader, FrameWriter, OutputConfig, OutputConfigBuilder, StandardTiffWriter,
    TiffCompression, TiffFrameReader,
};

pub use conversions::{HdrConfig, HdrConfigBuilder, StackToTiffPipeline};
