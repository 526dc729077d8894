//! TIFF codec module
//!
//! This module is the pipeline's file-format boundary: trait seams for
//! reading stack frames and writing the final image, with implementations
//! backed by the tiff crate.

mod reader;
mod standard_tiff_writer;
mod tiff_frame_reader;
pub mod types;
mod writer;


pub use reader::FrameReader;
pub use standard_tiff_writer::StandardTiffWriter;
pub use tiff_frame_reader::TiffFrameReader;
pub use types::{OutputConfig, OutputConfigBuilder, TiffCompression};
pub use writer::FrameWriter;
