//! TIFF frame reader implementation using the tiff library.
//!
//! Decodes grayscale stack frames of 8/16/32-bit unsigned or 32/64-bit
//! float samples into the shared [`PixelBuffer`] representation. 8-bit
//! RGB/RGBA images decode too, but the fusion and tone-mapping stages
//! reject them explicitly.

use std::io::Cursor;

use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode, SampleStorage};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::tiff::reader::FrameReader;

/// Frame reader backed by the tiff crate's decoder.
pub struct TiffFrameReader;

impl FrameReader for TiffFrameReader {
    fn read_frame(&self, data: &[u8]) -> Result<PixelBuffer> {
        debug!("Decoding TIFF frame, {} bytes", data.len());

        let mut decoder = Decoder::new(Cursor::new(data))
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;
        let width = width as usize;
        let height = height as usize;
        let pixels = width * height;

        let image = decoder
            .read_image()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        let (mode, storage) = match image {
            DecodingResult::U8(samples) => {
                let mode = match samples.len() / pixels.max(1) {
                    1 => PixelMode::Gray8,
                    3 => PixelMode::Rgb8,
                    4 => PixelMode::Rgba8,
                    channels => {
                        return Err(PipelineError::UnsupportedFormat(format!(
                            "unsupported channel count {channels} in 8-bit TIFF"
                        )));
                    }
                };
                (mode, SampleStorage::U8(samples))
            }
            DecodingResult::U16(samples) => {
                require_grayscale(samples.len(), pixels, "16-bit")?;
                (PixelMode::Gray16, SampleStorage::U16(samples))
            }
            DecodingResult::U32(samples) => {
                require_grayscale(samples.len(), pixels, "32-bit")?;
                (PixelMode::Gray32, SampleStorage::U32(samples))
            }
            DecodingResult::F32(samples) => {
                require_grayscale(samples.len(), pixels, "32-bit float")?;
                (PixelMode::Float32, SampleStorage::F32(samples))
            }
            DecodingResult::F64(samples) => {
                require_grayscale(samples.len(), pixels, "64-bit float")?;
                (PixelMode::Float64, SampleStorage::F64(samples))
            }
            _ => {
                return Err(PipelineError::UnsupportedFormat(
                    "unsupported TIFF sample format".to_string(),
                ));
            }
        };

        debug!("Decoded frame: {}x{} {:?}", width, height, mode);
        PixelBuffer::from_samples(mode, width, height, storage)
    }
}

fn require_grayscale(samples: usize, pixels: usize, description: &str) -> Result<()> {
    if samples == pixels {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedFormat(format!(
            "multi-channel {description} TIFF frames are not supported"
        )))
    }
}
