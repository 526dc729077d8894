use std::io::Write;

use tracing::debug;

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::tiff::types::{OutputConfig, TiffCompression};
use crate::image_pipeline::tiff::writer::FrameWriter;

pub struct StandardTiffWriter;

impl FrameWriter for StandardTiffWriter {
    fn write_frame(
        &self,
        image: &PixelBuffer,
        output: &mut dyn Write,
        config: &OutputConfig,
    ) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{} {:?}",
            image.width(),
            image.height(),
            image.mode()
        );

        let mut buffer = Vec::new();

        let compression = match config.compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Fast,
            ),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Balanced,
            ),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Best,
            ),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        let width = image.width() as u32;
        let height = image.height() as u32;

        match image.mode() {
            PixelMode::Gray8 => {
                let samples = storage_slice(image.data().as_u8())?;
                encoder
                    .write_image::<tiff::encoder::colortype::Gray8>(width, height, samples)
                    .map_err(|e| PipelineError::EncodeError(e.to_string()))?;
            }
            PixelMode::Gray16 => {
                let samples = storage_slice(image.data().as_u16())?;
                encoder
                    .write_image::<tiff::encoder::colortype::Gray16>(width, height, samples)
                    .map_err(|e| PipelineError::EncodeError(e.to_string()))?;
            }
            PixelMode::Gray32 => {
                let samples = storage_slice(image.data().as_u32())?;
                encoder
                    .write_image::<tiff::encoder::colortype::Gray32>(width, height, samples)
                    .map_err(|e| PipelineError::EncodeError(e.to_string()))?;
            }
            PixelMode::Float32 => {
                let samples = storage_slice(image.data().as_f32())?;
                encoder
                    .write_image::<tiff::encoder::colortype::Gray32Float>(width, height, samples)
                    .map_err(|e| PipelineError::EncodeError(e.to_string()))?;
            }
            PixelMode::Float64 => {
                let samples = storage_slice(image.data().as_f64())?;
                encoder
                    .write_image::<tiff::encoder::colortype::Gray64Float>(width, height, samples)
                    .map_err(|e| PipelineError::EncodeError(e.to_string()))?;
            }
            mode => {
                return Err(PipelineError::UnsupportedFormat(format!(
                    "TIFF writer does not support output mode {mode:?}"
                )));
            }
        }

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}

fn storage_slice<T>(slice: Option<&[T]>) -> Result<&[T]> {
    slice.ok_or_else(|| {
        PipelineError::EncodeError("sample storage does not match pixel mode".to_string())
    })
}
