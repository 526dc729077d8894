use std::io::Write;

use crate::image_pipeline::buffer::PixelBuffer;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::tiff::types::OutputConfig;

pub trait FrameWriter {
    fn write_frame(
        &self,
        image: &PixelBuffer,
        output: &mut dyn Write,
        config: &OutputConfig,
    ) -> Result<()>;
}
