use crate::image_pipeline::buffer::PixelBuffer;
use crate::image_pipeline::common::error::Result;

pub trait FrameReader {
    fn read_frame(&self, data: &[u8]) -> Result<PixelBuffer>;
}
