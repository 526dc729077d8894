//! Output configuration types

use crate::image_pipeline::buffer::PixelMode;

/// TIFF compression methods
#[derive(Debug, Clone, Copy)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced (default)
    DeflateBalanced,
}

/// Configuration for writing the pipeline's final image
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Compression method to use
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    /// Note: Predictor adds processing time, set to None for maximum speed
    pub predictor: Option<u16>,
    /// Pixel mode of the final image (8-bit, 32-bit unsigned, or floating)
    pub output_mode: PixelMode,
    /// Whether to validate image dimensions before processing
    pub validate_dimensions: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
            output_mode: PixelMode::Gray8,
            validate_dimensions: true,
        }
    }
}

impl OutputConfig {
    pub fn builder() -> OutputConfigBuilder {
        OutputConfigBuilder::default()
    }
}

/// Builder for OutputConfig
#[derive(Default)]
pub struct OutputConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    output_mode: Option<PixelMode>,
    validate_dimensions: Option<bool>,
}

impl OutputConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn output_mode(mut self, mode: PixelMode) -> Self {
        self.output_mode = Some(mode);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn build(self) -> OutputConfig {
        let default = OutputConfig::default();
        OutputConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            output_mode: self.output_mode.unwrap_or(default.output_mode),
            validate_dimensions: self
                .validate_dimensions
                .unwrap_or(default.validate_dimensions),
        }
    }
}
