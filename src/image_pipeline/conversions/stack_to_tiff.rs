use std::io::Write;
use std::path::Path;

use tracing::{info, instrument};

use crate::image_pipeline::{
    buffer::{PixelBuffer, PixelMode},
    common::error::{PipelineError, Result},
    fusion::{self, DEFAULT_SATURATION_THRESHOLD, ExposureStack},
    tiff::{FrameReader, FrameWriter, OutputConfig, StandardTiffWriter, TiffFrameReader},
    tonemap::{self, ClaheParams, RetinexParams},
};

/// Bit depth of the quantized copy CLAHE operates on.
const CLAHE_WORKING_MODE: PixelMode = PixelMode::Gray16;

/// Configuration for the full fuse-and-tone-map run.
#[derive(Debug, Clone)]
pub struct HdrConfig {
    /// Saturation threshold handed to the exposure selector.
    pub saturation_threshold: f64,
    /// CLAHE tone mapping; `None` skips the stage.
    pub clahe: Option<ClaheParams>,
    /// Retinex local-contrast filter; `None` skips the stage.
    pub retinex: Option<RetinexParams>,
    /// Final output format and TIFF encoding options.
    pub output: OutputConfig,
}

impl Default for HdrConfig {
    fn default() -> Self {
        Self {
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            clahe: None,
            retinex: None,
            output: OutputConfig::default(),
        }
    }
}

impl HdrConfig {
    pub fn builder() -> HdrConfigBuilder {
        HdrConfigBuilder::default()
    }
}

/// Builder for HdrConfig
#[derive(Default)]
pub struct HdrConfigBuilder {
    saturation_threshold: Option<f64>,
    clahe: Option<Option<ClaheParams>>,
    retinex: Option<Option<RetinexParams>>,
    output: Option<OutputConfig>,
}

impl HdrConfigBuilder {
    pub fn saturation_threshold(mut self, threshold: f64) -> Self {
        self.saturation_threshold = Some(threshold);
        self
    }

    pub fn clahe(mut self, params: Option<ClaheParams>) -> Self {
        self.clahe = Some(params);
        self
    }

    pub fn retinex(mut self, params: Option<RetinexParams>) -> Self {
        self.retinex = Some(params);
        self
    }

    pub fn output(mut self, output: OutputConfig) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> HdrConfig {
        let default = HdrConfig::default();
        HdrConfig {
            saturation_threshold: self
                .saturation_threshold
                .unwrap_or(default.saturation_threshold),
            clahe: self.clahe.unwrap_or(default.clahe),
            retinex: self.retinex.unwrap_or(default.retinex),
            output: self.output.unwrap_or(default.output),
        }
    }
}

/// Orchestrates the HDR pipeline: exposure selection, weighted fusion,
/// optional CLAHE and Retinex tone mapping, and final normalization, with
/// frames read and the result written through the codec trait seams.
pub struct StackToTiffPipeline<R: FrameReader, W: FrameWriter> {
    reader: R,
    writer: W,
    config: HdrConfig,
}

impl StackToTiffPipeline<TiffFrameReader, StandardTiffWriter> {
    pub fn new(config: HdrConfig) -> Self {
        Self {
            reader: TiffFrameReader,
            writer: StandardTiffWriter,
            config,
        }
    }
}

impl<R: FrameReader, W: FrameWriter> StackToTiffPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: HdrConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.output.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidParameter(format!(
                "invalid stack dimensions: {width}x{height}"
            )));
        }

        Ok(())
    }

    /// Runs the in-memory pipeline over an already-built stack and returns
    /// the final image in the configured output mode.
    #[instrument(skip(self, stack), fields(frames = stack.len()))]
    pub fn process_stack(&self, stack: &ExposureStack) -> Result<PixelBuffer> {
        info!("Starting HDR fusion");

        let (width, height) = match (stack.width(), stack.height()) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                return Err(PipelineError::InvalidParameter(
                    "cannot process an empty exposure stack".to_string(),
                ));
            }
        };
        self.validate_dimensions(width, height)?;

        let selected = {
            let _span = tracing::info_span!("select_exposures").entered();
            fusion::select_last_usable_frame(stack, self.config.saturation_threshold)?
        };
        info!(selected, "selected last usable exposure");

        let mut image = {
            let _span = tracing::info_span!("fuse_frames").entered();
            fusion::fuse_stack(stack, Some(selected))?
        };

        if let Some(clahe_params) = &self.config.clahe {
            let _span = tracing::info_span!("clahe").entered();
            let mut quantized = tonemap::normalize(&image, CLAHE_WORKING_MODE)?;
            tonemap::clahe(
                &mut quantized,
                0.0,
                CLAHE_WORKING_MODE.max_value(),
                clahe_params,
            )?;
            image = quantized;
        }

        if let Some(retinex_params) = &self.config.retinex {
            let _span = tracing::info_span!("retinex").entered();
            image = tonemap::retinex_filter(&image, retinex_params)?;
        }

        let output = {
            let _span = tracing::info_span!("normalize_output").entered();
            tonemap::normalize(&image, self.config.output.output_mode)?
        };

        info!(width, height, "HDR processing complete");
        Ok(output)
    }

    /// Decodes the given frames, runs the pipeline, and encodes the result
    /// into `output`. `exposures` pairs positionally with `frames` and must
    /// cover every frame.
    #[instrument(skip(self, frames, exposures, output), fields(frames = frames.len()))]
    pub fn convert(
        &self,
        frames: &[Vec<u8>],
        exposures: &[f64],
        output: &mut dyn Write,
    ) -> Result<()> {
        if exposures.len() < frames.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "{} exposure times provided for {} frames",
                exposures.len(),
                frames.len()
            )));
        }

        let stack = {
            let _span = tracing::info_span!("decode_frames").entered();
            let mut stack = ExposureStack::new();
            for (data, &exposure) in frames.iter().zip(exposures) {
                stack.push(self.reader.read_frame(data)?, exposure)?;
            }
            stack
        };

        let image = self.process_stack(&stack)?;

        {
            let _span = tracing::info_span!("encode_tiff").entered();
            self.writer.write_frame(&image, output, &self.config.output)?;
        }

        Ok(())
    }

    /// File-path convenience wrapper around [`convert`](Self::convert).
    #[instrument(skip(self, input_paths, exposures, output_path))]
    pub fn convert_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_paths: &[P],
        exposures: &[f64],
        output_path: Q,
    ) -> Result<()> {
        let output_path = output_path.as_ref();

        let mut frames = Vec::with_capacity(input_paths.len());
        for path in input_paths {
            let path = path.as_ref();
            let data = std::fs::read(path).map_err(|e| {
                PipelineError::InputReadError(format!("{}: {}", path.display(), e))
            })?;
            frames.push(data);
        }

        let mut output_file = std::fs::File::create(output_path).map_err(|e| {
            PipelineError::OutputWriteError(format!("{}: {}", output_path.display(), e))
        })?;

        self.convert(&frames, exposures, &mut output_file)?;

        info!(output = %output_path.display(), "wrote fused image");
        Ok(())
    }

    pub fn config(&self) -> &HdrConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: HdrConfig) {
        self.config = config;
    }
}
