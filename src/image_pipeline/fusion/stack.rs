//! Exposure stack type
//!
//! An ordered sequence of equally-sized frames paired positionally with
//! their exposure durations. Positions are assumed ascending in exposure
//! time; the selector and accumulator rely on that ordering.

use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
use crate::image_pipeline::common::error::{PipelineError, Result};

/// A stack of same-scene exposures, longest exposure last.
///
/// Built once from already-decoded frames, consumed once by the fusion
/// stage, then dropped.
#[derive(Debug, Default)]
pub struct ExposureStack {
    frames: Vec<PixelBuffer>,
    exposures: Vec<f64>,
}

impl ExposureStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and its exposure duration.
    ///
    /// Every frame must match the first frame's dimensions and pixel mode;
    /// mismatches fail fast instead of corrupting the fusion pass later.
    pub fn push(&mut self, frame: PixelBuffer, exposure_seconds: f64) -> Result<()> {
        if let Some(first) = self.frames.first() {
            if frame.width() != first.width() || frame.height() != first.height() {
                return Err(PipelineError::DimensionMismatch {
                    expected_width: first.width(),
                    expected_height: first.height(),
                    actual_width: frame.width(),
                    actual_height: frame.height(),
                });
            }
            if frame.mode() != first.mode() {
                return Err(PipelineError::InvalidParameter(format!(
                    "stack frames must share a pixel mode: {:?} != {:?}",
                    frame.mode(),
                    first.mode()
                )));
            }
        }
        self.frames.push(frame);
        self.exposures.push(exposure_seconds);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> &PixelBuffer {
        &self.frames[index]
    }

    pub fn frames(&self) -> &[PixelBuffer] {
        &self.frames
    }

    pub fn exposures(&self) -> &[f64] {
        &self.exposures
    }

    pub fn width(&self) -> Option<usize> {
        self.frames.first().map(|f| f.width())
    }

    pub fn height(&self) -> Option<usize> {
        self.frames.first().map(|f| f.height())
    }

    pub fn mode(&self) -> Option<PixelMode> {
        self.frames.first().map(|f| f.mode())
    }
}
