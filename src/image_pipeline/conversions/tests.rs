#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::{Arc, Mutex};

    use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
    use crate::image_pipeline::common::error::{PipelineError, Result};
    use crate::image_pipeline::conversions::stack_to_tiff::{HdrConfig, StackToTiffPipeline};
    use crate::image_pipeline::fusion::ExposureStack;
    use crate::image_pipeline::tiff::{FrameReader, FrameWriter, OutputConfig};
    use crate::image_pipeline::tonemap::{ClaheParams, RetinexParams};

    /// Reader that turns the first input byte into a flat 16x16 Gray8 frame.
    struct MockReader {
        should_fail: bool,
    }

    impl FrameReader for MockReader {
        fn read_frame(&self, data: &[u8]) -> Result<PixelBuffer> {
            if self.should_fail {
                return Err(PipelineError::DecodeError("Mock decode error".to_string()));
            }
            let value = *data.first().unwrap_or(&0) as f64;
            let mut frame = PixelBuffer::new(PixelMode::Gray8, 16, 16)?;
            for index in 0..frame.sample_count() {
                frame.set_sample(index, value);
            }
            Ok(frame)
        }
    }

    struct MockWriter {
        should_fail: bool,
        written: Arc<Mutex<Vec<PixelBuffer>>>,
    }

    impl FrameWriter for MockWriter {
        fn write_frame(
            &self,
            image: &PixelBuffer,
            _output: &mut dyn Write,
            _config: &OutputConfig,
        ) -> Result<()> {
            if self.should_fail {
                return Err(PipelineError::EncodeError("Mock encode error".to_string()));
            }
            self.written.lock().unwrap().push(image.clone());
            Ok(())
        }
    }

    fn gradient_stack(width: usize, height: usize) -> ExposureStack {
        let mut stack = ExposureStack::new();
        for exposure in [1.0, 2.0, 4.0] {
            let mut frame = PixelBuffer::new(PixelMode::Gray8, width, height).unwrap();
            for index in 0..frame.sample_count() {
                frame.set_sample(index, (index % 200) as f64);
            }
            stack.push(frame, exposure).unwrap();
        }
        stack
    }

    #[test]
    fn test_config_builder() {
        let config = HdrConfig::builder()
            .saturation_threshold(0.25)
            .clahe(Some(ClaheParams::default()))
            .retinex(Some(RetinexParams::default()))
            .output(OutputConfig::builder().output_mode(PixelMode::Gray32).build())
            .build();

        assert_eq!(config.saturation_threshold, 0.25);
        assert!(config.clahe.is_some());
        assert!(config.retinex.is_some());
        assert_eq!(config.output.output_mode, PixelMode::Gray32);
    }

    #[test]
    fn test_successful_conversion() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: false };
        let writer = MockWriter {
            should_fail: false,
            written: written.clone(),
        };

        let pipeline = StackToTiffPipeline::with_custom(reader, writer, HdrConfig::default());

        // Dark, usable, saturated: the middle frame drives the selection.
        let frames = vec![vec![0u8], vec![128u8], vec![255u8]];
        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&frames, &[0.1, 1.0, 10.0], &mut output);

        assert!(result.is_ok());
        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].mode(), PixelMode::Gray8);
        assert_eq!(written[0].width(), 16);
        assert_eq!(written[0].height(), 16);
    }

    #[test]
    fn test_reader_failure() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: true };
        let writer = MockWriter {
            should_fail: false,
            written,
        };

        let pipeline = StackToTiffPipeline::with_custom(reader, writer, HdrConfig::default());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&[vec![128u8]], &[1.0], &mut output);

        assert!(matches!(result, Err(PipelineError::DecodeError(_))));
    }

    #[test]
    fn test_writer_failure() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: false };
        let writer = MockWriter {
            should_fail: true,
            written,
        };

        let pipeline = StackToTiffPipeline::with_custom(reader, writer, HdrConfig::default());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&[vec![128u8]], &[1.0], &mut output);

        assert!(matches!(result, Err(PipelineError::EncodeError(_))));
    }

    #[test]
    fn test_exposure_list_must_cover_frames() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: false };
        let writer = MockWriter {
            should_fail: false,
            written,
        };

        let pipeline = StackToTiffPipeline::with_custom(reader, writer, HdrConfig::default());

        let frames = vec![vec![10u8], vec![128u8]];
        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&frames, &[1.0], &mut output);

        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn test_no_usable_exposure_propagates() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: false };
        let writer = MockWriter {
            should_fail: false,
            written,
        };

        let pipeline = StackToTiffPipeline::with_custom(reader, writer, HdrConfig::default());

        // Only degenerate frames: all black and all saturated.
        let frames = vec![vec![0u8], vec![255u8]];
        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&frames, &[1.0, 2.0], &mut output);

        assert!(matches!(result, Err(PipelineError::NoUsableExposure)));
    }

    #[test]
    fn test_process_stack_spans_output_range() {
        let pipeline = StackToTiffPipeline::new(HdrConfig::default());
        let output = pipeline.process_stack(&gradient_stack(20, 20)).unwrap();

        assert_eq!(output.mode(), PixelMode::Gray8);
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for index in 0..output.sample_count() {
            min = min.min(output.sample(index));
            max = max.max(output.sample(index));
        }
        assert_eq!(min, 0.0);
        assert_eq!(max, 255.0);
    }

    #[test]
    fn test_process_stack_with_clahe_and_retinex() {
        let config = HdrConfig::builder()
            .clahe(Some(ClaheParams {
                tiles_x: 2,
                tiles_y: 2,
                num_bins: 64,
                clip_limit: 0.05,
            }))
            .retinex(Some(RetinexParams::single_scale(2.0)))
            .output(
                OutputConfig::builder()
                    .output_mode(PixelMode::Float32)
                    .build(),
            )
            .build();
        let pipeline = StackToTiffPipeline::new(config);

        let output = pipeline.process_stack(&gradient_stack(64, 64)).unwrap();
        assert_eq!(output.mode(), PixelMode::Float32);
        for index in 0..output.sample_count() {
            let value = output.sample(index);
            assert!((0.0..=1.0).contains(&value));
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_empty_stack_is_rejected() {
        let pipeline = StackToTiffPipeline::new(HdrConfig::default());
        let result = pipeline.process_stack(&ExposureStack::new());
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }
}
