#[cfg(test)]
mod tests {
    use crate::image_pipeline::buffer::{PixelBuffer, PixelMode};
    use crate::image_pipeline::common::error::PipelineError;
    use crate::image_pipeline::tonemap::clahe::{ClaheParams, clahe};
    use crate::image_pipeline::tonemap::convolution::{ConvolutionKernel, convolve};
    use crate::image_pipeline::tonemap::normalizer::{normalize, quantize_to_gray8};
    use crate::image_pipeline::tonemap::retinex::{RetinexParams, SurroundScale, retinex_filter};

    fn gradient_frame(mode: PixelMode, width: usize, height: usize, step: f64) -> PixelBuffer {
        let mut frame = PixelBuffer::new(mode, width, height).unwrap();
        for index in 0..frame.sample_count() {
            frame.set_sample(index, index as f64 * step);
        }
        frame
    }

    #[test]
    fn test_normalize_is_monotonic() {
        let input = gradient_frame(PixelMode::Gray16, 16, 16, 11.0);
        let output = normalize(&input, PixelMode::Gray8).unwrap();

        for index in 1..output.sample_count() {
            assert!(output.sample(index) >= output.sample(index - 1));
        }
    }

    #[test]
    fn test_normalize_spans_target_range() {
        let input = gradient_frame(PixelMode::Gray16, 8, 8, 100.0);
        let output = normalize(&input, PixelMode::Gray8).unwrap();

        assert_eq!(output.sample(0), 0.0);
        assert_eq!(output.sample(output.sample_count() - 1), 255.0);
    }

    #[test]
    fn test_normalize_degenerate_input_is_zero() {
        let mut input = PixelBuffer::new(PixelMode::Float64, 8, 8).unwrap();
        for index in 0..input.sample_count() {
            input.set_sample(index, 123.456);
        }

        for target in [PixelMode::Gray8, PixelMode::Gray32, PixelMode::Float64] {
            let output = normalize(&input, target).unwrap();
            for index in 0..output.sample_count() {
                let value = output.sample(index);
                assert_eq!(value, 0.0);
                assert!(value.is_finite());
            }
        }
    }

    #[test]
    fn test_normalize_float_target_unit_range() {
        let input = gradient_frame(PixelMode::Gray8, 4, 4, 10.0);
        let output = normalize(&input, PixelMode::Float64).unwrap();

        assert_eq!(output.sample(0), 0.0);
        assert_eq!(output.sample(output.sample_count() - 1), 1.0);
        for index in 0..output.sample_count() {
            let value = output.sample(index);
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_normalize_rejects_multi_channel() {
        let input = PixelBuffer::new(PixelMode::Rgb8, 4, 4).unwrap();
        let result = normalize(&input, PixelMode::Gray8);
        assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_quantize_keeps_uniform_level() {
        // A flat mid-gray frame must keep its level under the fixed-range
        // quantization instead of collapsing to zero.
        let mut input = PixelBuffer::new(PixelMode::Gray16, 8, 8).unwrap();
        for index in 0..input.sample_count() {
            input.set_sample(index, 32768.0);
        }

        let quantized = quantize_to_gray8(&input).unwrap();
        assert_eq!(quantized.mode(), PixelMode::Gray8);
        for index in 0..quantized.sample_count() {
            assert_eq!(quantized.sample(index), 128.0);
        }
    }

    #[test]
    fn test_quantize_gray8_is_identity() {
        let input = gradient_frame(PixelMode::Gray8, 8, 8, 3.0);
        let quantized = quantize_to_gray8(&input).unwrap();
        for index in 0..input.sample_count() {
            assert_eq!(quantized.sample(index), input.sample(index));
        }
    }

    #[test]
    fn test_clahe_parameter_validation() {
        let mut buffer = PixelBuffer::new(PixelMode::Gray16, 64, 64).unwrap();

        let too_few_tiles = ClaheParams {
            tiles_x: 1,
            ..ClaheParams::default()
        };
        assert!(matches!(
            clahe(&mut buffer, 0.0, 65535.0, &too_few_tiles),
            Err(PipelineError::InvalidParameter(_))
        ));

        let no_bins = ClaheParams {
            num_bins: 0,
            ..ClaheParams::default()
        };
        assert!(matches!(
            clahe(&mut buffer, 0.0, 65535.0, &no_bins),
            Err(PipelineError::InvalidParameter(_))
        ));

        let bad_clip = ClaheParams {
            clip_limit: 0.0,
            ..ClaheParams::default()
        };
        assert!(matches!(
            clahe(&mut buffer, 0.0, 65535.0, &bad_clip),
            Err(PipelineError::InvalidParameter(_))
        ));

        assert!(matches!(
            clahe(&mut buffer, 100.0, 100.0, &ClaheParams::default()),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_clahe_flat_image_stays_flat() {
        let mut buffer = PixelBuffer::new(PixelMode::Gray16, 128, 128).unwrap();
        for index in 0..buffer.sample_count() {
            buffer.set_sample(index, 30000.0);
        }

        let params = ClaheParams {
            tiles_x: 4,
            tiles_y: 4,
            num_bins: 128,
            clip_limit: 0.01,
        };
        clahe(&mut buffer, 0.0, 65535.0, &params).unwrap();

        // Redistribution turns the single spike into a near-uniform ramp,
        // so the mapped level sits within a couple of bin widths of the
        // input level and the image stays perfectly flat.
        let first = buffer.sample(0);
        let bin_width = 65535.0 / 128.0;
        assert!((first - 30000.0).abs() <= 2.0 * bin_width);
        for index in 0..buffer.sample_count() {
            assert_eq!(buffer.sample(index), first);
        }
    }

    #[test]
    fn test_clahe_output_stays_in_range() {
        let mut buffer = PixelBuffer::new(PixelMode::Gray16, 64, 48).unwrap();
        for index in 0..buffer.sample_count() {
            buffer.set_sample(index, ((index * 977) % 65536) as f64);
        }

        clahe(&mut buffer, 0.0, 65535.0, &ClaheParams::default()).unwrap();
        for index in 0..buffer.sample_count() {
            let value = buffer.sample(index);
            assert!((0.0..=65535.0).contains(&value));
        }
    }

    #[test]
    fn test_clahe_handles_indivisible_dimensions() {
        // 50x38 does not divide by a 4x4 grid; the remainder lands in the
        // last row/column of tiles and every pixel still gets mapped.
        let mut buffer = PixelBuffer::new(PixelMode::Gray8, 50, 38).unwrap();
        for index in 0..buffer.sample_count() {
            buffer.set_sample(index, (index % 256) as f64);
        }

        let params = ClaheParams {
            tiles_x: 4,
            tiles_y: 4,
            num_bins: 64,
            clip_limit: 0.05,
        };
        clahe(&mut buffer, 0.0, 255.0, &params).unwrap();
        for index in 0..buffer.sample_count() {
            assert!((0.0..=255.0).contains(&buffer.sample(index)));
        }
    }

    #[test]
    fn test_clahe_rejects_undersized_image() {
        let mut buffer = PixelBuffer::new(PixelMode::Gray8, 4, 4).unwrap();
        let params = ClaheParams {
            tiles_x: 8,
            tiles_y: 8,
            ..ClaheParams::default()
        };
        assert!(matches!(
            clahe(&mut buffer, 0.0, 255.0, &params),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kernel_validation() {
        assert!(matches!(
            ConvolutionKernel::new(4, vec![0.0; 16]),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert!(matches!(
            ConvolutionKernel::new(3, vec![0.0; 8]),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert!(matches!(
            ConvolutionKernel::gaussian(0, 1.0),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert!(matches!(
            ConvolutionKernel::gaussian(3, 0.0),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_gaussian_kernel_has_unity_gain() {
        let kernel = ConvolutionKernel::gaussian(5, 2.0).unwrap();
        assert_eq!(kernel.size(), 11);

        let mut sum = 0.0;
        for ky in 0..kernel.size() {
            for kx in 0..kernel.size() {
                sum += kernel.weight(kx, ky);
            }
        }
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_convolution_impulse_response() {
        let mut input = PixelBuffer::new(PixelMode::Float64, 7, 7).unwrap();
        input.set_sample_at(3, 3, 1.0);

        let kernel = ConvolutionKernel::new(
            3,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap();
        let output = convolve(&input, &kernel).unwrap();

        // The impulse reproduces the kernel weights around its position.
        for ky in 0..3 {
            for kx in 0..3 {
                let x = 3 + kx - 1;
                let y = 3 + ky - 1;
                assert_eq!(output.sample_at(x, y), kernel.weight(kx, ky));
            }
        }
    }

    #[test]
    fn test_convolution_zero_fills_border() {
        let mut input = PixelBuffer::new(PixelMode::Float64, 5, 5).unwrap();
        for index in 0..input.sample_count() {
            input.set_sample(index, 1.0);
        }

        let kernel = ConvolutionKernel::new(3, vec![1.0 / 9.0; 9]).unwrap();
        let output = convolve(&input, &kernel).unwrap();

        for y in 0..5 {
            for x in 0..5 {
                let expected = if (1..4).contains(&x) && (1..4).contains(&y) {
                    1.0
                } else {
                    0.0
                };
                assert!((output.sample_at(x, y) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_convolution_rejects_multi_channel() {
        let input = PixelBuffer::new(PixelMode::Rgb8, 8, 8).unwrap();
        let kernel = ConvolutionKernel::new(3, vec![0.0; 9]).unwrap();
        assert!(matches!(
            convolve(&input, &kernel),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_retinex_output_in_unit_range() {
        let input = gradient_frame(PixelMode::Float64, 48, 48, 0.7);
        let output = retinex_filter(&input, &RetinexParams::default()).unwrap();

        assert_eq!(output.mode(), PixelMode::Float64);
        assert_eq!(output.width(), 48);
        assert_eq!(output.height(), 48);
        for index in 0..output.sample_count() {
            let value = output.sample(index);
            assert!((0.0..=1.0).contains(&value));
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_retinex_multi_scale_combination() {
        let input = gradient_frame(PixelMode::Gray16, 40, 40, 33.0);
        let params = RetinexParams {
            scales: vec![
                SurroundScale {
                    radius: 3,
                    sigma: 1.5,
                },
                SurroundScale {
                    radius: 7,
                    sigma: 3.0,
                },
            ],
        };
        let output = retinex_filter(&input, &params).unwrap();
        for index in 0..output.sample_count() {
            assert!((0.0..=1.0).contains(&output.sample(index)));
        }
    }

    #[test]
    fn test_retinex_rejects_empty_scales() {
        let input = PixelBuffer::new(PixelMode::Float64, 8, 8).unwrap();
        let params = RetinexParams { scales: Vec::new() };
        assert!(matches!(
            retinex_filter(&input, &params),
            Err(PipelineError::InvalidParameter(_))
        ));
    }
}
