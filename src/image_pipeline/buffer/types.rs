//! Pixel buffer types
//!
//! The common in-memory image representation shared by every pipeline stage.
//! All sample access goes through [`PixelBuffer::sample`] / [`PixelBuffer::set_sample`],
//! which convert to and from `f64` in one place regardless of the physical
//! storage width.

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Pixel representation of a buffer.
///
/// The `Gray10`/`Gray12`/`Gray14` modes are stored in 16-bit words but keep
/// their nominal sensor range, the way a camera delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    Gray8,
    Gray10,
    Gray12,
    Gray14,
    Gray16,
    Gray24,
    Gray32,
    Float32,
    Float64,
    Rgb8,
    Rgba8,
}

impl PixelMode {
    /// Nominal bits per sample (storage may be wider).
    pub fn bits_per_sample(&self) -> u32 {
        match self {
            PixelMode::Gray8 | PixelMode::Rgb8 | PixelMode::Rgba8 => 8,
            PixelMode::Gray10 => 10,
            PixelMode::Gray12 => 12,
            PixelMode::Gray14 => 14,
            PixelMode::Gray16 => 16,
            PixelMode::Gray24 => 24,
            PixelMode::Gray32 | PixelMode::Float32 => 32,
            PixelMode::Float64 => 64,
        }
    }

    /// Bytes occupied by one sample in storage.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelMode::Gray8 | PixelMode::Rgb8 | PixelMode::Rgba8 => 1,
            PixelMode::Gray10 | PixelMode::Gray12 | PixelMode::Gray14 | PixelMode::Gray16 => 2,
            PixelMode::Gray24 | PixelMode::Gray32 | PixelMode::Float32 => 4,
            PixelMode::Float64 => 8,
        }
    }

    /// Samples per pixel.
    pub fn channel_count(&self) -> usize {
        match self {
            PixelMode::Rgb8 => 3,
            PixelMode::Rgba8 => 4,
            _ => 1,
        }
    }

    pub fn is_single_channel(&self) -> bool {
        self.channel_count() == 1
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PixelMode::Float32 | PixelMode::Float64)
    }

    /// Nominal full-scale sample value: `2^bits - 1` for the unsigned modes,
    /// `1.0` for the floating-point modes.
    pub fn max_value(&self) -> f64 {
        if self.is_float() {
            1.0
        } else {
            (1u64 << self.bits_per_sample()) as f64 - 1.0
        }
    }
}

/// Physical sample storage, one variant per sample width.
///
/// This is the single place that maps a [`PixelMode`] to its backing vector;
/// every component reads and writes samples as `f64` through it instead of
/// switching on the mode.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStorage {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleStorage {
    /// Allocates zero-filled storage for `count` samples of `mode`.
    ///
    /// Allocation failure is reported as [`PipelineError::OutOfMemory`]
    /// instead of aborting.
    pub fn zeroed(mode: PixelMode, count: usize) -> Result<Self> {
        fn alloc<T: Clone + Default>(count: usize) -> Result<Vec<T>> {
            let mut data = Vec::new();
            data.try_reserve_exact(count).map_err(|_| {
                PipelineError::OutOfMemory(format!("failed to allocate {count} samples"))
            })?;
            data.resize(count, T::default());
            Ok(data)
        }

        Ok(match mode {
            PixelMode::Gray8 | PixelMode::Rgb8 | PixelMode::Rgba8 => {
                SampleStorage::U8(alloc(count)?)
            }
            PixelMode::Gray10 | PixelMode::Gray12 | PixelMode::Gray14 | PixelMode::Gray16 => {
                SampleStorage::U16(alloc(count)?)
            }
            PixelMode::Gray24 | PixelMode::Gray32 => SampleStorage::U32(alloc(count)?),
            PixelMode::Float32 => SampleStorage::F32(alloc(count)?),
            PixelMode::Float64 => SampleStorage::F64(alloc(count)?),
        })
    }

    /// True when this storage variant is the one `mode` allocates.
    pub fn matches_mode(&self, mode: PixelMode) -> bool {
        matches!(
            (self, mode),
            (
                SampleStorage::U8(_),
                PixelMode::Gray8 | PixelMode::Rgb8 | PixelMode::Rgba8
            ) | (
                SampleStorage::U16(_),
                PixelMode::Gray10 | PixelMode::Gray12 | PixelMode::Gray14 | PixelMode::Gray16
            ) | (SampleStorage::U32(_), PixelMode::Gray24 | PixelMode::Gray32)
                | (SampleStorage::F32(_), PixelMode::Float32)
                | (SampleStorage::F64(_), PixelMode::Float64)
        )
    }

    pub fn len(&self) -> usize {
        match self {
            SampleStorage::U8(d) => d.len(),
            SampleStorage::U16(d) => d.len(),
            SampleStorage::U32(d) => d.len(),
            SampleStorage::F32(d) => d.len(),
            SampleStorage::F64(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounds-checked read of sample `index` as `f64`.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            SampleStorage::U8(d) => d[index] as f64,
            SampleStorage::U16(d) => d[index] as f64,
            SampleStorage::U32(d) => d[index] as f64,
            SampleStorage::F32(d) => d[index] as f64,
            SampleStorage::F64(d) => d[index],
        }
    }

    /// Bounds-checked write of sample `index`; integer variants round and
    /// clamp to the storage type's range.
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            SampleStorage::U8(d) => d[index] = value.round().clamp(0.0, u8::MAX as f64) as u8,
            SampleStorage::U16(d) => d[index] = value.round().clamp(0.0, u16::MAX as f64) as u16,
            SampleStorage::U32(d) => d[index] = value.round().clamp(0.0, u32::MAX as f64) as u32,
            SampleStorage::F32(d) => d[index] = value as f32,
            SampleStorage::F64(d) => d[index] = value,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            SampleStorage::U8(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            SampleStorage::U16(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            SampleStorage::U32(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            SampleStorage::F32(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            SampleStorage::F64(d) => Some(d),
            _ => None,
        }
    }
}

/// A single exclusively-owned image buffer.
///
/// Invariant: `data.len() == width * height * mode.channel_count()`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    mode: PixelMode,
    width: usize,
    height: usize,
    data: SampleStorage,
}

impl PixelBuffer {
    /// Allocates a zero-filled buffer.
    pub fn new(mode: PixelMode, width: usize, height: usize) -> Result<Self> {
        let count = sample_count_checked(mode, width, height)?;
        Ok(Self {
            mode,
            width,
            height,
            data: SampleStorage::zeroed(mode, count)?,
        })
    }

    /// Wraps existing storage, validating variant and length against the
    /// buffer invariant.
    pub fn from_samples(
        mode: PixelMode,
        width: usize,
        height: usize,
        data: SampleStorage,
    ) -> Result<Self> {
        if !data.matches_mode(mode) {
            return Err(PipelineError::InvalidParameter(format!(
                "sample storage does not match pixel mode {mode:?}"
            )));
        }
        let count = sample_count_checked(mode, width, height)?;
        if data.len() < count {
            return Err(PipelineError::InvalidParameter(format!(
                "sample storage too small: {} < {}",
                data.len(),
                count
            )));
        }
        Ok(Self {
            mode,
            width,
            height,
            data,
        })
    }

    /// Returns a definitely-valid, definitely-owned buffer of the requested
    /// shape. The existing allocation is reused only on an exact mode and
    /// dimension match; otherwise it is dropped and a fresh zero-filled
    /// buffer is allocated. Callers must not assume identity is preserved.
    pub fn ensure(
        existing: Option<PixelBuffer>,
        mode: PixelMode,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer> {
        match existing {
            Some(buffer)
                if buffer.mode == mode && buffer.width == width && buffer.height == height =>
            {
                Ok(buffer)
            }
            _ => PixelBuffer::new(mode, width, height),
        }
    }

    pub fn mode(&self) -> PixelMode {
        self.mode
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &SampleStorage {
        &self.data
    }

    pub fn into_data(self) -> SampleStorage {
        self.data
    }

    /// Reads sample `index` (row-major) as `f64`.
    pub fn sample(&self, index: usize) -> f64 {
        self.data.get(index)
    }

    /// Writes sample `index`, clamping integer modes to their nominal range
    /// (a `Gray12` sample never exceeds 4095 even though it sits in a u16).
    pub fn set_sample(&mut self, index: usize, value: f64) {
        let value = if self.mode.is_float() {
            value
        } else {
            value.clamp(0.0, self.mode.max_value())
        };
        self.data.set(index, value);
    }

    /// Reads the sample at `(x, y)` of a single-channel buffer.
    pub fn sample_at(&self, x: usize, y: usize) -> f64 {
        debug_assert!(x < self.width && y < self.height);
        self.data.get(y * self.width + x)
    }

    pub fn set_sample_at(&mut self, x: usize, y: usize, value: f64) {
        debug_assert!(x < self.width && y < self.height);
        self.set_sample(y * self.width + x, value);
    }

    /// The single enforcement point for operations that only accept
    /// single-channel buffers.
    pub fn require_single_channel(&self, operation: &str) -> Result<()> {
        if self.mode.is_single_channel() {
            Ok(())
        } else {
            Err(PipelineError::UnsupportedFormat(format!(
                "{operation} does not support multi-channel mode {:?}",
                self.mode
            )))
        }
    }
}

fn sample_count_checked(mode: PixelMode, width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(mode.channel_count()))
        .ok_or_else(|| {
            PipelineError::OutOfMemory(format!(
                "buffer dimensions overflow: {width}x{height} {mode:?}"
            ))
        })
}
