//! Conversion of decoded samples into brightened 8 bit grayscale images.

use image::GrayImage;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Gray value reserved for cells without data
pub const NO_DATA_GRAY: u8 = 255;

/// Decoded samples at resampled resolution. No-data cells hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    width: u32,
    height: u32,
    samples: Vec<f32>,
    min: f32,
    max: f32,
    fixed_range: bool,
}

impl SampleBuffer {
    /// A buffer of `width * height` no-data cells whose range is the observed
    /// range of the samples stored later
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            samples: vec![f32::NAN; len],
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            fixed_range: false,
        }
    }

    /// A buffer scaled against a range declared by the file instead of the
    /// observed one
    #[must_use]
    pub fn with_range(width: u32, height: u32, min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            fixed_range: true,
            ..Self::new(width, height)
        }
    }

    /// Resampled width
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Resampled height
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples, `NaN` for no data
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Range used for scaling, `None` when no valid sample was stored
    #[must_use]
    pub fn range(&self) -> Option<(f32, f32)> {
        (self.min <= self.max).then_some((self.min, self.max))
    }

    /// Stores a valid sample at `index`. Non-finite values are kept as no data.
    /// Out of range indices are ignored.
    pub fn set(&mut self, index: usize, value: f32) {
        if !value.is_finite() {
            return;
        }
        let Some(cell) = self.samples.get_mut(index) else {
            trace!("sample index {index} outside of buffer");
            return;
        };
        *cell = value;
        if !self.fixed_range {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    /// Linear rescale of valid samples to `0..=255`. No-data cells become 255;
    /// a flat or empty range yields zeros for every valid cell.
    #[must_use]
    pub fn into_gray(self) -> GrayscaleBuffer {
        let min = f64::from(self.min);
        let diff = f64::from(self.max) - min;
        debug!(
            "scaling {}x{} samples, range {} .. {}",
            self.width, self.height, self.min, self.max
        );
        let pixels = self
            .samples
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    NO_DATA_GRAY
                } else if diff > 0.0 {
                    // float to int casts saturate
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let gray = ((f64::from(v) - min) * 255.0 / diff) as u8;
                    gray
                } else {
                    0
                }
            })
            .collect();
        GrayscaleBuffer {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

/// 8 bit intensities at resampled resolution, 255 meaning no data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GrayscaleBuffer {
    /// Wraps already scaled pixels
    #[must_use]
    pub const fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Row-major pixels before brightening
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Brightens the pixels and moves them into an image
    ///
    /// # Errors
    ///
    /// See [`create_grayscale_image`].
    pub fn into_image(self) -> Result<GrayImage> {
        create_grayscale_image(self.pixels, self.width, self.height)
    }
}

/// Brightening curve `round(sqrt(i / 255) * 255)`
#[must_use]
pub fn brighten(value: u8) -> u8 {
    let v = (f64::from(value) / 255.0).sqrt() * 255.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let out = v.round() as u8;
    out
}

/// Applies the brightening curve to `pixels` and hands them to a [`GrayImage`].
///
/// # Errors
///
/// [`Error::InvalidImage`] when a dimension is zero or the buffer length does
/// not match `width * height`.
pub fn create_grayscale_image(mut pixels: Vec<u8>, width: u32, height: u32) -> Result<GrayImage> {
    let invalid = Error::InvalidImage {
        width,
        height,
        len: pixels.len(),
    };
    if width == 0 || height == 0 || pixels.len() != width as usize * height as usize {
        return Err(invalid);
    }
    let lut: [u8; 256] = std::array::from_fn(|i| brighten(u8::try_from(i).unwrap_or(u8::MAX)));
    for p in &mut pixels {
        *p = lut[usize::from(*p)];
    }
    GrayImage::from_raw(width, height, pixels).ok_or(invalid)
}
