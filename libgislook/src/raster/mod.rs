//! Raster grid readers.
//!
//! Every reader comes as a header-only size query and a payload reader that
//! fills a [`SampleBuffer`] at the resolution picked by the
//! [`Decimation`](crate::sampling::Decimation) carried in the
//! [`ReadContext`](crate::cancel::ReadContext).

use strum::{Display, IntoStaticStr};

use crate::sampling::Decimation;

pub mod bil;
pub mod e00_grid;
pub mod esri_ascii;
pub mod esri_binary;
pub mod hdr;
pub mod normalize;
pub mod pgm;
pub mod srtm;
pub mod surfer;
pub mod text;
pub mod usgs_dem;

pub use normalize::{create_grayscale_image, GrayscaleBuffer, SampleBuffer};

/// Source dimensions of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    /// columns
    pub width: u32,
    /// rows
    pub height: u32,
}

impl GridSize {
    /// Creates a size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions after decimation
    #[must_use]
    pub const fn resampled(&self, decimation: &Decimation) -> (u32, u32) {
        decimation.resampled(self.width, self.height)
    }

    /// Sampling stride under `decimation`
    #[must_use]
    pub const fn sample_dist(&self, decimation: &Decimation) -> u32 {
        decimation.sample_dist(self.width, self.height)
    }

    /// An empty buffer at the resampled size
    #[must_use]
    pub fn buffer(&self, decimation: &Decimation) -> SampleBuffer {
        let (w, h) = self.resampled(decimation);
        SampleBuffer::new(w, h)
    }
}

/// Raster formats, in the order the dispatcher probes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum RasterFormat {
    /// Portable graymap
    #[strum(serialize = "PGM")]
    Pgm,
    /// Shuttle Radar Topography Mission height tile
    #[strum(serialize = "SRTM")]
    Srtm,
    /// Golden Software Surfer grid
    #[strum(serialize = "Surfer grid")]
    Surfer,
    /// ESRI ASCII grid
    #[strum(serialize = "ESRI ASCII grid")]
    EsriAscii,
    /// Arc/Info E00 grid export
    #[strum(serialize = "E00 grid")]
    E00Grid,
    /// USGS digital elevation model
    #[strum(serialize = "USGS DEM")]
    UsgsDem,
    /// ESRI binary float grid with a `.hdr` sibling
    #[strum(serialize = "ESRI binary grid")]
    EsriBinary,
    /// Band interleaved grid with a `.hdr` sibling
    #[strum(serialize = "BIL grid")]
    Bil,
}
