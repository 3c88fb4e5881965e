//! # libgislook
//!
//! This library decodes geographic raster and vector files into small previews: an 8-bit
//! grayscale image for grids, or a sketch of drawing calls for vector data.
//!
//! It aims to be a fast, low-memory reader for the common interchange formats, not a GIS
//! toolkit. Large grids are decimated while they are read, so no reader ever allocates more
//! than the preview needs.
//!
//! ### Supported formats
//!
//! Rasters, in the order they are probed:
//! - Portable graymap (`P2`/`P5`), only when the content type says so
//! - SRTM HGT tiles (SRTM30, 3 and 1 arc second)
//! - Golden Software Surfer grids (ASCII, Surfer 6 and Surfer 7 binary)
//! - ESRI ASCII grids
//! - Arc/Info E00 grid exports
//! - USGS DEM
//! - ESRI binary float grids (`.flt` next to a `.hdr`)
//! - BIL, BIP and BSQ grids (next to a `.hdr`)
//!
//! Vectors are selected by content type:
//! - ESRI shapefiles
//! - Arc/Info E00 exports (`ARC` and `LAB` sections)
//! - Arc/Info binary coverages, through a caller supplied [`vector::e00::LineSource`]
//!
//! ### Limitations
//!
//! Only the first band of multi-band grids is read. Compressed E00 exports are reported as
//! unsupported, as are 1, 4 and 32 bit BIL samples and 16 bit binary graymaps.
//!
//! ### Usage
//!
//! #### Decoding a grid
//!
//! [`decode_raster`] sniffs the format and returns the brightened preview.
//!
//! ```rust
//! use libgislook::{decode_raster, raster::RasterFormat, DecodeOptions, Never};
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = std::env::temp_dir().join("libgislook_doc_grid.asc");
//!     std::fs::write(
//!         &path,
//!         "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1 2\n3 -9999\n",
//!     )?;
//!
//!     let preview = decode_raster(&path, &DecodeOptions::default(), &Never)?;
//!     assert_eq!(preview.format, RasterFormat::EsriAscii);
//!     assert_eq!(preview.image.dimensions(), (2, 2));
//!     // cells without data are white
//!     assert_eq!(preview.image.get_pixel(1, 1).0, [255]);
//! #    std::fs::remove_file(&path)?;
//!     Ok(())
//! }
//! ```
//!
//! #### Sketching vector data
//!
//! Vector readers do not rasterize. They report an extent, and replay geometry against a
//! [`vector::DrawSurface`]. [`vector::Viewport`] turns the extent into a scale, and
//! [`vector::Sketch`] records the calls.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use libgislook::{
//!     read_vector, vector_extent,
//!     vector::{Sketch, Viewport},
//!     CancelFlag, ContentType,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = Path::new("roads.shp");
//!     let cancel = CancelFlag::new();
//!     let viewport = Viewport::fit(vector_extent(path, ContentType::Shape, &cancel)?)?;
//!
//!     let mut sketch = Sketch::new();
//!     read_vector(path, ContentType::Shape, viewport.scale(), &mut sketch, &cancel)?;
//!     println!("{} drawing calls", sketch.commands().len());
//!     Ok(())
//! }
//! ```
//!
//! #### Cancellation
//!
//! Every streaming loop polls a [`Cancel`] source. Raise a shared [`CancelFlag`] from another
//! thread to abort a read; it then fails with [`Error::Cancelled`].
//!

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

mod cancel;
mod dispatch;
mod error;
/// Helpers for sibling files
pub mod path;
pub mod raster;
pub mod sampling;
pub mod vector;

pub use cancel::{Cancel, CancelFlag, Never, ReadContext};
pub use dispatch::{
    decode_raster, raster_size, read_vector, vector_extent, ContentType, DecodeOptions, Preview,
};
pub use error::{Error, Result};
pub use sampling::{ByteOrder, Decimation};
