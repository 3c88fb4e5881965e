//! Format detection and the top level decode entry points.
//!
//! Raster files are sniffed by trying every reader in a fixed order; vector
//! files are routed by their [`ContentType`].

use std::{
    fs::File,
    io::{BufReader, Seek},
    path::{Path, PathBuf},
};

use bon::Builder;
use image::GrayImage;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info, instrument};

use crate::{
    cancel::{Cancel, ReadContext},
    path::change_extension,
    raster::{
        bil, e00_grid, esri_ascii,
        esri_binary::{self, EsriBinaryHeader},
        hdr::GridHeader,
        pgm, srtm, surfer, usgs_dem, GridSize, RasterFormat, SampleBuffer,
    },
    sampling::{Decimation, DEFAULT_MAX_GRID_SIZE},
    vector::{
        e00::{self, E00Lines},
        shape, DrawSurface, VectorExtent,
    },
    Error, Result,
};

/// Uniform type identifiers of the formats that need a hint to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum ContentType {
    /// portable graymap, only probed when asked for
    #[strum(serialize = "net.sourceforge.netpbm.pgm")]
    Pgm,
    /// ESRI shapefile
    #[strum(serialize = "com.esri.shape")]
    Shape,
    /// Arc/Info E00 export
    #[strum(serialize = "com.esri.e00")]
    E00,
    /// Arc/Info binary coverage
    #[strum(serialize = "com.esri.coverage")]
    Coverage,
}

impl ContentType {
    /// Guesses the content type from the file extension
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pgm" => Some(Self::Pgm),
            "shp" => Some(Self::Shape),
            "e00" => Some(Self::E00),
            _ => None,
        }
    }

    /// Whether the content is drawn as a vector sketch
    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(self, Self::Shape | Self::E00 | Self::Coverage)
    }
}

/// Options of a single decode
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// content type hint, guessed from the extension when absent
    content_type: Option<ContentType>,
    /// bound on either dimension of decoded grids
    #[builder(default = DEFAULT_MAX_GRID_SIZE)]
    max_grid_size: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DecodeOptions {
    /// The content type hint
    #[must_use]
    pub const fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// The bound on either grid dimension
    #[must_use]
    pub const fn max_grid_size(&self) -> u32 {
        self.max_grid_size
    }

    /// Decimation policy for the grid bound
    #[must_use]
    pub const fn decimation(&self) -> Decimation {
        Decimation::new(self.max_grid_size)
    }

    /// The hint, or the type implied by `path`
    #[must_use]
    pub fn content_type_for(&self, path: &Path) -> Option<ContentType> {
        self.content_type.or_else(|| ContentType::from_extension(path))
    }
}

/// A decoded raster preview
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// the format that accepted the file
    pub format: RasterFormat,
    /// brightened grayscale image
    pub image: GrayImage,
}

/// Open raster file shared by the probes
struct Source {
    path: PathBuf,
    reader: BufReader<File>,
    len: u64,
}

impl Source {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            len,
        })
    }

    /// The `.hdr` sibling. A missing sibling means the probed format does not
    /// apply.
    fn header_path(&self, format: &'static str) -> Result<PathBuf> {
        match change_extension(&self.path, "hdr") {
            Ok(path) if path.is_file() => Ok(path),
            Ok(_) | Err(Error::NoExtension(_)) => Err(Error::FormatMismatch(format)),
            Err(e) => Err(e),
        }
    }
}

struct RasterProbe {
    format: RasterFormat,
    applies: fn(Option<ContentType>) -> bool,
    size: fn(&mut Source) -> Result<GridSize>,
    read: fn(&mut Source, &ReadContext) -> Result<SampleBuffer>,
}

/// Readers in probing order. Unambiguous binary formats come first, formats
/// with a `.hdr` sibling last so that e.g. `grid.pgm` next to `grid.hdr` is
/// not taken for a binary grid.
fn probes() -> [RasterProbe; 8] {
    [
        RasterProbe {
            format: RasterFormat::Pgm,
            applies: |t| t == Some(ContentType::Pgm),
            size: |s| pgm::read_size(&mut s.reader),
            read: |s, ctx| pgm::read_grid(&mut s.reader, ctx),
        },
        RasterProbe {
            format: RasterFormat::Srtm,
            applies: |_| true,
            size: |s| srtm::read_size(s.len),
            read: |s, ctx| srtm::read_grid(&mut s.reader, s.len, ctx),
        },
        RasterProbe {
            format: RasterFormat::Surfer,
            applies: |_| true,
            size: |s| surfer::read_size(&mut s.reader, s.len),
            read: |s, ctx| surfer::read_grid(&mut s.reader, s.len, ctx),
        },
        RasterProbe {
            format: RasterFormat::EsriAscii,
            applies: |_| true,
            size: |s| esri_ascii::read_size(&mut s.reader),
            read: |s, ctx| esri_ascii::read_grid(&mut s.reader, ctx),
        },
        RasterProbe {
            format: RasterFormat::E00Grid,
            applies: |_| true,
            size: |s| e00_grid::read_size(&mut E00Lines::new(&mut s.reader)?),
            read: |s, ctx| e00_grid::read_grid(&mut E00Lines::new(&mut s.reader)?, ctx),
        },
        RasterProbe {
            format: RasterFormat::UsgsDem,
            applies: |_| true,
            size: |s| usgs_dem::read_size(&mut s.reader),
            read: |s, ctx| usgs_dem::read_grid(&mut s.reader, ctx),
        },
        RasterProbe {
            format: RasterFormat::EsriBinary,
            applies: |_| true,
            size: |s| esri_binary::read_size(&s.header_path("ESRI binary grid")?),
            read: |s, ctx| {
                let header = EsriBinaryHeader::from_path(&s.header_path("ESRI binary grid")?)?;
                esri_binary::read_grid(&mut s.reader, s.len, &header, ctx)
            },
        },
        RasterProbe {
            format: RasterFormat::Bil,
            applies: |_| true,
            size: |s| bil::read_size(&s.header_path("BIL grid")?),
            read: |s, ctx| {
                let header = GridHeader::from_path(&s.header_path("BIL grid")?)?;
                bil::read_grid(&mut s.reader, &header, ctx)
            },
        },
    ]
}

/// Runs `attempt` for every applicable probe until one succeeds.
///
/// Every failure except cancellation moves on to the next probe. When all
/// fail, the first failure that was not a plain mismatch is reported.
fn run_probes<T, F>(source: &mut Source, content_type: Option<ContentType>, mut attempt: F) -> Result<(RasterFormat, T)>
where
    F: FnMut(&RasterProbe, &mut Source) -> Result<T>,
{
    let mut first_error = None;
    for probe in &probes() {
        if !(probe.applies)(content_type) {
            continue;
        }
        source.reader.rewind()?;
        match attempt(probe, source) {
            Ok(value) => return Ok((probe.format, value)),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                debug!("{} probe failed: {e}", probe.format);
                if !e.is_mismatch() && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    Err(first_error.unwrap_or(Error::UnknownFormat))
}

/// Detects the raster format of `path` and reports its source grid size
/// without reading the payload.
///
/// # Errors
///
/// [`Error::UnknownFormat`] when no reader accepts the file, otherwise the
/// first error of a reader that recognised the file.
#[instrument(skip(options))]
pub fn raster_size(path: &Path, options: &DecodeOptions) -> Result<(RasterFormat, GridSize)> {
    let mut source = Source::open(path)?;
    let (format, size) = run_probes(&mut source, options.content_type_for(path), |probe, s| (probe.size)(s))?;
    debug!("{format} of {size:?}");
    Ok((format, size))
}

/// Detects the raster format of `path` and decodes it into a brightened
/// grayscale image.
///
/// # Errors
///
/// [`Error::Cancelled`] as soon as `cancel` fires, [`Error::UnknownFormat`]
/// when no reader accepts the file, otherwise the first error of a reader
/// that recognised the file.
#[instrument(skip(options, cancel))]
pub fn decode_raster(path: &Path, options: &DecodeOptions, cancel: &dyn Cancel) -> Result<Preview> {
    let mut source = Source::open(path)?;
    let ctx = ReadContext::new(cancel, options.decimation());
    let (format, samples) = run_probes(&mut source, options.content_type_for(path), |probe, s| {
        (probe.read)(s, &ctx)
    })?;
    let image = samples.into_gray().into_image()?;
    info!("decoded {format} as {}x{} preview", image.width(), image.height());
    Ok(Preview { format, image })
}

/// Bounding box of a vector file
///
/// # Errors
///
/// [`Error::Unsupported`] for coverages, which need a caller supplied line
/// source, and the errors of the format readers.
#[instrument(skip(cancel))]
pub fn vector_extent(path: &Path, content_type: ContentType, cancel: &dyn Cancel) -> Result<VectorExtent> {
    match content_type {
        ContentType::Shape => shape::read_shape_extent(path, cancel),
        ContentType::E00 => e00::read_e00_extent(path, cancel),
        ContentType::Coverage => Err(Error::Unsupported("coverage without a line source".into())),
        ContentType::Pgm => Err(Error::FormatMismatch("vector file")),
    }
}

/// Draws a vector file onto `surface`; `scale` is canvas units per source
/// unit.
///
/// # Errors
///
/// As [`vector_extent`], plus [`Error::Cancelled`].
#[instrument(skip(surface, cancel))]
pub fn read_vector<S: DrawSurface + ?Sized>(
    path: &Path,
    content_type: ContentType,
    scale: f64,
    surface: &mut S,
    cancel: &dyn Cancel,
) -> Result<()> {
    match content_type {
        ContentType::Shape => shape::read_shape(path, scale, surface, cancel),
        ContentType::E00 => e00::read_e00(path, scale, surface, cancel),
        ContentType::Coverage => Err(Error::Unsupported("coverage without a line source".into())),
        ContentType::Pgm => Err(Error::FormatMismatch("vector file")),
    }?;
    info!("drew {content_type} sketch");
    Ok(())
}
