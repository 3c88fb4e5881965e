//! SRTM `.hgt` tiles. There is no header; the tile kind follows from the
//! file size alone.

use std::io::{Read, Seek, SeekFrom};

use strum::{Display, IntoStaticStr};
use tracing::{debug, instrument};

use super::{GridSize, SampleBuffer};
use crate::{cancel::ReadContext, sampling::ByteOrder, Error, Result};

const CANCEL_STRIDE: usize = 30;
const VOID: i16 = -32768;
const NO_DATA: i16 = -9999;

/// Known SRTM tile layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum SrtmKind {
    /// SRTM30 tile, 4800 x 6000 samples
    #[strum(serialize = "SRTM30")]
    Srtm30,
    /// 3 arc-second tile, 1201 x 1201 samples
    #[strum(serialize = "SRTM3")]
    ThreeArcSecond,
    /// 1 arc-second tile, 3601 x 3601 samples
    #[strum(serialize = "SRTM1")]
    OneArcSecond,
}

impl SrtmKind {
    /// Classifies a file of `len` bytes
    #[must_use]
    pub fn from_len(len: u64) -> Option<Self> {
        [Self::Srtm30, Self::ThreeArcSecond, Self::OneArcSecond]
            .into_iter()
            .find(|kind| kind.byte_len() == len)
    }

    /// Samples per row and rows
    #[must_use]
    pub const fn size(self) -> GridSize {
        match self {
            Self::Srtm30 => GridSize::new(4800, 6000),
            Self::ThreeArcSecond => GridSize::new(1201, 1201),
            Self::OneArcSecond => GridSize::new(3601, 3601),
        }
    }

    /// Exact file length of the tile
    #[must_use]
    pub const fn byte_len(self) -> u64 {
        let size = self.size();
        size.width as u64 * size.height as u64 * 2
    }
}

/// Grid size of a tile of `len` bytes
///
/// # Errors
///
/// [`Error::FormatMismatch`] for any other length.
pub fn read_size(len: u64) -> Result<GridSize> {
    SrtmKind::from_len(len)
        .map(SrtmKind::size)
        .ok_or(Error::FormatMismatch("SRTM tile"))
}

/// Decodes big-endian 16 bit heights; `-32768` and `-9999` are voids.
///
/// # Errors
///
/// [`Error::FormatMismatch`] for unknown lengths, [`Error::Truncated`],
/// [`Error::Cancelled`].
#[instrument(skip(reader, ctx), level = "debug")]
pub fn read_grid<R: Read + Seek>(reader: &mut R, len: u64, ctx: &ReadContext) -> Result<SampleBuffer> {
    let size = read_size(len)?;
    let decimation = ctx.decimation();
    let dist = size.sample_dist(&decimation) as usize;
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;
    let row_bytes = u64::from(size.width) * 2;
    let mut row = vec![0u8; size.width as usize * 2];
    debug!("reading {size:?} SRTM tile, sample distance {dist}");

    for (out_row, src_row) in (0..u64::from(size.height)).step_by(dist).enumerate() {
        ctx.checkpoint(out_row, CANCEL_STRIDE)?;
        reader.seek(SeekFrom::Start(src_row * row_bytes))?;
        reader.read_exact(&mut row)?;
        for (out_col, sample) in row.chunks_exact(2).step_by(dist).enumerate() {
            let height = ByteOrder::Big.i16([sample[0], sample[1]]);
            if height != VOID && height != NO_DATA {
                grid.set(out_row * out_width + out_col, f32::from(height));
            }
        }
    }
    Ok(grid)
}
