//! Band interleaved grids (BIL, BIP, BSQ) described by a `.hdr` sibling.

use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use tracing::{debug, instrument};

use super::{
    hdr::{GridHeader, Layout},
    GridSize, SampleBuffer,
};
use crate::{cancel::ReadContext, Error, Result};

const CANCEL_STRIDE: usize = 30;

/// Grid size from the `.hdr` sibling at `header_path`
///
/// # Errors
///
/// See [`GridHeader::from_path`].
pub fn read_size(header_path: &Path) -> Result<GridSize> {
    let header = GridHeader::from_path(header_path)?;
    check_header(&header)?;
    Ok(header.size())
}

fn check_header(header: &GridHeader) -> Result<u64> {
    if header.layout == Layout::EsriBinary {
        return Err(Error::FormatMismatch("BIL grid"));
    }
    match header.bits_per_sample {
        8 => Ok(1),
        16 => Ok(2),
        n => Err(Error::Unsupported(format!("{n}-bit BIL samples"))),
    }
}

/// Decodes the first band of a BIL, BIP or BSQ grid.
///
/// 8 bit samples are unsigned, 16 bit samples are signed in the declared
/// byte order. Samples equal to the header's no-data value are left empty.
///
/// # Errors
///
/// [`Error::Unsupported`] for 1, 4 and 32 bit samples, [`Error::Truncated`]
/// when a row is missing, [`Error::Cancelled`].
#[allow(clippy::float_cmp)]
#[instrument(skip(reader, ctx), level = "debug")]
pub fn read_grid<R: Read + Seek>(
    reader: &mut R,
    header: &GridHeader,
    ctx: &ReadContext,
) -> Result<SampleBuffer> {
    let sample_bytes = check_header(header)?;
    let decimation = ctx.decimation();
    let size = header.size();
    let dist = size.sample_dist(&decimation) as usize;
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;

    let pixel_stride = match header.layout {
        Layout::Bip => u64::from(header.bands) * sample_bytes,
        _ => sample_bytes,
    };
    let overflow = || Error::FormatMismatch("BIL header");
    let row_pitch = match header.layout {
        Layout::Bsq => header.band_row_bytes,
        _ => header.total_row_bytes,
    };
    let row_len = (u64::from(header.cols) - 1)
        .checked_mul(pixel_stride)
        .and_then(|n| n.checked_add(sample_bytes))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(overflow)?;
    let mut row = vec![0u8; row_len];
    let pixel_stride = usize::try_from(pixel_stride).map_err(|_| Error::Truncated)?;
    debug!("reading {size:?} grid, sample distance {dist}");

    for (out_row, src_row) in (0..u64::from(header.rows)).step_by(dist).enumerate() {
        ctx.checkpoint(out_row, CANCEL_STRIDE)?;
        let start = src_row
            .checked_mul(row_pitch)
            .and_then(|n| n.checked_add(header.skip_bytes))
            .ok_or_else(overflow)?;
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut row)?;
        for (out_col, at) in (0..row.len()).step_by(pixel_stride * dist).enumerate() {
            let value = if sample_bytes == 1 {
                f32::from(row[at])
            } else {
                f32::from(header.byte_order.i16([row[at], row[at + 1]]))
            };
            if value != header.no_data {
                grid.set(out_row * out_width + out_col, value);
            }
        }
    }
    Ok(grid)
}
