//! Golden Software Surfer grids: ASCII (`DSAA`), Surfer 6 binary (`DSBB`)
//! and Surfer 7 tagged binary (`DSRB`).
//!
//! Rows are stored south to north, so every reader flips them: the first
//! stored row becomes the bottom image row. Values are scaled against the
//! z-range declared in the header rather than the observed range.

use std::io::{BufRead, Read, Seek, SeekFrom};

use strum::{Display, IntoStaticStr};
use tracing::{debug, instrument, trace};

use super::{
    text::{ScanPattern, Tokens},
    GridSize, SampleBuffer,
};
use crate::{cancel::ReadContext, sampling::ByteOrder, Error, Result};

const CANCEL_STRIDE: usize = 10;
const MISMATCH: Error = Error::FormatMismatch("Surfer grid");
const GRID_SECTION_LEN: u64 = 72;

/// Surfer grid flavours, keyed by their four byte magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum SurferKind {
    /// `DSAA`
    Ascii,
    /// `DSBB`
    Binary6,
    /// `DSRB`
    Binary7,
}

impl SurferKind {
    fn from_magic(magic: [u8; 4]) -> Option<Self> {
        match &magic {
            b"DSAA" => Some(Self::Ascii),
            b"DSBB" => Some(Self::Binary6),
            b"DSRB" => Some(Self::Binary7),
            _ => None,
        }
    }
}

/// Parsed Surfer header; the reader is left at the first grid value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurferHeader {
    /// grid flavour
    pub kind: SurferKind,
    /// number of columns
    pub cols: u32,
    /// number of rows
    pub rows: u32,
    /// lowest value of the grid
    pub z_min: f64,
    /// highest value of the grid
    pub z_max: f64,
    /// Surfer 7 blank value, samples at or above it are empty
    pub blank: Option<f64>,
    /// byte offset of the first value of a binary grid
    pub data_offset: u64,
}

impl SurferHeader {
    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.cols, self.rows)
    }

    fn is_blank(&self, z: f64) -> bool {
        match self.blank {
            Some(blank) => z >= blank,
            None => z > self.z_max || z < self.z_min,
        }
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    Ok(ByteOrder::Little.f64(read_array(reader)?))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    Ok(ByteOrder::Little.i32(read_array(reader)?))
}

fn dimension<T: TryInto<u32>>(value: T) -> Result<u32> {
    value
        .try_into()
        .ok()
        .filter(|&n| n > 0)
        .ok_or(MISMATCH)
}

/// Reads the header of a Surfer grid of `len` bytes.
///
/// # Errors
///
/// [`Error::FormatMismatch`] for unknown magic or invalid sizes,
/// [`Error::Truncated`] when a Surfer 7 section or the binary payload reaches
/// past the end of the file.
pub fn read_header<R: BufRead + Seek>(reader: &mut R, len: u64) -> Result<SurferHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let magic = read_array(reader).map_err(|_| MISMATCH)?;
    let kind = SurferKind::from_magic(magic).ok_or(MISMATCH)?;
    let header = match kind {
        SurferKind::Ascii => read_ascii_header(reader)?,
        SurferKind::Binary6 => read_binary6_header(reader)?,
        SurferKind::Binary7 => read_binary7_header(reader, len)?,
    };
    if header.kind != SurferKind::Ascii {
        let sample_bytes = if header.kind == SurferKind::Binary6 { 4 } else { 8 };
        let end = u64::from(header.cols)
            .checked_mul(u64::from(header.rows))
            .and_then(|cells| cells.checked_mul(sample_bytes))
            .and_then(|payload| payload.checked_add(header.data_offset));
        if end.map_or(true, |end| end > len) {
            return Err(Error::Truncated);
        }
    }
    debug!("parsed Surfer header {header:?}");
    Ok(header)
}

fn read_ascii_header<R: BufRead>(reader: &mut R) -> Result<SurferHeader> {
    let mut tokens = Tokens::new(reader);
    let cols = dimension(tokens.value::<i64>()?)?;
    let rows = dimension(tokens.value::<i64>()?)?;
    // x and y ranges
    tokens.skip(4)?;
    let z_min = tokens.value()?;
    let z_max = tokens.value()?;
    Ok(SurferHeader {
        kind: SurferKind::Ascii,
        cols,
        rows,
        z_min,
        z_max,
        blank: None,
        data_offset: 0,
    })
}

fn read_binary6_header<R: Read>(reader: &mut R) -> Result<SurferHeader> {
    let cols = dimension(ByteOrder::Little.i16(read_array(reader)?))?;
    let rows = dimension(ByteOrder::Little.i16(read_array(reader)?))?;
    // x and y ranges
    for _ in 0..4 {
        read_f64(reader)?;
    }
    Ok(SurferHeader {
        kind: SurferKind::Binary6,
        cols,
        rows,
        z_min: read_f64(reader)?,
        z_max: read_f64(reader)?,
        blank: None,
        data_offset: 56,
    })
}

fn read_binary7_header<R: Read + Seek>(reader: &mut R, len: u64) -> Result<SurferHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let mut grid: Option<SurferHeader> = None;
    loop {
        let id: [u8; 4] = read_array(reader)?;
        let size = u64::try_from(read_i32(reader)?).map_err(|_| MISMATCH)?;
        let start = reader.stream_position()?;
        let Some(end) = start.checked_add(size).filter(|&end| end <= len) else {
            debug!("Surfer 7 section {id:?} of {size} bytes reaches past the end");
            return Err(Error::Truncated);
        };
        match &id {
            b"GRID" => {
                if size < GRID_SECTION_LEN {
                    return Err(MISMATCH);
                }
                let rows = dimension(read_i32(reader)?)?;
                let cols = dimension(read_i32(reader)?)?;
                // lower left corner and cell sizes
                for _ in 0..4 {
                    read_f64(reader)?;
                }
                let z_min = read_f64(reader)?;
                let z_max = read_f64(reader)?;
                let _rotation = read_f64(reader)?;
                let blank = read_f64(reader)?;
                grid = Some(SurferHeader {
                    kind: SurferKind::Binary7,
                    cols,
                    rows,
                    z_min,
                    z_max,
                    blank: Some(blank),
                    data_offset: 0,
                });
            }
            b"DATA" => {
                let mut header = grid.ok_or(MISMATCH)?;
                header.data_offset = start;
                return Ok(header);
            }
            _ => trace!("skipping Surfer 7 section {id:?}"),
        }
        reader.seek(SeekFrom::Start(end))?;
    }
}

/// Grid size from the header
///
/// # Errors
///
/// See [`read_header`].
pub fn read_size<R: BufRead + Seek>(reader: &mut R, len: u64) -> Result<GridSize> {
    Ok(read_header(reader, len)?.size())
}

/// Decodes any Surfer grid of `len` bytes.
///
/// # Errors
///
/// Header errors, [`Error::Truncated`], [`Error::Cancelled`].
#[instrument(skip(reader, ctx), level = "debug")]
pub fn read_grid<R: BufRead + Seek>(reader: &mut R, len: u64, ctx: &ReadContext) -> Result<SampleBuffer> {
    let header = read_header(reader, len)?;
    #[allow(clippy::cast_possible_truncation)]
    let mut grid = {
        let (w, h) = header.size().resampled(&ctx.decimation());
        SampleBuffer::with_range(w, h, header.z_min as f32, header.z_max as f32)
    };
    match header.kind {
        SurferKind::Ascii => read_ascii_values(reader, &header, &mut grid, ctx)?,
        SurferKind::Binary6 => read_binary_values(reader, &header, 4, &mut grid, ctx)?,
        SurferKind::Binary7 => read_binary_values(reader, &header, 8, &mut grid, ctx)?,
    }
    Ok(grid)
}

#[allow(clippy::cast_possible_truncation)]
fn store(header: &SurferHeader, grid: &mut SampleBuffer, index: usize, z: f64) {
    if !header.is_blank(z) {
        grid.set(index, z as f32);
    }
}

fn read_ascii_values<R: BufRead>(
    reader: &mut R,
    header: &SurferHeader,
    grid: &mut SampleBuffer,
    ctx: &ReadContext,
) -> Result<()> {
    let dist = header.size().sample_dist(&ctx.decimation());
    let out_width = grid.width() as usize;
    let out_height = grid.height() as usize;
    let pattern = ScanPattern::for_row(header.cols, dist);
    let mut tokens = Tokens::new(reader);
    for row in 0..header.rows {
        ctx.checkpoint(row as usize, CANCEL_STRIDE)?;
        if row % dist != 0 {
            tokens.skip(header.cols)?;
            continue;
        }
        let offset = (out_height - 1 - (row / dist) as usize) * out_width;
        pattern.scan(&mut tokens, |col, z: f64| {
            store(header, grid, offset + col, z);
        })?;
    }
    Ok(())
}

fn read_binary_values<R: Read + Seek>(
    reader: &mut R,
    header: &SurferHeader,
    sample_bytes: usize,
    grid: &mut SampleBuffer,
    ctx: &ReadContext,
) -> Result<()> {
    let dist = header.size().sample_dist(&ctx.decimation()) as usize;
    let out_width = grid.width() as usize;
    let out_height = grid.height() as usize;
    let mut row = vec![0u8; header.cols as usize * sample_bytes];
    let row_bytes = row.len() as u64;

    for (out_row, src_row) in (0..u64::from(header.rows)).step_by(dist).enumerate() {
        ctx.checkpoint(out_row, CANCEL_STRIDE)?;
        reader.seek(SeekFrom::Start(header.data_offset + src_row * row_bytes))?;
        reader.read_exact(&mut row)?;
        let offset = (out_height - 1 - out_row) * out_width;
        for (out_col, sample) in row.chunks_exact(sample_bytes).step_by(dist).enumerate() {
            let z = match *sample {
                [a, b, c, d] => f64::from(ByteOrder::Little.f32([a, b, c, d])),
                [a, b, c, d, e, f, g, h] => ByteOrder::Little.f64([a, b, c, d, e, f, g, h]),
                _ => return Err(MISMATCH),
            };
            store(header, grid, offset + out_col, z);
        }
    }
    Ok(())
}
