//! Grids exported to Arc/Info E00 (`GRD` sections).

use tracing::{debug, instrument};

use super::{text::packed_numbers, GridSize, SampleBuffer};
use crate::{cancel::ReadContext, vector::e00::LineSource, Error, Result};

const CANCEL_STRIDE: usize = 10;
const MISMATCH: Error = Error::FormatMismatch("E00 grid");
/// Values at or below this are encoding artifacts rather than data
const IMPLAUSIBLE: f32 = -1e36;

/// Size and sentinel of an E00 grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct E00GridHeader {
    /// number of columns
    pub cols: u32,
    /// number of rows
    pub rows: u32,
    /// values at or below this are empty
    pub no_data: f32,
}

impl E00GridHeader {
    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.cols, self.rows)
    }

    /// Whether `v` holds data
    #[must_use]
    pub fn is_valid(&self, v: f32) -> bool {
        v > self.no_data && v > IMPLAUSIBLE
    }
}

/// Finds the `GRD` section and reads its header, leaving `lines` at the first
/// row of values.
///
/// # Errors
///
/// [`Error::FormatMismatch`] without a `GRD` section or with a malformed size
/// line, [`Error::Truncated`] when the header lines are missing.
pub fn read_header<L: LineSource + ?Sized>(lines: &mut L) -> Result<E00GridHeader> {
    loop {
        match lines.next_line()? {
            Some(line) if line.starts_with("GRD") => break,
            Some(_) => {}
            None => return Err(MISMATCH),
        }
    }
    let line = lines.next_line()?.ok_or(Error::Truncated)?;
    let mut numbers = packed_numbers(line);
    let mut dimension = || {
        numbers
            .next()
            .filter(|&n| n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX))
            .map(|n| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let n = n as u32;
                n
            })
            .ok_or(MISMATCH)
    };
    let cols = dimension()?;
    let rows = dimension()?;
    let _cell_type = numbers.next().ok_or(MISMATCH)?;
    #[allow(clippy::cast_possible_truncation)]
    let no_data = numbers.next().ok_or(MISMATCH)? as f32;
    // cell size, lower left and upper right corners
    for _ in 0..3 {
        lines.next_line()?.ok_or(Error::Truncated)?;
    }
    let header = E00GridHeader {
        cols,
        rows,
        no_data,
    };
    debug!("parsed E00 grid header {header:?}");
    Ok(header)
}

/// Grid size of the first `GRD` section
///
/// # Errors
///
/// See [`read_header`].
pub fn read_size<L: LineSource + ?Sized>(lines: &mut L) -> Result<GridSize> {
    Ok(read_header(lines)?.size())
}

/// Decodes the first `GRD` section. Each row starts on a new line and holds
/// up to five, possibly unseparated, numbers per line.
///
/// # Errors
///
/// Header errors, [`Error::Truncated`] when rows run out, [`Error::Cancelled`].
#[instrument(skip_all, level = "debug")]
pub fn read_grid<L: LineSource + ?Sized>(lines: &mut L, ctx: &ReadContext) -> Result<SampleBuffer> {
    let header = read_header(lines)?;
    let size = header.size();
    let decimation = ctx.decimation();
    let dist = size.sample_dist(&decimation);
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;

    for row in 0..header.rows {
        ctx.checkpoint(row as usize, CANCEL_STRIDE)?;
        let sampled_row = row % dist == 0;
        let offset = (row / dist) as usize * out_width;
        let mut col = 0;
        while col < header.cols {
            let line = lines.next_line()?.ok_or(Error::Truncated)?;
            for value in packed_numbers(line) {
                if col >= header.cols {
                    break;
                }
                #[allow(clippy::cast_possible_truncation)]
                let value = value as f32;
                if sampled_row && col % dist == 0 && header.is_valid(value) {
                    grid.set(offset + (col / dist) as usize, value);
                }
                col += 1;
            }
        }
    }
    Ok(grid)
}
