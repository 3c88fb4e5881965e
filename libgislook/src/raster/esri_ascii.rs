//! ESRI ASCII grids (`.asc`).

use std::io::{BufRead, Seek, SeekFrom};

use tracing::{debug, instrument};

use super::{
    hdr::DEFAULT_NO_DATA,
    text::{key_value, keyword_value, read_line, ScanPattern, Tokens, HEADER_LINE_LIMIT},
    GridSize, SampleBuffer,
};
use crate::{cancel::ReadContext, Error, Result};

const CANCEL_STRIDE: usize = 10;
const MISMATCH: Error = Error::FormatMismatch("ESRI ASCII grid");

/// Header of an ESRI ASCII grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EsriAsciiHeader {
    /// number of columns
    pub cols: u32,
    /// number of rows
    pub rows: u32,
    /// no-data sentinel
    pub no_data: f32,
}

/// Reads the header and leaves `reader` at the first grid value.
///
/// The first two lines must be `ncols` and `nrows`; the corner and cell size
/// lines are skipped; an optional `NODATA_value` line follows.
///
/// # Errors
///
/// [`Error::FormatMismatch`] when the size lines are absent or malformed.
pub fn read_header<R: BufRead + Seek>(reader: &mut R) -> Result<EsriAsciiHeader> {
    let mut size_line = |keyword| -> Result<u32> {
        read_line(&mut *reader, HEADER_LINE_LIMIT)?
            .and_then(|line| keyword_value(&line, keyword))
            .filter(|&n| n > 0)
            .ok_or(MISMATCH)
    };
    let cols = size_line("ncols")?;
    let rows = size_line("nrows")?;
    for _ in 0..3 {
        read_line(reader, HEADER_LINE_LIMIT)?.ok_or(Error::Truncated)?;
    }

    let mut no_data = DEFAULT_NO_DATA;
    let data_start = reader.stream_position()?;
    match read_line(reader, HEADER_LINE_LIMIT)? {
        Some(line) if line.trim_start().starts_with(['n', 'N']) => {
            no_data = key_value(&line)
                .and_then(|(_, value)| value.parse().ok())
                .ok_or(MISMATCH)?;
        }
        _ => {
            reader.seek(SeekFrom::Start(data_start))?;
        }
    }
    let header = EsriAsciiHeader {
        cols,
        rows,
        no_data,
    };
    debug!("parsed ESRI ASCII header {header:?}");
    Ok(header)
}

/// Grid size from the header
///
/// # Errors
///
/// See [`read_header`].
pub fn read_size<R: BufRead + Seek>(reader: &mut R) -> Result<GridSize> {
    let header = read_header(reader)?;
    Ok(GridSize::new(header.cols, header.rows))
}

/// Decodes an ESRI ASCII grid, parsing only the sampled tokens.
///
/// # Errors
///
/// Header errors, [`Error::Truncated`] when values run out,
/// [`Error::FormatMismatch`] for non-numeric values, [`Error::Cancelled`].
#[allow(clippy::float_cmp)]
#[instrument(skip_all, level = "debug")]
pub fn read_grid<R: BufRead + Seek>(reader: &mut R, ctx: &ReadContext) -> Result<SampleBuffer> {
    let header = read_header(reader)?;
    let size = GridSize::new(header.cols, header.rows);
    let decimation = ctx.decimation();
    let dist = size.sample_dist(&decimation);
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;
    let pattern = ScanPattern::for_row(header.cols, dist);
    let mut tokens = Tokens::new(&mut *reader);

    for row in 0..header.rows {
        ctx.checkpoint(row as usize, CANCEL_STRIDE)?;
        if row % dist != 0 {
            tokens.skip(header.cols)?;
            continue;
        }
        let offset = (row / dist) as usize * out_width;
        pattern.scan(&mut tokens, |col, value: f32| {
            if value != header.no_data {
                grid.set(offset + col, value);
            }
        })?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{cancel::Never, sampling::Decimation};

    const GRID: &str = "ncols 4\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 10\n\
                        NODATA_value -1\n1 2 3 4\n5 -1 7 8\n9 10 11 12\n";

    fn decode(text: &str, decimation: Decimation) -> Result<SampleBuffer> {
        read_grid(
            &mut Cursor::new(text.as_bytes().to_vec()),
            &ReadContext::new(&Never, decimation),
        )
    }

    #[test]
    fn header_fields() -> anyhow::Result<()> {
        let h = read_header(&mut Cursor::new(GRID.as_bytes().to_vec()))?;
        assert_eq!((h.cols, h.rows, h.no_data), (4, 3, -1.0));

        let mut no_nodata =
            Cursor::new(b"NCOLS 2\nNROWS 1\nxllcenter 0\nyllcenter 0\ncellsize 1\n4 5\n".to_vec());
        let h = read_header(&mut no_nodata)?;
        assert_eq!(h.no_data, DEFAULT_NO_DATA);
        let mut tokens = Tokens::new(&mut no_nodata);
        assert_eq!(tokens.value::<f32>()?, 4.0);
        Ok(())
    }

    #[test]
    fn size_lines_are_ordered() {
        let swapped = "nrows 3\nncols 4\na\nb\nc\n";
        assert!(matches!(
            read_size(&mut Cursor::new(swapped.as_bytes().to_vec())),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            read_size(&mut Cursor::new(vec![0xff; 4096])),
            Err(Error::FormatMismatch(_) | Error::LineTooLong { .. })
        ));
    }

    #[test]
    fn decodes_full_grid() -> anyhow::Result<()> {
        let grid = decode(GRID, Decimation::default())?;
        assert_eq!(grid.range(), Some((1.0, 12.0)));
        assert!(grid.samples()[5].is_nan());
        assert_eq!(grid.samples()[11], 12.0);
        Ok(())
    }

    #[test]
    fn decodes_sampled_tokens() -> anyhow::Result<()> {
        let grid = decode(GRID, Decimation::new(2))?;
        assert_eq!((grid.width(), grid.height()), (2, 2));
        assert_eq!(grid.samples(), &[1.0, 3.0, 9.0, 11.0]);
        Ok(())
    }

    #[test]
    fn missing_values_are_truncation() {
        let short = "ncols 4\nnrows 3\nx\ny\nc\n1 2 3 4\n5 6\n";
        assert!(matches!(decode(short, Decimation::default()), Err(Error::Truncated)));
    }
}
