//! ESRI binary float grids (`.flt`) with a `.hdr` sibling.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use tracing::{debug, instrument};

use super::{
    text::{key_value, read_line, HEADER_LINE_LIMIT},
    GridSize, SampleBuffer,
};
use crate::{cancel::ReadContext, sampling::ByteOrder, Error, Result};

const CANCEL_STRIDE: usize = 20;

/// Header of an ESRI binary grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EsriBinaryHeader {
    /// number of columns
    pub cols: u32,
    /// number of rows
    pub rows: u32,
    /// no-data sentinel, `NaN` when the header has none
    pub no_data: f32,
    /// byte order of the float samples
    pub byte_order: ByteOrder,
}

impl EsriBinaryHeader {
    /// Reads the header from a `.hdr` file
    ///
    /// # Errors
    ///
    /// I/O errors and the errors of [`EsriBinaryHeader::from_reader`].
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_reader(&mut BufReader::new(File::open(path)?))
    }

    /// Parses `ncols`, `nrows`, `nodata_value` and `byteorder` lines, ignoring
    /// everything else.
    ///
    /// # Errors
    ///
    /// [`Error::FormatMismatch`] when the size is missing or a value is malformed.
    pub fn from_reader<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mismatch = || Error::FormatMismatch("ESRI binary grid header");
        let mut cols = None;
        let mut rows = None;
        let mut no_data = f32::NAN;
        let mut byte_order = ByteOrder::Little;
        while let Some(line) = read_line(reader, HEADER_LINE_LIMIT)? {
            let Some((key, value)) = key_value(&line) else {
                continue;
            };
            match key.to_ascii_lowercase().as_str() {
                "ncols" => cols = Some(value.parse().map_err(|_| mismatch())?),
                "nrows" => rows = Some(value.parse().map_err(|_| mismatch())?),
                "nodata_value" => no_data = value.parse().map_err(|_| mismatch())?,
                "byteorder" => {
                    byte_order = if value.eq_ignore_ascii_case("msbfirst") {
                        ByteOrder::Big
                    } else {
                        ByteOrder::Little
                    };
                }
                _ => {}
            }
        }
        match (cols, rows) {
            (Some(cols), Some(rows)) if cols > 0 && rows > 0 => Ok(Self {
                cols,
                rows,
                no_data,
                byte_order,
            }),
            _ => Err(mismatch()),
        }
    }

    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.cols, self.rows)
    }
}

/// Grid size from the `.hdr` sibling
///
/// # Errors
///
/// See [`EsriBinaryHeader::from_path`].
pub fn read_size(header_path: &Path) -> Result<GridSize> {
    Ok(EsriBinaryHeader::from_path(header_path)?.size())
}

/// Decodes 32 bit float rows of a `len` byte payload.
///
/// # Errors
///
/// [`Error::Truncated`] up front when `len` is shorter than the declared grid,
/// [`Error::Cancelled`].
#[allow(clippy::float_cmp)]
#[instrument(skip(reader, ctx), level = "debug")]
pub fn read_grid<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    header: &EsriBinaryHeader,
    ctx: &ReadContext,
) -> Result<SampleBuffer> {
    let row_bytes = u64::from(header.cols) * 4;
    if len < row_bytes * u64::from(header.rows) {
        debug!("payload of {len} bytes is too short for {:?}", header.size());
        return Err(Error::Truncated);
    }
    let decimation = ctx.decimation();
    let size = header.size();
    let dist = size.sample_dist(&decimation) as usize;
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;
    let mut row = vec![0u8; usize::try_from(row_bytes).map_err(|_| Error::Truncated)?];

    for (out_row, src_row) in (0..u64::from(header.rows)).step_by(dist).enumerate() {
        ctx.checkpoint(out_row, CANCEL_STRIDE)?;
        reader.seek(SeekFrom::Start(src_row * row_bytes))?;
        reader.read_exact(&mut row)?;
        for (out_col, chunk) in row.chunks_exact(4).step_by(dist).enumerate() {
            let value = header
                .byte_order
                .f32([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if value != header.no_data {
                grid.set(out_row * out_width + out_col, value);
            }
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{cancel::Never, sampling::Decimation};

    fn header(text: &str) -> Result<EsriBinaryHeader> {
        EsriBinaryHeader::from_reader(&mut Cursor::new(text.as_bytes().to_vec()))
    }

    fn decode(data: Vec<u8>, header: &EsriBinaryHeader) -> Result<SampleBuffer> {
        let len = data.len() as u64;
        read_grid(
            &mut Cursor::new(data),
            len,
            header,
            &ReadContext::new(&Never, Decimation::default()),
        )
    }

    #[test]
    fn parses_header() -> anyhow::Result<()> {
        let h = header(
            "ncols         4\nnrows         2\nxllcorner     -180\nyllcorner     -90\n\
             cellsize      0.5\nNODATA_value  -9999\nbyteorder     MSBFIRST\n",
        )?;
        assert_eq!(h.size(), GridSize::new(4, 2));
        assert_eq!(h.no_data, -9999.0);
        assert_eq!(h.byte_order, ByteOrder::Big);

        let h = header("ncols 1\nnrows 1\n")?;
        assert!(h.no_data.is_nan());
        assert_eq!(h.byte_order, ByteOrder::Little);
        assert!(matches!(header("ncols 4\n"), Err(Error::FormatMismatch(_))));
        Ok(())
    }

    #[test]
    fn both_byte_orders_decode_identically() -> anyhow::Result<()> {
        let values = [1.5f32, -9999.0, 3.5, 5.5];
        let be: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let le: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let hb = header("ncols 2\nnrows 2\nnodata_value -9999\nbyteorder msbfirst\n")?;
        let hl = header("ncols 2\nnrows 2\nnodata_value -9999\nbyteorder lsbfirst\n")?;
        let b = decode(be, &hb)?;
        assert_eq!(b.range(), Some((1.5, 5.5)));
        let gray = b.into_gray();
        assert_eq!(gray, decode(le, &hl)?.into_gray());
        assert_eq!(gray.pixels(), &[0, 255, 127, 255]);
        Ok(())
    }

    #[test]
    fn short_payload_is_rejected_up_front() -> anyhow::Result<()> {
        let h = header("ncols 4\nnrows 4\n")?;
        assert!(matches!(decode(vec![0; 60], &h), Err(Error::Truncated)));
        Ok(())
    }
}
