//! `.hdr` sibling files of BIL/BIP/BSQ and ESRI binary grids.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use strum::EnumString;
use tracing::{debug, trace, warn};

use super::{
    text::{key_value, read_line, HEADER_LINE_LIMIT},
    GridSize,
};
use crate::{sampling::ByteOrder, Error, Result};

const OVERFLOW: Error = Error::FormatMismatch("BIL header row bytes");

/// Default no-data value of BIL grids
pub const DEFAULT_NO_DATA: f32 = -9999.0;

/// Byte layout of the bands of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Layout {
    /// band interleaved by line
    #[default]
    Bil,
    /// band interleaved by pixel
    Bip,
    /// band sequential
    Bsq,
    /// 32 bit float grid, flagged by a `cellsize` key
    #[strum(disabled)]
    EsriBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum Key {
    NRows,
    NCols,
    NBands,
    NBits,
    ByteOrder,
    Layout,
    SkipBytes,
    CellSize,
    BandRowBytes,
    TotalRowBytes,
    BandGapBytes,
}

/// Parsed `.hdr` metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GridHeader {
    /// number of rows
    pub rows: u32,
    /// number of columns
    pub cols: u32,
    /// number of bands, only the first is decoded
    pub bands: u32,
    /// bits per sample
    pub bits_per_sample: u32,
    /// declared byte order
    pub byte_order: ByteOrder,
    /// band layout
    pub layout: Layout,
    /// bytes to skip at the start of the file
    pub skip_bytes: u64,
    /// bytes of one band of one row
    pub band_row_bytes: u64,
    /// bytes of one row across all bands
    pub total_row_bytes: u64,
    /// bytes between bands, BSQ only
    pub band_gap_bytes: u64,
    /// no-data sentinel
    pub no_data: f32,
}

impl GridHeader {
    /// Reads the header from a `.hdr` file
    ///
    /// # Errors
    ///
    /// I/O errors and the errors of [`GridHeader::from_reader`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(&mut BufReader::new(file))
    }

    /// Parses `key value` lines. Keys match case-insensitively; unknown keys
    /// are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::FormatMismatch`] when a known key has a malformed value, the
    /// grid size is missing, or the row byte counts are inconsistent.
    pub fn from_reader<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut rows = 0;
        let mut cols = 0;
        let mut bands = 1;
        let mut bits_per_sample = 8;
        let mut byte_order = ByteOrder::Little;
        let mut layout = Layout::Bil;
        let mut skip_bytes = 0;
        let mut band_row_bytes = None;
        let mut total_row_bytes = None;
        let mut band_gap_bytes = None;
        let mut no_data = DEFAULT_NO_DATA;
        let mut cell_size = false;

        while let Some(line) = read_line(reader, HEADER_LINE_LIMIT)? {
            let Some((key, value)) = key_value(&line) else {
                continue;
            };
            if key.to_ascii_lowercase().starts_with("nodata") {
                no_data = parse(value)?;
                continue;
            }
            let Ok(key) = Key::from_str(key) else {
                trace!("skipping header key {key}");
                continue;
            };
            match key {
                Key::NRows => rows = parse(value)?,
                Key::NCols => cols = parse(value)?,
                Key::NBands => bands = parse(value)?,
                Key::NBits => bits_per_sample = parse(value)?,
                Key::ByteOrder => {
                    byte_order = if value.starts_with(['M', 'm']) {
                        ByteOrder::Big
                    } else {
                        ByteOrder::Little
                    };
                }
                Key::Layout => {
                    layout = Layout::from_str(value)
                        .map_err(|_| Error::FormatMismatch("BIL header layout"))?;
                }
                Key::SkipBytes => skip_bytes = parse(value)?,
                Key::CellSize => cell_size = true,
                Key::BandRowBytes => band_row_bytes = Some(parse(value)?),
                Key::TotalRowBytes => total_row_bytes = Some(parse(value)?),
                Key::BandGapBytes => band_gap_bytes = Some(parse(value)?),
            }
        }

        if cell_size {
            bits_per_sample = 32;
            layout = Layout::EsriBinary;
        }
        if rows == 0 || cols == 0 || bands == 0 {
            return Err(Error::FormatMismatch("BIL header"));
        }

        let cols_wide = u64::from(cols);
        let bits = u64::from(bits_per_sample);
        let band_row_bytes = match band_row_bytes {
            Some(n) => n,
            None => (cols_wide * bits).div_ceil(8),
        };
        let total_row_bytes = match (total_row_bytes, layout) {
            (Some(n), _) => Some(n),
            (None, Layout::Bil) => u64::from(bands).checked_mul(band_row_bytes),
            (None, Layout::Bip) => (cols_wide * bits)
                .checked_mul(u64::from(bands))
                .map(|n| n.div_ceil(8)),
            (None, Layout::Bsq) => Some(band_row_bytes),
            (None, Layout::EsriBinary) => Some(cols_wide * 4),
        }
        .ok_or(OVERFLOW)?;
        let band_gap_bytes = match layout {
            Layout::Bsq => band_gap_bytes.unwrap_or(0),
            _ => 0,
        };

        if layout == Layout::Bil {
            let bands_bytes = band_row_bytes.checked_mul(u64::from(bands)).ok_or(OVERFLOW)?;
            if bands_bytes > total_row_bytes {
                warn!(
                    "band row bytes {band_row_bytes} x {bands} bands exceed total row bytes {total_row_bytes}"
                );
                return Err(Error::FormatMismatch("BIL header"));
            }
        }

        let header = Self {
            rows,
            cols,
            bands,
            bits_per_sample,
            byte_order,
            layout,
            skip_bytes,
            band_row_bytes,
            total_row_bytes,
            band_gap_bytes,
            no_data,
        };
        debug!("parsed grid header {header:?}");
        Ok(header)
    }

    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.cols, self.rows)
    }
}

fn parse<T: FromStr>(value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::FormatMismatch("BIL header value"))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn header(text: &str) -> Result<GridHeader> {
        GridHeader::from_reader(&mut Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn defaults() -> anyhow::Result<()> {
        let h = header("NROWS 3\nNCOLS 5\n")?;
        assert_eq!(h.size(), GridSize::new(5, 3));
        assert_eq!(h.bands, 1);
        assert_eq!(h.bits_per_sample, 8);
        assert_eq!(h.byte_order, ByteOrder::Little);
        assert_eq!(h.layout, Layout::Bil);
        assert_eq!(h.skip_bytes, 0);
        assert_eq!(h.band_row_bytes, 5);
        assert_eq!(h.total_row_bytes, 5);
        assert_eq!(h.band_gap_bytes, 0);
        assert_eq!(h.no_data, DEFAULT_NO_DATA);
        Ok(())
    }

    #[test]
    fn keys_are_case_insensitive() -> anyhow::Result<()> {
        let h = header(
            "BYTEORDER      M\nLAYOUT       BIP\nnrows 10\nNcols 7\nNBANDS 3\nNBITS 16\n\
             ULXMAP -180\nNODATA_VALUE -32768\nSkipBytes 12\n",
        )?;
        assert_eq!(h.byte_order, ByteOrder::Big);
        assert_eq!(h.layout, Layout::Bip);
        assert_eq!(h.bits_per_sample, 16);
        assert_eq!(h.band_row_bytes, 14);
        assert_eq!(h.total_row_bytes, 42);
        assert_eq!(h.skip_bytes, 12);
        assert_eq!(h.no_data, -32768.0);
        Ok(())
    }

    #[test]
    fn derived_row_bytes() -> anyhow::Result<()> {
        let bil = header("nrows 2\nncols 3\nnbands 2\nnbits 16\n")?;
        assert_eq!(bil.total_row_bytes, 12);
        let bsq = header("nrows 2\nncols 3\nnbands 2\nlayout bsq\nbandgapbytes 4\n")?;
        assert_eq!(bsq.total_row_bytes, 3);
        assert_eq!(bsq.band_gap_bytes, 4);
        let bil_gap = header("nrows 2\nncols 3\nbandgapbytes 4\n")?;
        assert_eq!(bil_gap.band_gap_bytes, 0);
        Ok(())
    }

    #[test]
    fn cellsize_marks_esri_binary() -> anyhow::Result<()> {
        let h = header("ncols 4\nnrows 4\ncellsize 0.5\n")?;
        assert_eq!(h.layout, Layout::EsriBinary);
        assert_eq!(h.bits_per_sample, 32);
        Ok(())
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(header("nrows 2\n"), Err(Error::FormatMismatch(_))));
        assert!(matches!(
            header("nrows two\nncols 3\n"),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            header("nrows 2\nncols 3\nlayout tiles\n"),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            header("nrows 2\nncols 3\nnbands 2\ntotalrowbytes 4\n"),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn oversized_row_bytes_are_rejected() {
        let huge = u64::MAX;
        assert!(matches!(
            header(&format!("nrows 2\nncols 3\nnbands 2\nbandrowbytes {huge}\n")),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            header(&format!(
                "nrows 2\nncols 3\nnbands 2\nbandrowbytes {huge}\ntotalrowbytes {huge}\n"
            )),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            header(&format!(
                "nrows 2\nncols {}\nnbands {}\nnbits 16\nlayout bip\n",
                u32::MAX,
                u32::MAX
            )),
            Err(Error::FormatMismatch(_))
        ));
    }
}
