//! USGS digital elevation models: a fixed-offset Fortran header (record A)
//! followed by one elevation profile per column (records B).

use std::io::{BufRead, Seek, SeekFrom};

use tracing::{debug, instrument, trace};

use super::{GridSize, SampleBuffer};
use crate::{cancel::ReadContext, Error, Result};

const CANCEL_STRIDE: usize = 10;
const MISMATCH: Error = Error::FormatMismatch("USGS DEM");
const NO_DATA: i64 = -32767;

const PATTERN_OFFSET: u64 = 150;
const COORD_SYSTEM_OFFSET: u64 = 156;
const CORNERS_OFFSET: u64 = 546;
const RESOLUTION_OFFSET: u64 = 816;
const PROFILES_OFFSET: u64 = 858;
/// Legacy, new and undocumented positions of the first profile
const DATA_OFFSETS: [u64; 3] = [864, 1024, 893];

/// Header values needed to place profile samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemHeader {
    /// number of profiles, the grid width
    pub profiles: u32,
    /// number of rows spanned by the profiles
    pub rows: u32,
    /// planimetric reference system code, 0 for geographic
    pub coord_system: i64,
    /// northern edge of the top row
    pub y_top: f64,
    /// signed row step, negative
    pub y_step: f64,
    /// elevation units per stored integer
    pub z_resolution: f64,
    /// offset of the first profile
    pub data_start: u64,
}

impl DemHeader {
    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.profiles, self.rows)
    }

    const fn is_geographic(&self) -> bool {
        self.coord_system == 0
    }
}

struct Fields<'r, R> {
    reader: &'r mut R,
}

impl<'r, R: BufRead + Seek> Fields<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        Self { reader }
    }

    fn at(&mut self, offset: u64) -> Result<&mut Self> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(self)
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    /// Free-format integer, skipping leading whitespace
    fn int(&mut self) -> Result<i64> {
        while self.peek()?.is_some_and(|b| b.is_ascii_whitespace()) {
            self.reader.consume(1);
        }
        if self.peek()?.is_none() {
            return Err(Error::Truncated);
        }
        let mut text = String::new();
        if let Some(sign @ (b'-' | b'+')) = self.peek()? {
            text.push(char::from(sign));
            self.reader.consume(1);
        }
        while let Some(digit) = self.peek()?.filter(u8::is_ascii_digit) {
            if text.len() > 18 {
                return Err(MISMATCH);
            }
            text.push(char::from(digit));
            self.reader.consume(1);
        }
        text.parse().map_err(|_| MISMATCH)
    }

    /// Fixed-width float field, Fortran `D` exponents accepted
    fn float(&mut self, width: usize) -> Result<f64> {
        let mut field = vec![0u8; width];
        self.reader.read_exact(&mut field)?;
        fortran_float(&field).ok_or(MISMATCH)
    }

    fn raw<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf).map_err(|_| MISMATCH)?;
        Ok(buf)
    }
}

/// Parses a Fortran `D24.15`/`D12.6` style field; a blank field reads as zero
#[must_use]
pub fn fortran_float(field: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(field).ok()?.trim();
    if text.is_empty() {
        return Some(0.0);
    }
    text.replace(['D', 'd'], "E").parse().ok()
}

fn has_signature<R: BufRead + Seek>(fields: &mut Fields<'_, R>) -> Result<bool> {
    let flags: [u8; 12] = fields.at(PATTERN_OFFSET)?.raw()?;
    let blanks = |range: &[u8]| range.iter().all(|&b| b == b' ');
    Ok(blanks(&flags[..5]) && flags[5] == b'1' && blanks(&flags[6..11]) && flags[11].is_ascii_digit())
}

fn data_start<R: BufRead + Seek>(fields: &mut Fields<'_, R>) -> Result<u64> {
    for offset in DATA_OFFSETS {
        let first = fields.at(offset)?.int();
        let second = fields.int();
        if matches!((first, second), (Ok(1), Ok(1))) {
            return Ok(offset);
        }
        trace!("no profile at offset {offset}");
    }
    Err(MISMATCH)
}

/// Validates the record A signature and reads the grid geometry.
///
/// # Errors
///
/// [`Error::FormatMismatch`] when the signature, the profile position or the
/// geometry is not usable.
pub fn read_header<R: BufRead + Seek>(reader: &mut R) -> Result<DemHeader> {
    let mut fields = Fields::new(reader);
    if !has_signature(&mut fields)? {
        return Err(MISMATCH);
    }
    let data_start = data_start(&mut fields)?;

    fields.at(CORNERS_OFFSET)?;
    let mut corners = [(0.0, 0.0); 4];
    for corner in &mut corners {
        *corner = (fields.float(24)?, fields.float(24)?);
    }
    let mut y_min = corners[0].1.min(corners[3].1);
    let mut y_max = corners[1].1.max(corners[2].1);

    let profiles = fields.at(PROFILES_OFFSET)?.int()?;
    fields.at(RESOLUTION_OFFSET)?;
    let _dx = fields.float(12)?;
    let dy = fields.float(12)?;
    let z_resolution = fields.float(12)?;
    let coord_system = fields.at(COORD_SYSTEM_OFFSET)?.int()?;
    if dy.is_nan() || dy <= 0.0 {
        return Err(MISMATCH);
    }

    let (y_top, y_step) = if coord_system == 0 {
        ((y_max + dy / 2.0) / 3600.0, -dy / 3600.0)
    } else {
        y_min = (y_min / dy).floor() * dy;
        y_max = (y_max / dy).ceil() * dy;
        (y_max + dy / 2.0, -dy)
    };
    #[allow(clippy::cast_possible_truncation)]
    let rows = ((y_max - y_min) / dy + 1.5) as i64;

    let header = DemHeader {
        profiles: u32::try_from(profiles).ok().filter(|&n| n > 0).ok_or(MISMATCH)?,
        rows: u32::try_from(rows).ok().filter(|&n| n > 0).ok_or(MISMATCH)?,
        coord_system,
        y_top,
        y_step,
        z_resolution,
        data_start,
    };
    debug!("parsed USGS DEM header {header:?}");
    Ok(header)
}

/// Grid size from record A
///
/// # Errors
///
/// See [`read_header`].
pub fn read_size<R: BufRead + Seek>(reader: &mut R) -> Result<GridSize> {
    Ok(read_header(reader)?.size())
}

/// Decodes the elevation profiles into a north-up grid.
///
/// # Errors
///
/// Header errors, [`Error::Truncated`], [`Error::FormatMismatch`] for
/// malformed profile records, [`Error::Cancelled`].
#[instrument(skip_all, level = "debug")]
pub fn read_grid<R: BufRead + Seek>(reader: &mut R, ctx: &ReadContext) -> Result<SampleBuffer> {
    let header = read_header(reader)?;
    let size = header.size();
    let decimation = ctx.decimation();
    let dist = i64::from(size.sample_dist(&decimation));
    let mut grid = size.buffer(&decimation);
    let out_width = i64::from(grid.width());
    let height = i64::from(header.rows);
    let y_bottom = (f64::from(header.rows) - 0.5).mul_add(header.y_step, header.y_top);

    let mut fields = Fields::new(reader);
    fields.at(header.data_start)?;
    for column in 0..i64::from(header.profiles) {
        ctx.checkpoint(usize::try_from(column).unwrap_or_default(), CANCEL_STRIDE)?;
        // row and column ids, point count, column count
        let _ = (fields.int()?, fields.int()?);
        let points = fields.int()?;
        if points < 0 {
            return Err(MISMATCH);
        }
        let _ = fields.int()?;
        let _x_start = fields.float(24)?;
        let mut y_start = fields.float(24)?;
        let offset = fields.float(24)?;
        // local elevation range
        let _ = (fields.float(24)?, fields.float(24)?);
        if header.is_geographic() {
            y_start /= 3600.0;
        }
        // profiles entirely off the grid are still consumed
        #[allow(clippy::cast_possible_truncation)]
        let gap = (((y_bottom - y_start) / header.y_step + 0.5) as i64).clamp(-points, height);

        for j in gap..gap.saturating_add(points) {
            let row = height - j - 1;
            let raw = fields.int()?;
            if (0..height).contains(&row) && column % dist == 0 && row % dist == 0 && raw != NO_DATA
            {
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                let value = (raw as f64).mul_add(header.z_resolution, offset) as f32;
                let index = column / dist + row / dist * out_width;
                grid.set(usize::try_from(index).unwrap_or(usize::MAX), value);
            }
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{cancel::Never, sampling::Decimation, CancelFlag};

    fn d(v: f64, width: usize) -> String {
        format!("{:>width$}", format!("{v:.6E}").replace('E', "D"))
    }

    fn put(record: &mut [u8], offset: usize, text: &str) {
        record[offset..offset + text.len()].copy_from_slice(text.as_bytes());
    }

    fn profile(column: i32, y_start: f64, offset: f64, elevations: &[i32]) -> String {
        let mut text = format!("{:>6}{:>6}{:>6}{:>6}", 1, column, elevations.len(), 1);
        for v in [30.0 * f64::from(column - 1), y_start, offset, 0.0, 0.0] {
            text.push_str(&d(v, 24));
        }
        for e in elevations {
            text.push_str(&format!("{e:>6}"));
        }
        format!("{text:<1024}")
    }

    /// Two profiles over three rows of 30 m UTM cells
    fn fixture() -> Vec<u8> {
        fixture_with(&profile(1, 0.0, 0.0, &[100, 110, 120]))
    }

    fn fixture_with(first: &str) -> Vec<u8> {
        let mut record = vec![b' '; 1024];
        put(&mut record, 150, "     1     1");
        let corners = [(0.0, 0.0), (0.0, 60.0), (30.0, 60.0), (30.0, 0.0)];
        let corners: String = corners.iter().map(|&(x, y)| d(x, 24) + &d(y, 24)).collect();
        put(&mut record, 546, &corners);
        put(&mut record, 816, &(d(30.0, 12) + &d(30.0, 12) + &d(1.0, 12)));
        put(&mut record, 852, "     1     2     0     0");
        let mut data = record;
        data.extend(first.bytes());
        data.extend(profile(2, 30.0, 50.0, &[150, -32767]).bytes());
        data
    }

    #[test]
    fn fortran_fields() {
        assert_eq!(fortran_float(b"  0.300000000000000D+02"), Some(30.0));
        assert_eq!(fortran_float(b"-1.5d-1"), Some(-0.15));
        assert_eq!(fortran_float(b"      "), Some(0.0));
        assert_eq!(fortran_float(b"  abc "), None);
    }

    #[test]
    fn header_geometry() -> anyhow::Result<()> {
        let header = read_header(&mut Cursor::new(fixture()))?;
        assert_eq!(header.size(), GridSize::new(2, 3));
        assert_eq!(header.data_start, 1024);
        assert_eq!(header.coord_system, 1);
        assert_eq!(header.y_top, 75.0);
        assert_eq!(header.y_step, -30.0);
        Ok(())
    }

    #[test]
    fn profiles_fill_columns_bottom_up() -> anyhow::Result<()> {
        let grid = read_grid(
            &mut Cursor::new(fixture()),
            &ReadContext::new(&Never, Decimation::default()),
        )?;
        assert_eq!(grid.range(), Some((100.0, 200.0)));
        assert_eq!(grid.into_gray().pixels(), &[51, 255, 25, 255, 0, 255]);
        Ok(())
    }

    #[test]
    fn profiles_off_the_grid_are_skipped() -> anyhow::Result<()> {
        let ctx = ReadContext::new(&Never, Decimation::default());
        for y_start in [-1.0e30, 1.0e30, 1.0e6] {
            let data = fixture_with(&profile(1, y_start, 0.0, &[100, 110, 120]));
            let grid = read_grid(&mut Cursor::new(data), &ctx)?;
            assert_eq!(grid.range(), Some((200.0, 200.0)));
            assert!(grid.samples().iter().step_by(2).all(|v| v.is_nan()));
        }
        Ok(())
    }

    #[test]
    fn negative_point_count_is_rejected() {
        let mut data = fixture();
        put(&mut data, 1024 + 12, "    -3");
        let result = read_grid(
            &mut Cursor::new(data),
            &ReadContext::new(&Never, Decimation::default()),
        );
        assert!(matches!(result, Err(Error::FormatMismatch(_))));
    }

    #[test]
    fn rejects_other_files() {
        let mut data = fixture();
        data[155] = b'2';
        assert!(matches!(read_size(&mut Cursor::new(data)), Err(Error::FormatMismatch(_))));
        assert!(matches!(
            read_size(&mut Cursor::new(b"P5 1 1 255 x".to_vec())),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn cancellation() {
        let flag = CancelFlag::new();
        flag.cancel();
        let result = read_grid(
            &mut Cursor::new(fixture()),
            &ReadContext::new(&flag, Decimation::default()),
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
