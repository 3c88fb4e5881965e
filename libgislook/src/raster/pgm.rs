//! Portable graymaps, ASCII (`P2`) and 8 bit binary (`P5`).

use std::io::{BufRead, Read, Seek, SeekFrom};

use tracing::{debug, instrument};

use super::{
    text::{ScanPattern, Tokens},
    GridSize, SampleBuffer,
};
use crate::{cancel::ReadContext, Error, Result};

const CANCEL_STRIDE: usize = 10;
const MISMATCH: Error = Error::FormatMismatch("PGM");
const MAX_BINARY_VALUE: u32 = 65_536;

/// Header of a graymap; the reader is left at the first sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgmHeader {
    /// `P5` rather than `P2`
    pub binary: bool,
    /// columns, at least 1
    pub width: u32,
    /// rows, may be 0
    pub height: u32,
    /// declared maximum gray value
    pub max_value: u32,
}

impl PgmHeader {
    /// Source grid size
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.width, self.height)
    }
}

fn peek<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    Ok(reader.fill_buf()?.first().copied())
}

/// Skips whitespace and `#` comments
fn skip_separators<R: BufRead>(reader: &mut R) -> Result<()> {
    loop {
        match peek(reader)? {
            Some(b) if b.is_ascii_whitespace() => reader.consume(1),
            Some(b'#') => {
                let mut comment = Vec::new();
                reader.read_until(b'\n', &mut comment)?;
            }
            _ => return Ok(()),
        }
    }
}

fn header_value<R: BufRead>(reader: &mut R) -> Result<u32> {
    skip_separators(reader)?;
    let mut value: u32 = 0;
    let mut digits = 0;
    while let Some(digit) = peek(reader)?.filter(u8::is_ascii_digit) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u32::from(digit - b'0')))
            .ok_or(MISMATCH)?;
        digits += 1;
        reader.consume(1);
    }
    if digits == 0 {
        return Err(MISMATCH);
    }
    Ok(value)
}

/// Reads the magic, size and maximum value.
///
/// # Errors
///
/// [`Error::FormatMismatch`] for other magic numbers, a zero dimension, or a
/// binary maximum above 65536.
pub fn read_header<R: BufRead + Seek>(reader: &mut R) -> Result<PgmHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic).map_err(|_| MISMATCH)?;
    let binary = match &magic {
        b"P2" => false,
        b"P5" => true,
        _ => return Err(MISMATCH),
    };
    let width = header_value(reader)?;
    let height = header_value(reader)?;
    if width == 0 || height == 0 {
        return Err(MISMATCH);
    }
    let max_value = header_value(reader)?;
    if binary {
        if max_value > MAX_BINARY_VALUE {
            return Err(MISMATCH);
        }
        // exactly one separator before the samples
        let mut separator = [0u8; 1];
        reader.read_exact(&mut separator)?;
    }
    let header = PgmHeader {
        binary,
        width,
        height,
        max_value,
    };
    debug!("parsed PGM header {header:?}");
    Ok(header)
}

/// Graymap size from the header
///
/// # Errors
///
/// See [`read_header`].
pub fn read_size<R: BufRead + Seek>(reader: &mut R) -> Result<GridSize> {
    Ok(read_header(reader)?.size())
}

/// Decodes a graymap. ASCII samples are scaled to their observed range;
/// 8 bit binary samples keep their gray values.
///
/// # Errors
///
/// Header errors, [`Error::Unsupported`] for 16 bit binary samples,
/// [`Error::Truncated`], [`Error::Cancelled`].
#[instrument(skip_all, level = "debug")]
pub fn read_grid<R: BufRead + Seek>(reader: &mut R, ctx: &ReadContext) -> Result<SampleBuffer> {
    let header = read_header(reader)?;
    match (header.binary, header.max_value) {
        (false, _) => read_ascii(reader, &header, ctx),
        (true, 0..=255) => read_binary8(reader, &header, ctx),
        (true, max) => Err(Error::Unsupported(format!(
            "16-bit binary PGM (maximum {max})"
        ))),
    }
}

fn read_ascii<R: BufRead>(reader: &mut R, header: &PgmHeader, ctx: &ReadContext) -> Result<SampleBuffer> {
    let size = header.size();
    let decimation = ctx.decimation();
    let dist = size.sample_dist(&decimation);
    let mut grid = size.buffer(&decimation);
    let out_width = grid.width() as usize;
    let pattern = ScanPattern::for_row(header.width, dist);
    let mut tokens = Tokens::new(reader);
    for row in 0..header.height {
        ctx.checkpoint(row as usize, CANCEL_STRIDE)?;
        if row % dist != 0 {
            tokens.skip(header.width)?;
            continue;
        }
        let offset = (row / dist) as usize * out_width;
        pattern.scan(&mut tokens, |col, value: u16| {
            grid.set(offset + col, f32::from(value));
        })?;
    }
    Ok(grid)
}

fn read_binary8<R: Read + Seek>(reader: &mut R, header: &PgmHeader, ctx: &ReadContext) -> Result<SampleBuffer> {
    let size = header.size();
    let decimation = ctx.decimation();
    let dist = size.sample_dist(&decimation) as usize;
    let (out_width, out_height) = size.resampled(&decimation);
    let mut grid = SampleBuffer::with_range(out_width, out_height, 0.0, 255.0);
    let data_start = reader.stream_position()?;
    let mut row = vec![0u8; header.width as usize];
    let row_bytes = u64::from(header.width);

    for (out_row, src_row) in (0..u64::from(header.height)).step_by(dist).enumerate() {
        ctx.checkpoint(out_row, CANCEL_STRIDE)?;
        reader.seek(SeekFrom::Start(data_start + src_row * row_bytes))?;
        reader.read_exact(&mut row)?;
        let offset = out_row * out_width as usize;
        for (out_col, &gray) in row.iter().step_by(dist).enumerate() {
            grid.set(offset + out_col, f32::from(gray));
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{cancel::Never, sampling::Decimation};

    fn decode(data: &[u8]) -> Result<SampleBuffer> {
        read_grid(
            &mut Cursor::new(data.to_vec()),
            &ReadContext::new(&Never, Decimation::default()),
        )
    }

    #[test]
    fn header_with_comments() -> anyhow::Result<()> {
        let header = read_header(&mut Cursor::new(
            b"P2\n# made by hand\n3 # width\n2\n15\n0 1 2\n".to_vec(),
        ))?;
        assert_eq!(
            header,
            PgmHeader {
                binary: false,
                width: 3,
                height: 2,
                max_value: 15
            }
        );
        Ok(())
    }

    #[test]
    fn ascii_is_scaled() -> anyhow::Result<()> {
        let grid = decode(b"P2 2 2 100\n10 20\n30 50\n")?;
        assert_eq!(grid.into_gray().pixels(), &[0, 63, 127, 255]);
        Ok(())
    }

    #[test]
    fn binary_keeps_gray_values() -> anyhow::Result<()> {
        let mut data = b"P5\n3 2\n255\n".to_vec();
        data.extend([0, 10, 200, 32, 9, 255]);
        let grid = decode(&data)?;
        assert_eq!(grid.into_gray().pixels(), &[0, 10, 200, 32, 9, 255]);
        Ok(())
    }

    #[test]
    fn rejections() {
        assert!(matches!(decode(b"P6 1 1 255\n\0\0\0"), Err(Error::FormatMismatch(_))));
        assert!(matches!(decode(b"P5 0 1 255\n"), Err(Error::FormatMismatch(_))));
        assert!(matches!(decode(b"P2 3 0 255\n"), Err(Error::FormatMismatch(_))));
        assert!(matches!(
            read_size(&mut Cursor::new(b"P2 3 0 255\n".to_vec())),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(decode(b"P5 1 1 70000\n\0"), Err(Error::FormatMismatch(_))));
        assert!(matches!(decode(b"P5 1 1 1023\n\0\0"), Err(Error::Unsupported(_))));
        assert!(matches!(decode(b"P5 2 2 255\n\0\0\0"), Err(Error::Truncated)));
    }
}
