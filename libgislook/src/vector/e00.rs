//! Arc/Info E00 exports: line access, `ARC`/`LAB` sketches and extents.
//!
//! Everything here consumes text through [`LineSource`], so the same code
//! serves plain E00 files and line sources produced elsewhere, such as a
//! binary coverage translated to E00 lines by the caller.

use std::{
    fs::File,
    io::{BufRead, BufReader, Seek},
    path::Path,
};

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use super::{circle_radius, is_valid_coord, Bounds, DrawSurface, Style, VectorExtent};
use crate::{
    cancel::Cancel, path::change_extension, raster::text::{packed_numbers, read_line}, Error, Result,
};

/// Longest accepted line. E00 lines are 80 columns wide.
pub const MAX_LINE_LEN: usize = 1024;
const MISMATCH: Error = Error::FormatMismatch("E00");
const CANCEL_STRIDE: usize = 20;

/// Sequential access to E00 text lines
pub trait LineSource {
    /// Next line without terminator, `None` at the end
    ///
    /// # Errors
    ///
    /// I/O errors and [`Error::LineTooLong`].
    fn next_line(&mut self) -> Result<Option<&str>>;

    /// Restarts at the first line
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn rewind(&mut self) -> Result<()>;
}

/// Lines of an uncompressed E00 file
#[derive(Debug)]
pub struct E00Lines<R> {
    reader: R,
    line: String,
}

impl E00Lines<BufReader<File>> {
    /// Opens an E00 file
    ///
    /// # Errors
    ///
    /// I/O errors and those of [`E00Lines::new`].
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: BufRead + Seek> E00Lines<R> {
    /// Checks the `EXP` header line and rewinds to it.
    ///
    /// # Errors
    ///
    /// [`Error::FormatMismatch`] when the first line is not an `EXP` line,
    /// [`Error::Unsupported`] for compressed exports.
    pub fn new(mut reader: R) -> Result<Self> {
        let first = match read_line(&mut reader, MAX_LINE_LEN) {
            Ok(Some(line)) => line,
            Ok(None) | Err(Error::LineTooLong { .. }) => return Err(MISMATCH),
            Err(e) => return Err(e),
        };
        if !first.starts_with("EXP") {
            return Err(MISMATCH);
        }
        if first.starts_with("EXP  1") {
            return Err(Error::Unsupported("compressed E00".into()));
        }
        reader.rewind()?;
        Ok(Self {
            reader,
            line: String::new(),
        })
    }
}

impl<R: BufRead + Seek> LineSource for E00Lines<R> {
    fn next_line(&mut self) -> Result<Option<&str>> {
        match read_line(&mut self.reader, MAX_LINE_LEN)? {
            Some(line) => {
                self.line = line;
                Ok(Some(&self.line))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.rewind()?;
        Ok(())
    }
}

/// Where the lines come from. Only exports carry `BND` sections worth
/// searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    /// an `.e00` export file
    Export,
    /// a coverage rendered as E00 lines
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    Single,
    Double,
}

impl Precision {
    /// From a section header such as `ARC  3`
    fn of_section(line: &str) -> Self {
        match line.split_whitespace().nth(1).and_then(|t| t.parse::<i32>().ok()) {
            Some(3) => Self::Double,
            _ => Self::Single,
        }
    }

    /// Coordinates consumed by one coordinate line
    const fn step(self) -> usize {
        match self {
            Self::Single => 2,
            Self::Double => 1,
        }
    }

    /// Lines of the label box following each label
    const fn label_box_lines(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Arc,
    Lab,
}

/// Advances to the first line starting with one of `sections`.
fn find_section<L: LineSource + ?Sized>(
    lines: &mut L,
    sections: &[Section],
    cancel: &dyn Cancel,
) -> Result<Option<(Section, Precision)>> {
    let mut index = 0;
    while let Some(line) = lines.next_line()? {
        for &section in sections {
            let tag = match section {
                Section::Arc => "ARC",
                Section::Lab => "LAB",
            };
            if line.starts_with(tag) {
                return Ok(Some((section, Precision::of_section(line))));
            }
        }
        if index % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        index += 1;
    }
    Ok(None)
}

/// Reads the vertices of the next arc; `None` at the end of the section.
fn next_arc<L: LineSource + ?Sized>(lines: &mut L, precision: Precision) -> Result<Option<Vec<(f64, f64)>>> {
    let Some(line) = lines.next_line()? else {
        return Ok(None);
    };
    // coverage#, id, from node, to node, left polygon, right polygon, vertices
    let header: Vec<f64> = packed_numbers(line).take(7).collect();
    if header.len() != 7 || header[0] < 0.0 {
        return Ok(None);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = header[6].max(0.0) as usize;
    let mut points = Vec::new();
    let mut i = 0;
    while i < count {
        let Some(line) = lines.next_line()? else {
            break;
        };
        let values: Vec<f64> = packed_numbers(line).take(4).collect();
        points.extend(values.chunks_exact(2).map(|xy| (xy[0], xy[1])));
        i += precision.step();
    }
    Ok(Some(points))
}

/// Reads the next label point and skips its box; `None` at the end of the
/// section.
fn next_label<L: LineSource + ?Sized>(lines: &mut L, precision: Precision) -> Result<Option<(f64, f64)>> {
    let Some(line) = lines.next_line()? else {
        return Ok(None);
    };
    // id, polygon id, x, y
    let values: Vec<f64> = packed_numbers(line).take(4).collect();
    if values.len() != 4 || values[0] < 0.0 {
        return Ok(None);
    }
    for _ in 0..precision.label_box_lines() {
        lines.next_line()?;
    }
    Ok(Some((values[2], values[3])))
}

fn draw_arcs<L, S>(lines: &mut L, precision: Precision, surface: &mut S, cancel: &dyn Cancel) -> Result<()>
where
    L: LineSource + ?Sized,
    S: DrawSurface + ?Sized,
{
    let mut index = 0;
    while let Some(points) = next_arc(lines, precision)? {
        surface.begin_path();
        let mut started = false;
        for &(x, y) in points.iter().filter(|&&(x, y)| is_valid_coord(x) && is_valid_coord(y)) {
            if started {
                surface.line_to(x, y);
            } else {
                surface.move_to(x, y);
                started = true;
            }
        }
        surface.stroke_path();
        if index % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        index += 1;
    }
    debug!("drew {index} arcs");
    Ok(())
}

fn draw_labels<L, S>(
    lines: &mut L,
    precision: Precision,
    scale: f64,
    surface: &mut S,
    cancel: &dyn Cancel,
) -> Result<()>
where
    L: LineSource + ?Sized,
    S: DrawSurface + ?Sized,
{
    let mut labels = Vec::new();
    while let Some(label) = next_label(lines, precision)? {
        labels.push(label);
        if labels.len() % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
    }
    // the dot size depends on the number of labels
    let radius = circle_radius(labels.len(), scale);
    for (x, y) in labels {
        surface.fill_circle(x, y, radius);
    }
    Ok(())
}

/// Draws the first `ARC` or `LAB` section of `lines`, whichever comes first.
/// Arcs are stroked; labels become dots.
///
/// # Errors
///
/// [`Error::Cancelled`], I/O errors.
pub fn draw_e00<L, S>(lines: &mut L, scale: f64, surface: &mut S, cancel: &dyn Cancel) -> Result<()>
where
    L: LineSource + ?Sized,
    S: DrawSurface + ?Sized,
{
    surface.set_style(Style::line(scale));
    match find_section(lines, &[Section::Arc, Section::Lab], cancel)? {
        Some((Section::Arc, precision)) => draw_arcs(lines, precision, surface, cancel),
        Some((Section::Lab, precision)) => draw_labels(lines, precision, scale, surface, cancel),
        None => {
            debug!("no ARC or LAB section");
            Ok(())
        }
    }
}

/// Extent of an `ARC` (or `LAB`) section. A cancelled scan keeps what it
/// has seen.
fn section_extent<L: LineSource + ?Sized>(
    lines: &mut L,
    section: Section,
    precision: Precision,
    cancel: &dyn Cancel,
) -> Result<Bounds> {
    let mut bounds = Bounds::default();
    let mut index = 0;
    loop {
        match section {
            Section::Arc => {
                let Some(points) = next_arc(lines, precision)? else {
                    break;
                };
                for (x, y) in points {
                    if is_valid_coord(x) && is_valid_coord(y) {
                        bounds.include(x, y);
                    }
                }
            }
            Section::Lab => {
                let Some((x, y)) = next_label(lines, precision)? else {
                    break;
                };
                bounds.include(x, y);
            }
        }
        index += 1;
        if index % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            debug!("extent scan cancelled after {index} items");
            break;
        }
    }
    Ok(bounds)
}

/// Width in characters of one `BND` value, from its item definition line
fn item_width(line: &str) -> Result<usize> {
    // name, width, -1, position, -1, output width, decimals, type code
    let (_, rest) = line.trim_start().split_once(char::is_whitespace).ok_or(MISMATCH)?;
    let Some((width, _, _, _, _, _, kind)) = packed_numbers(rest).take(7).collect_tuple() else {
        return Err(MISMATCH);
    };
    #[allow(clippy::float_cmp)]
    let chars = match kind {
        t if t == 40.0 => 14,
        t if t == 50.0 && width == 2.0 => 6,
        t if t == 50.0 => 11,
        t if t == 60.0 && width == 4.0 => 14,
        t if t == 60.0 => 24,
        t => {
            trace!("unknown BND item type {t}");
            return Err(MISMATCH);
        }
    };
    Ok(chars)
}

/// Reads a `BND` info table: four item definitions followed by the
/// `xmin ymin xmax ymax` record, which may wrap onto a second line.
///
/// # Errors
///
/// [`Error::FormatMismatch`] for unknown item definitions or a short record,
/// [`Error::Truncated`] when lines run out.
pub fn read_bnd<L: LineSource + ?Sized>(lines: &mut L) -> Result<VectorExtent> {
    let mut length = 0;
    for _ in 0..4 {
        let line = lines.next_line()?.ok_or(Error::Truncated)?;
        length += item_width(line)?;
    }
    let mut record = lines.next_line()?.ok_or(Error::Truncated)?.to_owned();
    if length > record.len() {
        record.push_str(lines.next_line()?.ok_or(Error::Truncated)?);
    }
    let Some((x_min, y_min, x_max, y_max)) = packed_numbers(&record).take(4).collect_tuple() else {
        return Err(MISMATCH);
    };
    Ok(VectorExtent::new(x_min, y_min, x_max - x_min, y_max - y_min))
}

/// Data set name from the `EXP` line, e.g. `ROADS.E00` in
/// `EXP  0 /data/ROADS.E00`
fn data_set_name(line: &str) -> Option<&str> {
    let tail = line
        .rfind('/')
        .or_else(|| line.rfind('\\'))
        .map_or_else(|| line.split_whitespace().last(), |i| line.get(i + 1..));
    tail.and_then(|t| t.split_whitespace().next())
}

/// Searches for a `BND` table introduced by a line matching `is_bnd`.
/// Tables that fail to parse are skipped over.
fn find_bnd<L, F>(lines: &mut L, is_bnd: F, cancel: &dyn Cancel) -> Result<Option<VectorExtent>>
where
    L: LineSource + ?Sized,
    F: Fn(&str) -> bool,
{
    lines.rewind()?;
    let mut index = 0;
    while let Some(line) = lines.next_line()? {
        if is_bnd(line) {
            match read_bnd(lines) {
                Ok(extent) => return Ok(Some(extent)),
                Err(e) if e.is_mismatch() || matches!(e, Error::Truncated) => {
                    debug!("skipping unreadable BND table: {e}");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        if index % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        index += 1;
    }
    Ok(None)
}

/// Bounding box of E00 data.
///
/// Tried in order: the `<NAME>.BND` table named after the data set, any
/// `.BND ` table, the first `ARC` section with vertices, the first `LAB`
/// section. `BND` tables are only searched in exports.
///
/// # Errors
///
/// [`Error::FormatMismatch`] when the data set name is missing or too short,
/// [`Error::EmptyExtent`] without any usable geometry, [`Error::Cancelled`]
/// while searching.
pub fn e00_extent<L: LineSource + ?Sized>(
    lines: &mut L,
    origin: LineOrigin,
    cancel: &dyn Cancel,
) -> Result<VectorExtent> {
    lines.rewind()?;
    let first = lines.next_line()?.ok_or(MISMATCH)?;
    let name = data_set_name(first)
        .filter(|name| name.len() > 4)
        .ok_or(MISMATCH)?
        .to_owned();
    debug!("data set {name}");

    if origin == LineOrigin::Export {
        if let Ok(bnd) = change_extension(Path::new(&name), "BND") {
            let bnd = bnd.to_string_lossy().into_owned();
            if let Some(extent) = find_bnd(lines, |line| line.starts_with(&bnd), cancel)? {
                debug!("extent from {bnd}");
                return Ok(extent);
            }
        }
        if let Some(extent) = find_bnd(lines, |line| line.contains(".BND "), cancel)? {
            debug!("extent from BND table");
            return Ok(extent);
        }
    }

    for section in [Section::Arc, Section::Lab] {
        lines.rewind()?;
        if let Some((_, precision)) = find_section(lines, &[section], cancel)? {
            let bounds = section_extent(lines, section, precision, cancel)?;
            if let Some(extent) = bounds.extent() {
                debug!("extent from {section:?} section");
                return Ok(extent);
            }
        }
    }
    Err(Error::EmptyExtent)
}

/// Draws the E00 export at `path`
///
/// # Errors
///
/// See [`E00Lines::new`] and [`draw_e00`].
#[instrument(skip(surface, cancel))]
pub fn read_e00<S: DrawSurface + ?Sized>(
    path: &Path,
    scale: f64,
    surface: &mut S,
    cancel: &dyn Cancel,
) -> Result<()> {
    draw_e00(&mut E00Lines::open(path)?, scale, surface, cancel)
}

/// Extent of the E00 export at `path`
///
/// # Errors
///
/// See [`E00Lines::new`] and [`e00_extent`].
#[instrument(skip(cancel))]
pub fn read_e00_extent(path: &Path, cancel: &dyn Cancel) -> Result<VectorExtent> {
    e00_extent(&mut E00Lines::open(path)?, LineOrigin::Export, cancel)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        cancel::Never,
        vector::{DrawCommand, Sketch},
    };

    const ARC_END: &str = "        -1         0         0         0         0         0         0";

    fn lines(text: &str) -> anyhow::Result<E00Lines<Cursor<Vec<u8>>>> {
        Ok(E00Lines::new(Cursor::new(text.as_bytes().to_vec()))?)
    }

    fn single_precision_arcs() -> String {
        [
            "EXP  0 /home/data/ROADS.E00",
            "ARC  2",
            "         1         1         1         2         0         0         3",
            " 0.0000000E+00 0.0000000E+00 0.1000000E+01 0.1000000E+01",
            " 0.2000000E+01-0.1000000E+01",
            ARC_END,
            "EOS",
        ]
        .join("\n")
    }

    #[test]
    fn header_line_is_checked() {
        assert!(matches!(
            E00Lines::new(Cursor::new(b"NCOLS 3\n".to_vec())),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            E00Lines::new(Cursor::new(b"EXP  1 /x/Y.E00\n".to_vec())),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            E00Lines::new(Cursor::new(Vec::new())),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn lines_rewind() -> anyhow::Result<()> {
        let mut l = lines("EXP  0 /a/B.E00\r\nEOS\n")?;
        assert_eq!(l.next_line()?, Some("EXP  0 /a/B.E00"));
        assert_eq!(l.next_line()?, Some("EOS"));
        assert_eq!(l.next_line()?, None);
        l.rewind()?;
        assert_eq!(l.next_line()?, Some("EXP  0 /a/B.E00"));
        Ok(())
    }

    #[test]
    fn single_precision_arc() -> anyhow::Result<()> {
        let mut sketch = Sketch::new();
        draw_e00(&mut lines(&single_precision_arcs())?, 1.0, &mut sketch, &Never)?;
        assert_eq!(
            sketch.commands(),
            &[
                DrawCommand::SetStyle(Style::line(1.0)),
                DrawCommand::BeginPath,
                DrawCommand::MoveTo { x: 0.0, y: 0.0 },
                DrawCommand::LineTo { x: 1.0, y: 1.0 },
                DrawCommand::LineTo { x: 2.0, y: -1.0 },
                DrawCommand::StrokePath,
            ]
        );
        Ok(())
    }

    #[test]
    fn double_precision_arc_skips_invalid_vertices() -> anyhow::Result<()> {
        let text = [
            "EXP  0 /home/data/ROADS.E00",
            "ARC  3",
            "         1         1         1         2         0         0         3",
            " 0.100000000000000E+01 0.200000000000000E+01",
            " 0.100000000000000E+40 0.200000000000000E+01",
            " 0.300000000000000E+01 0.400000000000000E+01",
            ARC_END,
        ]
        .join("\n");
        let mut sketch = Sketch::new();
        draw_e00(&mut lines(&text)?, 1.0, &mut sketch, &Never)?;
        assert_eq!(
            &sketch.commands()[1..],
            &[
                DrawCommand::BeginPath,
                DrawCommand::MoveTo { x: 1.0, y: 2.0 },
                DrawCommand::LineTo { x: 3.0, y: 4.0 },
                DrawCommand::StrokePath,
            ]
        );
        Ok(())
    }

    #[test]
    fn labels_become_dots() -> anyhow::Result<()> {
        let text = [
            "EXP  0 /home/data/WELLS.E00",
            "LAB  2",
            "         1         0 0.5000000E+01 0.6000000E+01",
            " 0.4000000E+01 0.5000000E+01 0.6000000E+01 0.7000000E+01",
            "         2         0 0.7000000E+01 0.8000000E+01",
            " 0.6000000E+01 0.7000000E+01 0.8000000E+01 0.9000000E+01",
            "        -1         0 0.0000000E+00 0.0000000E+00",
        ]
        .join("\n");
        let mut sketch = Sketch::new();
        draw_e00(&mut lines(&text)?, 2.0, &mut sketch, &Never)?;
        assert_eq!(
            &sketch.commands()[1..],
            &[
                DrawCommand::FillCircle {
                    x: 5.0,
                    y: 6.0,
                    radius: 3.0
                },
                DrawCommand::FillCircle {
                    x: 7.0,
                    y: 8.0,
                    radius: 3.0
                },
            ]
        );
        assert_eq!(
            e00_extent(&mut lines(&text)?, LineOrigin::Export, &Never)?,
            VectorExtent::new(5.0, 6.0, 2.0, 2.0)
        );
        Ok(())
    }

    #[test]
    fn drawing_is_cancelled() -> anyhow::Result<()> {
        let result = draw_e00(
            &mut lines(&single_precision_arcs())?,
            1.0,
            &mut Sketch::new(),
            &|| true,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        Ok(())
    }

    const BND_ITEMS: &str = "\
XMIN              4-1  14-1  12 3 60-1  -1  -1-1                   1-
YMIN              4-1  54-1  12 3 60-1  -1  -1-1                   2-
XMAX              4-1  94-1  12 3 60-1  -1  -1-1                   3-
YMAX              4-1 134-1  12 3 60-1  -1  -1-1                   4-";

    #[test]
    fn extent_from_named_bnd() -> anyhow::Result<()> {
        let text = format!(
            "EXP  0 /home/data/PARKS.E00\nARC  2\n{ARC_END}\nIFO  2\n\
             OTHER.BND                 XX   4   4  16         1\n{BND_ITEMS}\n\
             \x20 0.9000000E+01 0.9000000E+01 0.9900000E+02 0.9900000E+02\n\
             PARKS.BND                 XX   4   4  16         1\n{BND_ITEMS}\n\
             \x20 0.1000000E+01 0.2000000E+01 0.5000000E+01 0.8000000E+01\nEOI\nEOS\n"
        );
        assert_eq!(
            e00_extent(&mut lines(&text)?, LineOrigin::Export, &Never)?,
            VectorExtent::new(1.0, 2.0, 4.0, 6.0)
        );
        Ok(())
    }

    #[test]
    fn extent_from_any_bnd_with_wrapped_record() -> anyhow::Result<()> {
        let items = BND_ITEMS.replace("  4-1", "  8-1");
        let text = format!(
            "EXP  0 /home/data/PARKS.E00\nIFO  3\n\
             COVER.BND                 XX   4   4  32         1\n{items}\n\
             \x20 0.100000000000000E+01 0.200000000000000E+01 0.500000000000000E+01\n\
             \x20 0.800000000000000E+01\nEOI\nEOS\n"
        );
        assert_eq!(
            e00_extent(&mut lines(&text)?, LineOrigin::Export, &Never)?,
            VectorExtent::new(1.0, 2.0, 4.0, 6.0)
        );
        // coverages never use BND tables
        assert!(matches!(
            e00_extent(&mut lines(&text)?, LineOrigin::Coverage, &Never),
            Err(Error::EmptyExtent)
        ));
        Ok(())
    }

    #[test]
    fn extent_from_arcs() -> anyhow::Result<()> {
        assert_eq!(
            e00_extent(&mut lines(&single_precision_arcs())?, LineOrigin::Export, &Never)?,
            VectorExtent::new(0.0, -1.0, 2.0, 2.0)
        );
        Ok(())
    }

    #[test]
    fn short_data_set_name() -> anyhow::Result<()> {
        let text = "EXP  0 /x/A.E0\nEOS\n";
        assert!(matches!(
            e00_extent(&mut lines(text)?, LineOrigin::Export, &Never),
            Err(Error::FormatMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn bnd_item_widths() -> anyhow::Result<()> {
        assert_eq!(item_width("XMIN  4-1  14-1  12 3 60-1  -1  -1-1   1-")?, 14);
        assert_eq!(item_width("XMIN  8-1  14-1  18 5 60-1  -1  -1-1   1-")?, 24);
        assert_eq!(item_width("ID    4-1   1-1   5-1 50-1  -1  -1-1   1-")?, 11);
        assert_eq!(item_width("ID    2-1   1-1   5-1 50-1  -1  -1-1   1-")?, 6);
        assert!(item_width("ID    2-1   1-1   5-1 20-1  -1  -1-1   1-").is_err());
        Ok(())
    }
}
