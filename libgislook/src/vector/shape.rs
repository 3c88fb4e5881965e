//! Extent and sketch of ESRI shapefiles.

use std::{
    fs,
    io::{Read, Seek},
    path::Path,
};

use tracing::{debug, instrument, trace};

use super::{
    circle_radius, is_valid_coord,
    shp::{ShapeStream, VectorRecord},
    Bounds, DrawSurface, Style, VectorExtent,
};
use crate::{cancel::Cancel, path::change_extension, Error, Result};

/// Header boxes with any value beyond this are ignored
const MAX_COORD: f64 = 1e20;
const DRAW_STRIDE: usize = 20;
const EXTENT_STRIDE: usize = 50;
const SHX_HEADER_LEN: u64 = 100;
const SHX_RECORD_LEN: u64 = 8;

fn bbox_extent([x_min, y_min, x_max, y_max]: [f64; 4]) -> Option<VectorExtent> {
    let e = VectorExtent::new(x_min, y_min, x_max - x_min, y_max - y_min);
    let finite = [e.x, e.y, e.width, e.height].iter().all(|v| v.is_finite());
    let in_range = [e.x, e.y, e.width, e.height]
        .iter()
        .all(|v| v.abs() <= MAX_COORD);
    (finite && in_range && e.width > 0.0 && e.height > 0.0).then_some(e)
}

fn include_record(bounds: &mut Bounds, record: &VectorRecord) {
    for (x, y) in record.vertices() {
        bounds.include(x, y);
    }
}

/// Bounding box of a shapefile stream.
///
/// The header box is used when it is plausible. Otherwise every record is
/// scanned; a cancelled scan returns the box of the records seen so far and a
/// file without geometry yields a zero extent.
///
/// # Errors
///
/// Header and record decoding errors, [`Error::EmptyExtent`] if the result
/// has a negative size.
pub fn shape_extent<R: Read + Seek>(mut stream: ShapeStream<R>, cancel: &dyn Cancel) -> Result<VectorExtent> {
    if let Some(extent) = bbox_extent(stream.bbox()) {
        return Ok(extent);
    }
    debug!("implausible header box {:?}, scanning records", stream.bbox());
    let mut bounds = Bounds::default();
    for (index, record) in stream.records().enumerate() {
        if index % EXTENT_STRIDE == 0 && cancel.is_cancelled() {
            debug!("extent scan cancelled after {index} records");
            break;
        }
        include_record(&mut bounds, &record?);
    }
    let extent = bounds.extent().unwrap_or_default();
    if extent.width < 0.0 || extent.height < 0.0 {
        return Err(Error::EmptyExtent);
    }
    Ok(extent)
}

/// Number of records, from the `.shx` index next to `path` or by counting
/// records when there is none.
///
/// # Errors
///
/// I/O and decoding errors while counting.
pub fn record_count(path: &Path) -> Result<usize> {
    if let Ok(len) = change_extension(path, "shx").and_then(|shx| Ok(fs::metadata(shx)?.len())) {
        if len >= SHX_HEADER_LEN {
            let count = (len - SHX_HEADER_LEN) / SHX_RECORD_LEN;
            trace!("{count} records from index");
            return usize::try_from(count).map_err(|_| Error::FormatMismatch("shapefile"));
        }
    }
    let mut stream = ShapeStream::open(path)?;
    let count = stream.records().try_fold(0, |count, record| record.map(|_| count + 1))?;
    trace!("{count} records counted");
    Ok(count)
}

/// Emits one subpath per part. Polygons close each subpath.
fn emit_parts<S: DrawSurface + ?Sized>(surface: &mut S, parts: &[Vec<(f64, f64)>], close: bool) {
    surface.begin_path();
    for part in parts {
        let Some((&(x, y), rest)) = part.split_first() else {
            continue;
        };
        surface.move_to(x, y);
        for &(x, y) in rest {
            surface.line_to(x, y);
        }
        if close {
            surface.close_path();
        }
    }
    if close {
        surface.fill_stroke_path();
    } else {
        surface.stroke_path();
    }
}

/// Replays every record of `stream` onto `surface`.
///
/// `count` is the number of records in the file and sizes point dots;
/// `scale` is canvas units per source unit.
///
/// # Errors
///
/// [`Error::Cancelled`] when cancelled between records, decoding errors from
/// [`ShapeStream`].
pub fn draw_shapes<R: Read + Seek, S: DrawSurface + ?Sized>(
    mut stream: ShapeStream<R>,
    count: usize,
    scale: f64,
    surface: &mut S,
    cancel: &dyn Cancel,
) -> Result<()> {
    let radius = circle_radius(count, scale);
    let shape_type = stream.shape_type();
    let style = if stream.is_polygon() {
        Style::polygon(scale)
    } else {
        Style::line(scale)
    };
    surface.set_style(style);

    let mut index = 0;
    for record in stream.records() {
        if index % DRAW_STRIDE == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        index += 1;
        let record = record?;
        let close = matches!(record, VectorRecord::Polygon { .. });
        match record {
            VectorRecord::Null | VectorRecord::MultiPatch => {}
            VectorRecord::Point { x, y } => surface.fill_circle(x, y, radius),
            VectorRecord::MultiPoint { points } => {
                for (x, y) in points {
                    surface.fill_circle(x, y, radius);
                }
            }
            VectorRecord::Polyline { parts: lines } | VectorRecord::Polygon { rings: lines } => {
                if !lines.iter().flatten().all(|&(x, y)| is_valid_coord(x) && is_valid_coord(y)) {
                    trace!("record {index} dropped, coordinate out of range");
                    continue;
                }
                emit_parts(surface, &lines, close);
            }
        }
    }
    debug!("drew {index} records of type {shape_type:?}");
    Ok(())
}

/// Extent of the shapefile at `path`
///
/// # Errors
///
/// See [`shape_extent`].
#[instrument(skip(cancel))]
pub fn read_shape_extent(path: &Path, cancel: &dyn Cancel) -> Result<VectorExtent> {
    shape_extent(ShapeStream::open(path)?, cancel)
}

/// Draws the shapefile at `path`
///
/// # Errors
///
/// See [`draw_shapes`] and [`record_count`].
#[instrument(skip(surface, cancel))]
pub fn read_shape<S: DrawSurface + ?Sized>(
    path: &Path,
    scale: f64,
    surface: &mut S,
    cancel: &dyn Cancel,
) -> Result<()> {
    let count = record_count(path)?;
    draw_shapes(ShapeStream::open(path)?, count, scale, surface, cancel)
}
