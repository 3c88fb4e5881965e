//! `.shp` records decoded through the `shapefile` crate and flattened into
//! the drawing model.
//!
//! Records are decoded one at a time; the whole dataset is never held in
//! memory. Z and M values are dropped.

use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use shapefile::{Point, PointM, PointZ, PolygonRing, Shape, ShapeReader, ShapeType};
use tracing::debug;

use crate::{Error, Result};

/// One decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum VectorRecord {
    /// record without geometry
    Null,
    /// single point
    Point {
        /// x
        x: f64,
        /// y
        y: f64,
    },
    /// unconnected points
    MultiPoint {
        /// vertices
        points: Vec<(f64, f64)>,
    },
    /// one or more lines
    Polyline {
        /// vertices of every part
        parts: Vec<Vec<(f64, f64)>>,
    },
    /// one or more rings, outer and inner alike
    Polygon {
        /// vertices of every ring
        rings: Vec<Vec<(f64, f64)>>,
    },
    /// surface patches, not drawn
    MultiPatch,
}

impl VectorRecord {
    /// Every vertex of the record
    pub fn vertices(&self) -> Box<dyn Iterator<Item = (f64, f64)> + '_> {
        match self {
            Self::Null | Self::MultiPatch => Box::new(std::iter::empty()),
            Self::Point { x, y } => Box::new(std::iter::once((*x, *y))),
            Self::MultiPoint { points } => Box::new(points.iter().copied()),
            Self::Polyline { parts: lines } | Self::Polygon { rings: lines } => {
                Box::new(lines.iter().flatten().copied())
            }
        }
    }
}

trait Xy {
    fn xy(&self) -> (f64, f64);
}

impl Xy for Point {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Xy for PointM {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Xy for PointZ {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

fn coords<P: Xy>(points: &[P]) -> Vec<(f64, f64)> {
    points.iter().map(Xy::xy).collect()
}

fn point<P: Xy>(p: &P) -> VectorRecord {
    let (x, y) = p.xy();
    VectorRecord::Point { x, y }
}

fn polyline<P: Xy>(parts: &[Vec<P>]) -> VectorRecord {
    VectorRecord::Polyline {
        parts: parts.iter().map(|part| coords(part)).collect(),
    }
}

fn polygon<P: Xy>(rings: &[PolygonRing<P>]) -> VectorRecord {
    VectorRecord::Polygon {
        rings: rings.iter().map(|ring| coords(ring.points())).collect(),
    }
}

impl From<&Shape> for VectorRecord {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::NullShape => Self::Null,
            Shape::Point(p) => point(p),
            Shape::PointM(p) => point(p),
            Shape::PointZ(p) => point(p),
            Shape::Multipoint(m) => Self::MultiPoint { points: coords(m.points()) },
            Shape::MultipointM(m) => Self::MultiPoint { points: coords(m.points()) },
            Shape::MultipointZ(m) => Self::MultiPoint { points: coords(m.points()) },
            Shape::Polyline(l) => polyline(l.parts()),
            Shape::PolylineM(l) => polyline(l.parts()),
            Shape::PolylineZ(l) => polyline(l.parts()),
            Shape::Polygon(p) => polygon(p.rings()),
            Shape::PolygonM(p) => polygon(p.rings()),
            Shape::PolygonZ(p) => polygon(p.rings()),
            Shape::Multipatch(_) => Self::MultiPatch,
        }
    }
}

/// Record by record `.shp` reader
pub struct ShapeStream<R> {
    reader: ShapeReader<R>,
}

impl ShapeStream<BufReader<File>> {
    /// Opens a `.shp` file
    ///
    /// # Errors
    ///
    /// I/O errors and the errors of [`ShapeStream::new`].
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> ShapeStream<R> {
    /// Reads the 100 byte main header
    ///
    /// # Errors
    ///
    /// [`Error::FormatMismatch`] for a wrong file code or shape type,
    /// [`Error::Truncated`] for a short header.
    pub fn new(reader: R) -> Result<Self> {
        let reader = ShapeReader::new(reader)?;
        debug!(
            "opened {:?} shapefile, box {:?}",
            reader.header().shape_type,
            reader.header().bbox
        );
        Ok(Self { reader })
    }

    /// Header box as `[xmin, ymin, xmax, ymax]`
    #[must_use]
    pub fn bbox(&self) -> [f64; 4] {
        let bbox = &self.reader.header().bbox;
        [bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y]
    }

    /// Shape type declared in the header
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        self.reader.header().shape_type
    }

    /// Whether the header declares filled polygons
    #[must_use]
    pub fn is_polygon(&self) -> bool {
        matches!(
            self.shape_type(),
            ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ
        )
    }

    /// Decodes the remaining records in file order
    pub fn records(&mut self) -> impl Iterator<Item = Result<VectorRecord>> + '_
    where
        R: Seek,
    {
        self.reader
            .iter_shapes()
            .map(|shape| shape.map(|s| VectorRecord::from(&s)).map_err(Error::from))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;

    /// Builds `.shp` bytes from raw record contents; the header box is taken
    /// verbatim so implausible boxes can be written
    pub(crate) fn shp_bytes(shape_type: i32, bbox: [f64; 4], records: &[Vec<u8>]) -> Vec<u8> {
        let body_len: usize = records.iter().map(|r| r.len() + 8).sum();
        let mut data = Vec::new();
        data.extend(9994i32.to_be_bytes());
        data.extend([0u8; 20]);
        data.extend(i32::try_from((100 + body_len) / 2).unwrap().to_be_bytes());
        data.extend(1000i32.to_le_bytes());
        data.extend(shape_type.to_le_bytes());
        for v in bbox {
            data.extend(v.to_le_bytes());
        }
        data.extend([0u8; 32]);
        for (i, record) in records.iter().enumerate() {
            data.extend(i32::try_from(i + 1).unwrap().to_be_bytes());
            data.extend(i32::try_from(record.len() / 2).unwrap().to_be_bytes());
            data.extend(record);
        }
        data
    }

    pub(crate) fn point(x: f64, y: f64) -> Vec<u8> {
        let mut r = 1i32.to_le_bytes().to_vec();
        r.extend(x.to_le_bytes());
        r.extend(y.to_le_bytes());
        r
    }

    pub(crate) fn null() -> Vec<u8> {
        0i32.to_le_bytes().to_vec()
    }

    pub(crate) fn poly(shape_type: i32, parts: &[i32], points: &[(f64, f64)]) -> Vec<u8> {
        let mut r = shape_type.to_le_bytes().to_vec();
        r.extend([0u8; 32]);
        r.extend(i32::try_from(parts.len()).unwrap().to_le_bytes());
        r.extend(i32::try_from(points.len()).unwrap().to_le_bytes());
        for p in parts {
            r.extend(p.to_le_bytes());
        }
        for (x, y) in points {
            r.extend(x.to_le_bytes());
            r.extend(y.to_le_bytes());
        }
        r
    }

    #[test]
    fn polylines_keep_their_parts() -> anyhow::Result<()> {
        let data = shp_bytes(
            3,
            [0.0, 0.0, 4.0, 4.0],
            &[
                poly(3, &[0, 2], &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (4.0, 4.0)]),
                null(),
            ],
        );
        let mut stream = ShapeStream::new(Cursor::new(data))?;
        assert_eq!(stream.shape_type(), ShapeType::Polyline);
        assert!(!stream.is_polygon());
        assert_eq!(stream.bbox(), [0.0, 0.0, 4.0, 4.0]);
        let records = stream.records().collect::<Result<Vec<_>>>()?;
        assert_eq!(
            records,
            vec![
                VectorRecord::Polyline {
                    parts: vec![vec![(0.0, 0.0), (1.0, 1.0)], vec![(2.0, 2.0), (4.0, 4.0)]]
                },
                VectorRecord::Null,
            ]
        );
        assert_eq!(records[0].vertices().count(), 4);
        Ok(())
    }

    #[test]
    fn multipoints() -> anyhow::Result<()> {
        let mut multi = 8i32.to_le_bytes().to_vec();
        multi.extend([0u8; 32]);
        multi.extend(2i32.to_le_bytes());
        for v in [1.0f64, 2.0, 3.0, 4.0] {
            multi.extend(v.to_le_bytes());
        }
        let mut stream = ShapeStream::new(Cursor::new(shp_bytes(8, [1.0, 2.0, 3.0, 4.0], &[multi])))?;
        let records = stream.records().collect::<Result<Vec<_>>>()?;
        assert_eq!(
            records,
            vec![VectorRecord::MultiPoint {
                points: vec![(1.0, 2.0), (3.0, 4.0)]
            }]
        );
        Ok(())
    }

    #[test]
    fn polygons_keep_every_ring() -> anyhow::Result<()> {
        let square = [(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)];
        let hole = [(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)];
        let points = [&square[..], &hole[..]].concat();
        let data = shp_bytes(5, [0.0, 0.0, 4.0, 4.0], &[poly(5, &[0, 5], &points)]);
        let mut stream = ShapeStream::new(Cursor::new(data))?;
        assert!(stream.is_polygon());
        let records = stream.records().collect::<Result<Vec<_>>>()?;
        let [VectorRecord::Polygon { rings }] = &records[..] else {
            panic!("expected one polygon, got {records:?}");
        };
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[1].len(), 4);
        Ok(())
    }

    #[test]
    fn rejects_and_truncates() -> anyhow::Result<()> {
        assert!(matches!(
            ShapeStream::new(Cursor::new(vec![0u8; 100])),
            Err(Error::FormatMismatch(_))
        ));
        assert!(ShapeStream::new(Cursor::new(vec![0u8; 10])).is_err());

        let mut data = shp_bytes(1, [0.0; 4], &[point(1.0, 2.0)]);
        data.truncate(data.len() - 4);
        let mut stream = ShapeStream::new(Cursor::new(data))?;
        let first = stream.records().next();
        assert!(matches!(first, Some(Err(Error::Truncated))));
        Ok(())
    }
}
