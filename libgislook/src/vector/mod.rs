//! Vector readers and the drawing boundary they emit to.
//!
//! Readers never rasterize. They compute a [`VectorExtent`] or replay their
//! geometry, in source coordinates, against a [`DrawSurface`] supplied by the
//! caller. [`Viewport`] maps source coordinates onto a bounded canvas.

use crate::{Error, Result};

pub mod e00;
pub mod shape;
pub mod shp;

/// Largest canvas side, border excluded
pub const MAX_CANVAS_SIZE: f64 = 1000.0;
/// Smallest canvas side, border excluded
pub const MIN_CANVAS_SIZE: f64 = 10.0;
/// Blank margin around the drawing
pub const BORDER: f64 = 7.0;
const LINE_WIDTH: f64 = 1.0;

/// Axis aligned bounding box in source units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VectorExtent {
    /// left edge
    pub x: f64,
    /// bottom edge
    pub y: f64,
    /// extent along x
    pub width: f64,
    /// extent along y
    pub height: f64,
}

impl VectorExtent {
    /// Creates an extent
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Running bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }
}

impl Bounds {
    /// Grows the box to hold `(x, y)`. Non-finite values are ignored.
    pub fn include(&mut self, x: f64, y: f64) {
        if x.is_finite() {
            self.min_x = self.min_x.min(x);
            self.max_x = self.max_x.max(x);
        }
        if y.is_finite() {
            self.min_y = self.min_y.min(y);
            self.max_y = self.max_y.max(y);
        }
    }

    /// Grows the box to hold `other`
    pub fn merge(&mut self, other: &Self) {
        self.include(other.min_x, other.min_y);
        self.include(other.max_x, other.max_y);
    }

    /// The box as an extent, `None` while nothing was included
    #[must_use]
    pub fn extent(&self) -> Option<VectorExtent> {
        (self.min_x <= self.max_x && self.min_y <= self.max_y).then(|| {
            VectorExtent::new(
                self.min_x,
                self.min_y,
                self.max_x - self.min_x,
                self.max_y - self.min_y,
            )
        })
    }
}

/// Whether a coordinate can be drawn
#[must_use]
pub fn is_valid_coord(c: f64) -> bool {
    c.abs() < f64::from(f32::MAX)
}

/// Dot radius in source units for `count` points drawn at `scale`
#[must_use]
pub fn circle_radius(count: usize, scale: f64) -> f64 {
    let radius = match count {
        0..=25 => 6.0,
        26..=200 => 3.0,
        201..=1000 => 1.5,
        _ => 1.0,
    };
    radius / scale
}

/// Paint and line width for the following paths, gray levels 0 (black) to
/// 255 (white)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    /// fill gray level
    pub fill: u8,
    /// stroke gray level
    pub stroke: u8,
    /// stroke width in source units
    pub line_width: f64,
}

impl Style {
    /// Black fill outlined in white
    #[must_use]
    pub fn polygon(scale: f64) -> Self {
        Self {
            fill: 0,
            stroke: 255,
            line_width: LINE_WIDTH / scale / 2.0,
        }
    }

    /// Black lines and dots
    #[must_use]
    pub fn line(scale: f64) -> Self {
        Self {
            fill: 0,
            stroke: 0,
            line_width: LINE_WIDTH / scale,
        }
    }
}

/// Drawing capability supplied by the caller. Coordinates are in source units.
pub trait DrawSurface {
    /// Sets paint and width for subsequent drawing
    fn set_style(&mut self, style: Style);
    /// Starts a new, empty path
    fn begin_path(&mut self);
    /// Starts a subpath at `(x, y)`
    fn move_to(&mut self, x: f64, y: f64);
    /// Extends the current subpath to `(x, y)`
    fn line_to(&mut self, x: f64, y: f64);
    /// Closes the current subpath
    fn close_path(&mut self);
    /// Strokes and discards the path
    fn stroke_path(&mut self);
    /// Fills, strokes and discards the path
    fn fill_stroke_path(&mut self);
    /// Fills a dot centred on `(x, y)`
    fn fill_circle(&mut self, x: f64, y: f64, radius: f64);
}

/// One recorded [`DrawSurface`] call
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DrawCommand {
    SetStyle(Style),
    BeginPath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    ClosePath,
    StrokePath,
    FillStrokePath,
    FillCircle { x: f64, y: f64, radius: f64 },
}

/// A [`DrawSurface`] that records every call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sketch {
    commands: Vec<DrawCommand>,
}

impl Sketch {
    /// Creates an empty sketch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded calls in order
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Replays the recorded calls onto `surface`
    pub fn replay<S: DrawSurface + ?Sized>(&self, surface: &mut S) {
        for command in &self.commands {
            match *command {
                DrawCommand::SetStyle(style) => surface.set_style(style),
                DrawCommand::BeginPath => surface.begin_path(),
                DrawCommand::MoveTo { x, y } => surface.move_to(x, y),
                DrawCommand::LineTo { x, y } => surface.line_to(x, y),
                DrawCommand::ClosePath => surface.close_path(),
                DrawCommand::StrokePath => surface.stroke_path(),
                DrawCommand::FillStrokePath => surface.fill_stroke_path(),
                DrawCommand::FillCircle { x, y, radius } => surface.fill_circle(x, y, radius),
            }
        }
    }
}

impl DrawSurface for Sketch {
    fn set_style(&mut self, style: Style) {
        self.commands.push(DrawCommand::SetStyle(style));
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(DrawCommand::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(DrawCommand::LineTo { x, y });
    }

    fn close_path(&mut self) {
        self.commands.push(DrawCommand::ClosePath);
    }

    fn stroke_path(&mut self) {
        self.commands.push(DrawCommand::StrokePath);
    }

    fn fill_stroke_path(&mut self) {
        self.commands.push(DrawCommand::FillStrokePath);
    }

    fn fill_circle(&mut self, x: f64, y: f64, radius: f64) {
        self.commands.push(DrawCommand::FillCircle { x, y, radius });
    }
}

/// Mapping from a source extent onto a canvas of at most
/// [`MAX_CANVAS_SIZE`] units plus a [`BORDER`] on every side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    extent: VectorExtent,
    scale: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    /// Fits `extent` into the canvas. A zero width or height is widened to
    /// [`MIN_CANVAS_SIZE`] source units around the original position.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyExtent`] when the extent is negative or not finite, or
    /// when the scaled drawing would be smaller than [`MIN_CANVAS_SIZE`].
    pub fn fit(extent: VectorExtent) -> Result<Self> {
        let mut e = extent;
        let finite = [e.x, e.y, e.width, e.height].iter().all(|v| v.is_finite());
        if !finite || e.width < 0.0 || e.height < 0.0 {
            return Err(Error::EmptyExtent);
        }
        if e.width == 0.0 {
            e.width = MIN_CANVAS_SIZE;
            e.x -= MIN_CANVAS_SIZE / 2.0;
        }
        if e.height == 0.0 {
            e.height = MIN_CANVAS_SIZE;
            e.y -= MIN_CANVAS_SIZE / 2.0;
        }
        let scale = (MAX_CANVAS_SIZE / e.width).min(MAX_CANVAS_SIZE / e.height);
        let width = e.width * scale;
        let height = e.height * scale;
        if width < MIN_CANVAS_SIZE || height < MIN_CANVAS_SIZE {
            return Err(Error::EmptyExtent);
        }
        Ok(Self {
            extent: e,
            scale,
            width,
            height,
        })
    }

    /// Canvas units per source unit
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// The extent after widening
    #[must_use]
    pub const fn extent(&self) -> VectorExtent {
        self.extent
    }

    /// Canvas `(width, height)` including the border
    #[must_use]
    pub fn canvas_size(&self) -> (f64, f64) {
        (self.width + 2.0 * BORDER, self.height + 2.0 * BORDER)
    }

    /// Maps a source point to canvas units with y pointing down
    #[must_use]
    pub fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        let cx = (x - self.extent.x).mul_add(self.scale, BORDER);
        let cy = (y - self.extent.y).mul_add(self.scale, BORDER);
        (cx, self.height + 2.0 * BORDER - cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_steps() {
        assert_eq!(circle_radius(1, 1.0), 6.0);
        assert_eq!(circle_radius(25, 2.0), 3.0);
        assert_eq!(circle_radius(26, 1.0), 3.0);
        assert_eq!(circle_radius(200, 1.0), 3.0);
        assert_eq!(circle_radius(201, 1.0), 1.5);
        assert_eq!(circle_radius(1000, 1.0), 1.5);
        assert_eq!(circle_radius(1001, 0.5), 2.0);
    }

    #[test]
    fn coordinate_validity() {
        assert!(is_valid_coord(1e30));
        assert!(!is_valid_coord(f64::from(f32::MAX)));
        assert!(!is_valid_coord(-1e39));
        assert!(!is_valid_coord(f64::NAN));
    }

    #[test]
    fn bounds() {
        let mut b = Bounds::default();
        assert_eq!(b.extent(), None);
        b.include(3.0, -1.0);
        b.include(-2.0, 4.0);
        b.include(f64::NAN, 0.0);
        assert_eq!(b.extent(), Some(VectorExtent::new(-2.0, -1.0, 5.0, 5.0)));
    }

    #[test]
    fn viewport_scales_and_flips() -> anyhow::Result<()> {
        let v = Viewport::fit(VectorExtent::new(100.0, 200.0, 50.0, 25.0))?;
        assert_eq!(v.scale(), 20.0);
        assert_eq!(v.canvas_size(), (1014.0, 514.0));
        assert_eq!(v.to_canvas(100.0, 200.0), (7.0, 507.0));
        assert_eq!(v.to_canvas(150.0, 225.0), (1007.0, 7.0));
        Ok(())
    }

    #[test]
    fn viewport_widens_degenerate_extents() -> anyhow::Result<()> {
        let v = Viewport::fit(VectorExtent::new(10.0, 20.0, 0.0, 0.0))?;
        assert_eq!(v.extent(), VectorExtent::new(5.0, 15.0, 10.0, 10.0));
        assert_eq!(v.scale(), 100.0);
        Ok(())
    }

    #[test]
    fn viewport_rejects_bad_extents() {
        assert!(matches!(
            Viewport::fit(VectorExtent::new(0.0, 0.0, -1.0, 1.0)),
            Err(Error::EmptyExtent)
        ));
        // 1000:1 aspect leaves less than the minimum on the short side
        assert!(matches!(
            Viewport::fit(VectorExtent::new(0.0, 0.0, 100_000.0, 1.0)),
            Err(Error::EmptyExtent)
        ));
        assert!(matches!(
            Viewport::fit(VectorExtent::new(f64::INFINITY, 0.0, 1.0, 1.0)),
            Err(Error::EmptyExtent)
        ));
    }

    #[test]
    fn sketch_replays_into_another_surface() {
        let mut a = Sketch::new();
        a.set_style(Style::line(2.0));
        a.begin_path();
        a.move_to(0.0, 0.0);
        a.line_to(1.0, 1.0);
        a.stroke_path();
        a.fill_circle(1.0, 2.0, 3.0);
        let mut b = Sketch::new();
        a.replay(&mut b);
        assert_eq!(a, b);
        assert_eq!(b.commands()[0], DrawCommand::SetStyle(Style::line(2.0)));
    }
}
