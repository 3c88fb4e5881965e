use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use image::{codecs::png::PngEncoder, GrayImage, ImageEncoder, Luma};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut},
    point::Point,
};
use libgislook::{
    decode_raster, raster_size, read_vector, vector_extent,
    vector::{DrawSurface, Style, Viewport},
    ContentType, DecodeOptions, Never,
};
use tracing::{debug, info, instrument};

/// `<dir>/<stem>.png` next to `input`
pub fn default_output(input: &Path) -> Result<PathBuf> {
    let mut output = PathBuf::new();
    let Some(dir) = input.parent() else {
        bail!("Invalid input file");
    };
    let Some(Some(filename)) = input.file_stem().map(|os| os.to_str()) else {
        bail!("Invalid input file");
    };
    output.push(dir);
    output.push(format!("{filename}.png"));
    info!("output name: {}", output.display());
    Ok(output)
}

fn write_png(image: &GrayImage, output_name: &Path) -> Result<()> {
    let output = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(output_name)?;
    let encoder = PngEncoder::new(output);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    info!("Successfully wrote preview to {}", output_name.display());
    Ok(())
}

#[instrument(skip(options))]
pub fn raster_to_png(input: &Path, output_name: &Path, options: &DecodeOptions) -> Result<()> {
    let preview = decode_raster(input, options, &Never)?;
    debug!(
        "Decoded {} preview of {:?}",
        preview.format,
        preview.image.dimensions()
    );
    write_png(&preview.image, output_name)
}

#[instrument]
pub fn vector_to_png(input: &Path, output_name: &Path, content_type: ContentType) -> Result<()> {
    let extent = vector_extent(input, content_type, &Never)?;
    debug!("Vector extent {extent:?}");
    let viewport = Viewport::fit(extent)?;
    let mut canvas = CanvasSurface::new(viewport);
    read_vector(input, content_type, viewport.scale(), &mut canvas, &Never)?;
    write_png(&canvas.into_image(), output_name)
}

/// Writes a PNG preview of `input`, drawing vector content types and
/// decoding everything else as a grid
pub fn preview(input: &Path, output_name: &Path, options: &DecodeOptions) -> Result<()> {
    match options.content_type_for(input) {
        Some(content_type) if content_type.is_vector() => {
            vector_to_png(input, output_name, content_type)
        }
        _ => raster_to_png(input, output_name, options),
    }
}

/// One line summary of the grid size or vector extent of `input`
pub fn describe(input: &Path, options: &DecodeOptions) -> Result<String> {
    if let Some(content_type) = options
        .content_type_for(input)
        .filter(|t| t.is_vector())
    {
        let e = vector_extent(input, content_type, &Never)?;
        return Ok(format!(
            "{content_type}: x {} y {} width {} height {}",
            e.x, e.y, e.width, e.height
        ));
    }
    let (format, size) = raster_size(input, options)?;
    let (width, height) = size.resampled(&options.decimation());
    Ok(format!(
        "{format}: {}x{} (preview {width}x{height})",
        size.width, size.height
    ))
}

/// [`DrawSurface`] rasterizing onto a white grayscale canvas
pub struct CanvasSurface {
    image: GrayImage,
    viewport: Viewport,
    style: Style,
    subpaths: Vec<Vec<(f32, f32)>>,
}

impl CanvasSurface {
    pub fn new(viewport: Viewport) -> Self {
        let (width, height) = viewport.canvas_size();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (width, height) = (width.ceil() as u32, height.ceil() as u32);
        Self {
            image: GrayImage::from_pixel(width, height, Luma([255])),
            viewport,
            style: Style::line(viewport.scale()),
            subpaths: Vec::new(),
        }
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    #[allow(clippy::cast_possible_truncation)]
    fn point(&self, x: f64, y: f64) -> (f32, f32) {
        let (x, y) = self.viewport.to_canvas(x, y);
        (x as f32, y as f32)
    }

    fn stroke(&mut self) {
        let color = Luma([self.style.stroke]);
        for subpath in &self.subpaths {
            for pair in subpath.windows(2) {
                draw_line_segment_mut(&mut self.image, pair[0], pair[1], color);
            }
        }
    }
}

impl DrawSurface for CanvasSurface {
    fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    fn begin_path(&mut self) {
        self.subpaths.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        let p = self.point(x, y);
        self.subpaths.push(vec![p]);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let p = self.point(x, y);
        match self.subpaths.last_mut() {
            Some(subpath) => subpath.push(p),
            None => self.subpaths.push(vec![p]),
        }
    }

    fn close_path(&mut self) {
        if let Some(subpath) = self.subpaths.last_mut() {
            if let (Some(&first), Some(&last)) = (subpath.first(), subpath.last()) {
                if first != last {
                    subpath.push(first);
                }
            }
        }
    }

    fn stroke_path(&mut self) {
        self.stroke();
        self.subpaths.clear();
    }

    fn fill_stroke_path(&mut self) {
        let color = Luma([self.style.fill]);
        for subpath in &self.subpaths {
            #[allow(clippy::cast_possible_truncation)]
            let mut polygon: Vec<Point<i32>> = subpath
                .iter()
                .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
                .collect();
            polygon.dedup();
            // the polygon is closed implicitly
            if polygon.len() > 1 && polygon.first() == polygon.last() {
                polygon.pop();
            }
            if polygon.len() >= 3 {
                draw_polygon_mut(&mut self.image, &polygon, color);
            }
        }
        self.stroke();
        self.subpaths.clear();
    }

    #[allow(clippy::cast_possible_truncation)]
    fn fill_circle(&mut self, x: f64, y: f64, radius: f64) {
        let (cx, cy) = self.point(x, y);
        let r = (radius * self.viewport.scale()).round().max(1.0) as i32;
        draw_filled_circle_mut(
            &mut self.image,
            (cx.round() as i32, cy.round() as i32),
            r,
            Luma([self.style.fill]),
        );
    }
}
