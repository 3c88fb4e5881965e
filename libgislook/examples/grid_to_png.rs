/// Demonstrates how to turn a grid into a png preview using the [`image`] crate.
///
/// Pass the grid as the first argument.
///
use image::{codecs::png::PngEncoder, ImageEncoder};
use libgislook::{decode_raster, DecodeOptions, Never};
use std::{fs::File, path::PathBuf};

fn main() -> anyhow::Result<()> {
    let Some(input) = std::env::args().nth(1).map(PathBuf::from) else {
        anyhow::bail!("usage: grid_to_png <grid>");
    };
    let preview = decode_raster(&input, &DecodeOptions::default(), &Never)?;
    println!("{} grid", preview.format);

    let output = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open("grid_to_png_example.png")?;

    let encoder = PngEncoder::new(output);
    encoder.write_image(
        preview.image.as_raw(),
        preview.image.width(),
        preview.image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(())
}
