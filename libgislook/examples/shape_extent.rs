/// Prints the extent of a shapefile and the drawing calls of its sketch
///
use libgislook::{
    read_vector, vector::{Sketch, Viewport}, vector_extent, CancelFlag, ContentType,
};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let Some(input) = std::env::args().nth(1).map(PathBuf::from) else {
        anyhow::bail!("usage: shape_extent <shapefile>");
    };
    let cancel = CancelFlag::new();
    let extent = vector_extent(&input, ContentType::Shape, &cancel)?;
    println!("{extent:?}");

    let viewport = Viewport::fit(extent)?;
    let mut sketch = Sketch::new();
    read_vector(&input, ContentType::Shape, viewport.scale(), &mut sketch, &cancel)?;
    for command in sketch.commands() {
        println!("{command:?}");
    }
    Ok(())
}
