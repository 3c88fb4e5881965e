use gislook::{default_output, describe, preview};
use libgislook::{sampling::DEFAULT_MAX_GRID_SIZE, ContentType, DecodeOptions};
use std::path::PathBuf;
use tracing::Level;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// renders a grid or vector file to a grayscale PNG preview
    Preview {
        /// The GIS file
        file: PathBuf,

        /// The output file name
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Uniform type identifier, e.g. com.esri.shape
        #[arg(long)]
        content_type: Option<ContentType>,

        /// Largest preview width or height for grids
        #[arg(long, default_value_t = DEFAULT_MAX_GRID_SIZE)]
        max_size: u32,
    },

    /// prints the grid size or vector extent
    Size {
        /// The GIS file
        file: PathBuf,

        /// Uniform type identifier, e.g. com.esri.e00
        #[arg(long)]
        content_type: Option<ContentType>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_file(true)
        .with_line_number(true)
        .init();

    match cli.command {
        Commands::Preview {
            file,
            output,
            content_type,
            max_size,
        } => {
            let output = match output {
                Some(o) => o,
                None => default_output(&file)?,
            };
            let options = DecodeOptions::builder()
                .maybe_content_type(content_type)
                .max_grid_size(max_size)
                .build();
            preview(&file, &output, &options)?;
        }
        Commands::Size { file, content_type } => {
            let options = DecodeOptions::builder()
                .maybe_content_type(content_type)
                .build();
            println!("{}", describe(&file, &options)?);
        }
    }
    Ok(())
}
