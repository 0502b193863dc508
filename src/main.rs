use clap::Parser;
use kiln::{KilnError, WriterConfig, write_png_document};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Embeds PNG images into a PDF, one page per image.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about)]
struct Cli {
    /// PNG files, in page order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF path.
    #[arg(short, long)]
    output: PathBuf,

    /// JSON writer configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pack small objects into object streams.
    #[arg(long)]
    object_streams: bool,

    /// zlib compression level (0-9).
    #[arg(long)]
    level: Option<u32>,

    /// Document title.
    #[arg(long)]
    title: Option<String>,
}

fn main() -> Result<(), KilnError> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => WriterConfig::from_file(path)?,
        None => WriterConfig::default(),
    };
    if cli.object_streams {
        config.object_streams = true;
    }
    if let Some(level) = cli.level {
        config.compression_level = level;
    }

    let pngs = cli
        .inputs
        .iter()
        .map(|path| {
            log::debug!("Reading {}", path.display());
            fs::read(path)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sink = BufWriter::new(File::create(&cli.output)?);
    write_png_document(&pngs, sink, config, cli.title.as_deref())?;
    log::info!("Wrote {} pages to {}", pngs.len(), cli.output.display());
    Ok(())
}
