//! Strip cells tagged `hide` from a Jupyter notebook.

use std::io::stderr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fa2cf::notebook::strip_notebook;

#[derive(Parser, Debug)]
#[command(
    name = "stripnb",
    version,
    about = "Strip solution cells from a Jupyter notebook"
)]
struct Args {
    /// Input notebook with solutions
    input_path: PathBuf,

    /// Output notebook from which solutions are stripped
    output_path: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("FA2CF_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    strip_notebook(&args.input_path, &args.output_path)?;
    println!(
        "✅ Stripped notebook written to {}",
        args.output_path.display()
    );
    Ok(())
}
