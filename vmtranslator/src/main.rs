use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use vmtranslator::Config;

/// Translates VM IL (.vm) into Hack assembly (.asm).
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// A .vm file, or a directory whose .vm files are translated into one output
    source: PathBuf,

    /// Output path (defaults to <file>.asm, or <dir>/<dir>.asm for a directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the SP setup and `call Sys.init 0`
    #[arg(long)]
    no_bootstrap: bool,

    /// Write each VM command as a comment above its code
    #[arg(long)]
    annotate: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .with_writer(std::io::stderr)
        .init();

    let config = Config {
        source: cli.source,
        output: cli.output,
        bootstrap: !cli.no_bootstrap,
        annotate: cli.annotate,
    };
    let output = vmtranslator::driver::run(&config)
        .with_context(|| format!("translating {}", config.source.display()))?;
    println!("Translation complete. Output is '{}'", output.display());
    Ok(())
}
