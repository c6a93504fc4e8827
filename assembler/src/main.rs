use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

/// Assembles Hack assembly (.asm) into Hack machine code (.hack).
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Assembly source files
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Print progress
    #[arg(short, long)]
    verbose: bool,
}

// The output file is only created once the whole source has assembled.
fn assemble_file(filename: &Path) -> Result<PathBuf> {
    let source = fs::read(filename).with_context(|| format!("reading {}", filename.display()))?;
    let mut words = Vec::new();
    assembler::assemble(&source, |v| words.push(v))
        .with_context(|| format!("assembling {}", filename.display()))?;

    let output = filename.with_extension("hack");
    let mut out = BufWriter::new(
        fs::File::create(&output).with_context(|| format!("creating {}", output.display()))?,
    );
    for word in &words {
        writeln!(out, "{:016b}", word)?;
    }
    out.flush()?;
    info!(words = words.len(), "wrote {}", output.display());
    Ok(output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    for filename in &cli.sources {
        assemble_file(filename)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Add.asm");
        fs::write(&path, "@2\nD=A\n@3\nD=D+A\n@0\nM=D\n").unwrap();
        let output = assemble_file(&path).unwrap();
        assert_eq!(output, dir.path().join("Add.hack"));
        let hack = fs::read_to_string(output).unwrap();
        let lines: Vec<_> = hack.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "0000000000000010");
        assert_eq!(lines[5], "1110001100001000");
    }

    #[test]
    fn test_failed_assembly_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bad.asm");
        fs::write(&path, "@1\nD=D*A\n").unwrap();
        assert!(assemble_file(&path).is_err());
        assert!(!dir.path().join("Bad.hack").exists());
    }
}
