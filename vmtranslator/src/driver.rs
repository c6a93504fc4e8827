//! Runs a whole translation: source discovery, output naming and file order.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codegen::CodeWriter;
use crate::command::Instruction;
use crate::config::Config;
use crate::error::{Error, Result, TranslateError};
use crate::parser::CommandParser;
use crate::token::is_symbol;

pub const SOURCE_EXT: &str = "vm";
pub const OUTPUT_EXT: &str = "asm";

/// The files of one run and where their combined output goes.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan {
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
}

fn is_vm_file(path: &Path) -> bool {
    path.is_file() && path.extension() == Some(OsStr::new(SOURCE_EXT))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

// The file stem names the unit's statics and its labels outside any function.
fn unit_name(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(OsStr::to_str)
        .filter(|name| is_symbol(name))
        .ok_or_else(|| Error::InvalidName(path.to_path_buf()))
}

/// A directory translates every `.vm` file in it into `<dir>/<dir>.asm`;
/// a single file translates into the same path with an `.asm` extension.
pub fn plan(source: &Path) -> Result<Plan> {
    if source.is_dir() {
        let mut sources = Vec::new();
        for entry in fs::read_dir(source).map_err(io_err(source))? {
            let path = entry.map_err(io_err(source))?.path();
            if is_vm_file(&path) {
                sources.push(path);
            }
        }
        if sources.is_empty() {
            return Err(Error::NoSources(source.to_path_buf()));
        }
        sources.sort();
        for path in &sources {
            unit_name(path)?;
        }
        let name = source
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(OsStr::to_owned))
            .ok_or_else(|| Error::NoSources(source.to_path_buf()))?;
        let output = source.join(name).with_extension(OUTPUT_EXT);
        Ok(Plan { sources, output })
    } else if is_vm_file(source) {
        unit_name(source)?;
        Ok(Plan {
            sources: vec![source.to_path_buf()],
            output: source.with_extension(OUTPUT_EXT),
        })
    } else {
        Err(Error::NotVmFile(source.to_path_buf()))
    }
}

/// Translates one in-memory unit. A command the parser rejected stops the unit.
pub fn translate_unit<W: Write>(
    writer: &mut CodeWriter<W>,
    source: &str,
) -> Result<(), TranslateError> {
    let mut parser = CommandParser::new(source)?;
    while parser.has_more_commands() {
        parser.advance();
        if let Some(err) = parser.error() {
            return Err(err.clone().into());
        }
        let instr = Instruction::try_from(parser.command())?;
        writer.translate(&instr)?;
    }
    Ok(())
}

fn translate_files<W: Write>(
    writer: &mut CodeWriter<W>,
    config: &Config,
    sources: &[PathBuf],
) -> Result<()> {
    if config.bootstrap {
        writer.write_init().map_err(|source| Error::Translate {
            path: config.source.clone(),
            source,
        })?;
    }
    for path in sources {
        info!("processing {}", path.display());
        let source = fs::read_to_string(path).map_err(io_err(path))?;
        writer.set_file_name(unit_name(path)?);
        translate_unit(writer, &source).map_err(|source| Error::Translate {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

fn write_output(file: File, config: &Config, sources: &[PathBuf], output: &Path) -> Result<()> {
    let mut writer = CodeWriter::new(BufWriter::new(file)).with_annotations(config.annotate);
    translate_files(&mut writer, config, sources)?;
    writer.finish().map(drop).map_err(|source| Error::Translate {
        path: output.to_path_buf(),
        source,
    })
}

/// Translates everything `config` names into one output file and returns its path.
/// On failure the partial output is removed.
pub fn run(config: &Config) -> Result<PathBuf> {
    let plan = plan(&config.source)?;
    let output = config.output.clone().unwrap_or(plan.output);
    debug!(sources = plan.sources.len(), "writing {}", output.display());

    let file = File::create(&output).map_err(io_err(&output))?;
    // write_output owns the file, so it is closed before any removal
    if let Err(err) = write_output(file, config, &plan.sources, &output) {
        if let Err(rm) = fs::remove_file(&output) {
            warn!("could not remove {}: {}", output.display(), rm);
        }
        return Err(err);
    }
    Ok(output)
}
