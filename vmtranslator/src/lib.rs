//! Translates VM IL into Hack assembly.
//!
//! [`parser::CommandParser`] reads a unit one command at a time and
//! [`codegen::CodeWriter`] emits the assembly for each. [`driver::run`] ties the
//! two together for files and directories on disk.

pub mod codegen;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod parser;
pub mod token;

pub use codegen::CodeWriter;
pub use command::{ArithmeticOp, Command, CommandKind, Instruction, Segment};
pub use config::Config;
pub use error::{Error, LexError, ParseError, TranslateError};

/// Translates a single unit without the bootstrap. `file_name` keys its statics.
pub fn translate(source: &str, file_name: &str) -> Result<String, TranslateError> {
    let mut writer = CodeWriter::new(Vec::new());
    writer.set_file_name(file_name);
    driver::translate_unit(&mut writer, source)?;
    let out = writer.finish()?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
