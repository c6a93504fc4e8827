use std::io;
use std::path::PathBuf;

use crate::command::Segment;

/// Unrecognised character in a source unit. Aborts the whole unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: unexpected {text:?}")]
pub struct LexError {
    pub line: usize,
    pub text: String,
}

/// A single command that does not have the shape its keyword requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unknown command {word:?}")]
    UnknownCommand { line: usize, word: String },
    #[error("line {line}: {command} expects {expected}, found {found:?}")]
    UnexpectedToken {
        line: usize,
        command: String,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: invalid number {text:?}")]
    InvalidNumber { line: usize, text: String },
    #[error("line {line}: invalid symbol {text:?}")]
    InvalidSymbol { line: usize, text: String },
}

/// Failures while generating code. None of these are recoverable mid-run.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown arithmetic command {0:?}")]
    UnknownOperator(String),
    #[error("unknown segment {0:?}")]
    UnknownSegment(String),
    #[error("{segment} index {index} out of range")]
    IndexOutOfRange { segment: Segment, index: u16 },
    #[error("cannot pop into the constant segment")]
    PopConstant,
    #[error("label {0} defined twice")]
    DuplicateLabel(String),
    #[error("{0}: too many arguments for one frame")]
    TooManyArguments(String),
    #[error("malformed {0} command")]
    Malformed(&'static str),
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}: not a .vm file", .0.display())]
    NotVmFile(PathBuf),
    #[error("{}: no .vm files to translate", .0.display())]
    NoSources(PathBuf),
    #[error("{}: file name cannot name statics and labels", .0.display())]
    InvalidName(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Translate {
        path: PathBuf,
        #[source]
        source: TranslateError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
