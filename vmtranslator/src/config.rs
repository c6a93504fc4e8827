use std::path::PathBuf;

/// Settings for one translation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// A `.vm` file or a directory of them.
    pub source: PathBuf,
    /// Overrides the output path derived from `source`.
    pub output: Option<PathBuf>,
    /// Emit the SP setup and `call Sys.init 0` before the first file.
    pub bootstrap: bool,
    /// Write each VM command as a comment above its code.
    pub annotate: bool,
}

impl Config {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: None,
            bootstrap: true,
            annotate: false,
        }
    }
}
