//! Output aggregation.
//!
//! Collections are written in the order given, each appended to the output
//! file together with a trailing newline. Entries are not deduplicated
//! across collections.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::entry::Bibliography;
use crate::writer::format_bibliography;

/// Output file used when `-o` is not given.
pub const DEFAULT_OUTPUT: &str = "curated-references.bib";

/// Suffix appended to the first input's stem when the output is derived.
pub const DERIVED_SUFFIX: &str = "_bibtex";

/// Errors that can occur when writing the output file.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where the aggregated output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// [`DEFAULT_OUTPUT`] in the working directory
    Default,
    /// `<dir>/<stem>_bibtex.bib` next to the first input
    DerivedFromInput,
    /// An explicit path
    Path(PathBuf),
}

impl OutputTarget {
    /// Resolves the target to a concrete path.
    pub fn resolve(&self, inputs: &[PathBuf]) -> PathBuf {
        match self {
            OutputTarget::Default => PathBuf::from(DEFAULT_OUTPUT),
            OutputTarget::Path(path) => path.clone(),
            OutputTarget::DerivedFromInput => match inputs.first() {
                Some(first) => derived_output(first),
                None => PathBuf::from(DEFAULT_OUTPUT),
            },
        }
    }
}

/// `<dir>/<stem>_bibtex.<ext>` for an input path.
pub fn derived_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bib".to_string());
    input.with_file_name(format!("{}{}.{}", stem, DERIVED_SUFFIX, ext))
}

/// Appends one collection's text and a newline to `path`.
pub fn append_collection(path: &Path, bib: &Bibliography) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(format_bibliography(bib).as_bytes())
        .map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;
    Ok(())
}

/// Truncates `path` and appends every collection to it in order.
///
/// # Returns
///
/// The total number of entries written.
pub fn write_collections(path: &Path, collections: &[Bibliography]) -> Result<usize, OutputError> {
    File::create(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut written = 0;
    for bib in collections {
        append_collection(path, bib)?;
        written += bib.len();
        info!(
            entries = bib.len(),
            "appended collection to {}",
            path.display()
        );
    }
    debug!(total = written, "output complete");
    Ok(written)
}
