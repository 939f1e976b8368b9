//! Source preprocessing.
//!
//! Reads one biblatex source, applies the structural fix-ups the external
//! tool does not, writes a temporary copy next to the source and hands it to
//! the [`Normalizer`].

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::entry::Bibliography;
use crate::input::{load_bib, InputError};
use crate::parser::{parse_bibliography, ParseError};
use crate::tool::{Normalizer, ToolError, ToolRequest};
use crate::writer::format_bibliography;

/// Suffix appended to a source's file stem to name its temporary copy.
pub const TEMP_SUFFIX: &str = "_tmp";

/// Errors that can occur while preprocessing a source.
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("'{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("configuration file '{0}' does not exist")]
    MissingConfig(String),

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Path of the temporary copy for a source: `<dir>/<stem>_tmp.bib`.
pub fn temp_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, TEMP_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, TEMP_SUFFIX),
    };
    source.with_file_name(file_name)
}

/// Copies `title` into `booktitle` for every `collection` entry.
///
/// biblatex collections carry their own name in `title`; BibTeX styles look
/// for it in `booktitle`.
pub fn copy_collection_titles(bib: &mut Bibliography) {
    for entry in bib
        .entries
        .iter_mut()
        .filter(|e| e.entry_type == "collection")
    {
        if let Some(title) = entry.get("title") {
            let title = title.to_string();
            debug!(key = %entry.key, "collection title copied to booktitle");
            entry.set("booktitle", title);
        }
    }
}

/// Preprocesses one source file and returns the normalized temporary file.
///
/// # Arguments
///
/// * `source` - The biblatex source file
/// * `config` - The normalization tool's configuration file
/// * `normalizer` - The tool that rewrites the temporary file in place
///
/// # Errors
///
/// Returns an error if the source is invalid, the configuration file is
/// missing, the temporary file cannot be written, or the tool fails. When
/// the tool fails the temporary file stays on disk.
pub fn preprocess(
    source: &Path,
    config: &Path,
    normalizer: &dyn Normalizer,
) -> Result<PathBuf, PreprocessError> {
    info!("pre-processing {}", source.display());

    let content = load_bib(source)?;
    let mut bib = parse_bibliography(&content).map_err(|e| PreprocessError::Parse {
        path: source.display().to_string(),
        source: e,
    })?;
    debug!(entries = bib.len(), "parsed source");

    copy_collection_titles(&mut bib);

    if !config.is_file() {
        return Err(PreprocessError::MissingConfig(config.display().to_string()));
    }
    debug!(config = %config.display(), "using configuration file");

    let temp = temp_path(source);
    fs::write(&temp, format_bibliography(&bib)).map_err(|e| PreprocessError::Write {
        path: temp.display().to_string(),
        source: e,
    })?;

    normalizer.run(&ToolRequest {
        input: &temp,
        config,
        output: &temp,
        resolve: true,
    })?;

    Ok(temp)
}
