//! Source file validation and loading.
//!
//! Every source must be an existing `.bib` file holding strictly valid
//! UTF-8 text. Nothing is substituted for bad bytes.

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Extension a source bibliography must carry.
pub const BIB_EXTENSION: &str = "bib";

/// Errors that can occur when validating a source file.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("'{0}' does not exist or is not a file")]
    NotAFile(String),

    #[error("'{0}' is not a .bib file")]
    WrongExtension(String),

    #[error("'{path}' is not valid UTF-8 (invalid byte sequence at offset {offset})")]
    InvalidUtf8 { path: String, offset: usize },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Checks that `path` is an existing file with a `.bib` extension.
pub fn check_bib_path(path: &Path) -> Result<(), InputError> {
    if !path.is_file() {
        return Err(InputError::NotAFile(path.display().to_string()));
    }
    if path.extension().map_or(true, |e| e != BIB_EXTENSION) {
        return Err(InputError::WrongExtension(path.display().to_string()));
    }
    Ok(())
}

/// Validates a source file and returns its contents.
///
/// # Arguments
///
/// * `path` - Path to the `.bib` file
///
/// # Errors
///
/// Returns an error if the path is not a `.bib` file, cannot be read, or
/// contains an invalid UTF-8 byte sequence.
pub fn load_bib(path: &Path) -> Result<String, InputError> {
    check_bib_path(path)?;

    let bytes = fs::read(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;

    String::from_utf8(bytes).map_err(|e| InputError::InvalidUtf8 {
        path: path.display().to_string(),
        offset: e.utf8_error().valid_up_to(),
    })
}
