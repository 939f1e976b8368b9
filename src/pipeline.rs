//! The conversion pipeline.
//!
//! validate every input → preprocess and normalize each file in turn →
//! write all collections. Every failure is fatal, and the output file is
//! only touched once every input has been normalized.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{write_collections, OutputError};
use crate::entry::Bibliography;
use crate::input::{load_bib, InputError};
use crate::normalize::{normalize_file, NormalizeError};
use crate::preprocess::{preprocess, PreprocessError};
use crate::template::PublisherTemplate;
use crate::tool::Normalizer;

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Source files, in processing order
    pub inputs: Vec<PathBuf>,
    /// Resolved output path
    pub output: PathBuf,
    /// Normalization tool configuration file
    pub config_file: PathBuf,
    /// Accepted for reporting; does not change the conversion
    pub template: PublisherTemplate,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub entries: usize,
    pub output: PathBuf,
}

/// Errors that abort a conversion run.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("no input files given")]
    NoInputs,

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("configuration file '{0}' does not exist")]
    MissingConfig(String),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Runs the whole conversion.
///
/// # Arguments
///
/// * `config` - The run settings
/// * `normalizer` - The external normalization tool
///
/// # Errors
///
/// Returns the first error met. Inputs are all validated before any of them
/// is processed, and nothing is written to the output file unless every
/// input converts.
pub fn convert(config: &RunConfig, normalizer: &dyn Normalizer) -> Result<Summary, ConvertError> {
    if config.inputs.is_empty() {
        return Err(ConvertError::NoInputs);
    }

    info!("iterating over {} bibtex files:", config.inputs.len());
    for input in &config.inputs {
        info!("    {}", input.display());
    }
    info!(template = %config.template, "publisher template");

    for input in &config.inputs {
        load_bib(input)?;
    }
    if !config.config_file.is_file() {
        return Err(ConvertError::MissingConfig(
            config.config_file.display().to_string(),
        ));
    }

    // Each file is normalized right after preprocessing so that repeated
    // inputs never share a live temporary file.
    let total = config.inputs.len();
    let mut collections: Vec<Bibliography> = Vec::with_capacity(total);
    for (i, input) in config.inputs.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, total, input.display());
        let temp = preprocess(input, &config.config_file, normalizer)?;
        info!("modifying {}", temp.display());
        let bib = normalize_file(&temp)?;
        debug!(entries = bib.len(), "collection normalized");
        collections.push(bib);
    }

    let entries = write_collections(&config.output, &collections)?;
    debug!(
        entries,
        files = collections.len(),
        output = %config.output.display(),
        "conversion finished"
    );

    Ok(Summary {
        files: collections.len(),
        entries,
        output: config.output.clone(),
    })
}
