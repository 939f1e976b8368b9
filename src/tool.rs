//! External normalization tool.
//!
//! The conversion relies on `biber --tool` to resolve cross-references and
//! inheritance and to apply the user's source mapping. The [`Normalizer`]
//! trait is the seam between the pipeline and that program.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// Default executable name of the normalization tool.
pub const DEFAULT_BIBER: &str = "biber";

/// Errors that can occur when running the normalization tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {status}{}", format_diagnostics(.diagnostics))]
    Failed {
        program: String,
        status: String,
        diagnostics: Vec<String>,
    },

    #[error("failed to remove log file '{path}': {source}")]
    Cleanup {
        path: String,
        #[source]
        source: io::Error,
    },
}

fn format_diagnostics(lines: &[String]) -> String {
    lines.iter().map(|l| format!("\n  {}", l)).collect()
}

/// One run of the normalization tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest<'a> {
    pub input: &'a Path,
    pub config: &'a Path,
    pub output: &'a Path,
    /// Resolve cross-references and inheritance into each entry
    pub resolve: bool,
}

/// Rewrites a bibliography file into a normalized form.
pub trait Normalizer {
    /// Runs the normalization described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started, fails, or its
    /// by-products cannot be cleaned up.
    fn run(&self, request: &ToolRequest<'_>) -> Result<(), ToolError>;
}

/// `biber` in tool mode.
#[derive(Debug, Clone)]
pub struct Biber {
    program: PathBuf,
}

impl Default for Biber {
    fn default() -> Self {
        Self::new(DEFAULT_BIBER)
    }
}

impl Biber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for a request.
    pub fn args(request: &ToolRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--tool".into()];

        let mut config = OsString::from("--configfile=");
        config.push(request.config);
        args.push(config);

        if request.resolve {
            args.push("--output-resolve".into());
        }

        let mut output = OsString::from("--output-file=");
        output.push(request.output);
        args.push(output);

        args.push(request.input.into());
        args
    }

    /// Path of the log file biber writes next to its input.
    pub fn log_path(input: &Path) -> PathBuf {
        let mut log = input.as_os_str().to_owned();
        log.push(".blg");
        PathBuf::from(log)
    }
}

impl Normalizer for Biber {
    fn run(&self, request: &ToolRequest<'_>) -> Result<(), ToolError> {
        let program = self.program.display().to_string();
        let args = Biber::args(request);

        info!(
            "running: {} {}",
            program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program,
                status: output.status.to_string(),
                diagnostics: diagnostics(&output),
            });
        }
        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
            "normalization tool finished"
        );

        remove_log(&Biber::log_path(request.input))
    }
}

/// Deletes the tool's log by-product. A log that was never written counts
/// as already removed.
fn remove_log(path: &Path) -> Result<(), ToolError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed tool log");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no tool log to remove");
            Ok(())
        }
        Err(source) => Err(ToolError::Cleanup {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Collects the `ERROR` and `WARN` lines from the tool's output. Falls back
/// to the last lines of stderr when none match.
fn diagnostics(output: &Output) -> Vec<String> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = extract_diagnostics(&stderr);
    lines.extend(extract_diagnostics(&stdout));

    if lines.is_empty() {
        let tail: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = tail.len().saturating_sub(5);
        lines = tail[start..].iter().map(|l| l.to_string()).collect();
    }
    lines
}

/// Extracts biber-style `ERROR - ...` / `WARN - ...` lines.
pub fn extract_diagnostics(text: &str) -> Vec<String> {
    // e.g. "ERROR - Cannot find 'refs_tmp.bib'!" or "[5] Utils.pm:411> WARN - ..."
    let re = Regex::new(r"\b(?:ERROR|WARN)\s+-\s+.*$").unwrap();

    text.lines()
        .filter_map(|line| re.find(line.trim_end()).map(|m| m.as_str().to_string()))
        .collect()
}
