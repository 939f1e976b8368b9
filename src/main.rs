//! CLI for biblatex2bibtex - Convert biblatex files into a single BibTeX file.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use biblatex2bibtex::{
    convert,
    normalize::NormalizeError,
    preprocess::PreprocessError,
    template::template_names,
    tool::{ToolError, DEFAULT_BIBER},
    Biber, ConvertError, OutputTarget, PublisherTemplate, RunConfig,
};

/// Configuration file bundled with the repository.
const DEFAULT_CONFIG: &str = "data/biblatex2bibtex.conf";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Convert biblatex files to BibTeX files
#[derive(Parser)]
#[command(name = "biblatex2bibtex")]
#[command(version)]
#[command(after_help = "\
Examples:
  biblatex2bibtex refs.bib
  biblatex2bibtex *.bib -o curated-references.bib
  biblatex2bibtex refs.bib -c my-biber.conf -t IEEE-tran -vv
  biblatex2bibtex refs.bib -o        (writes refs_bibtex.bib)")]
struct Cli {
    /// biblatex file(s) to be converted
    #[arg(required = true, value_name = "BIB_FILE")]
    biblatexfiles: Vec<PathBuf>,

    /// BibTeX output file [default: curated-references.bib]; without a
    /// value, named after the first input
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<Option<PathBuf>>,

    /// biber tool configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    configfile: PathBuf,

    /// Publisher template the output .bib file should be formatted for
    #[arg(short = 't', long, value_enum, default_value_t = PublisherTemplate::NonStrict)]
    publisher_template: PublisherTemplate,

    /// biber executable
    #[arg(long, env = "BIBER", default_value = DEFAULT_BIBER)]
    biber: PathBuf,

    /// Increase output verbosity (e.g., -vv is more than -v)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let target = match &self.output {
            None => OutputTarget::Default,
            Some(None) => OutputTarget::DerivedFromInput,
            Some(Some(path)) => OutputTarget::Path(path.clone()),
        };

        RunConfig {
            output: target.resolve(&self.biblatexfiles),
            inputs: self.biblatexfiles.clone(),
            config_file: self.configfile.clone(),
            template: self.publisher_template,
        }
    }
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: input file missing, not a .bib file, or not UTF-8
    InputFile(String),
    /// Exit 11: biber configuration file not found
    ConfigFile(String),
    /// Exit 12: malformed bibliography text
    Parse(String),
    /// Exit 13: biber could not be run or failed
    Tool(String),
    /// Exit 14: entry left without a title
    MissingField(String),
    /// Exit 15: cannot write output or temporary file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::ConfigFile(_) => 11,
            AppError::Parse(_) => 12,
            AppError::Tool(_) => 13,
            AppError::MissingField(_) => 14,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: please enter paths to UTF-8 encoded .bib files",
                    msg
                )
            }
            AppError::ConfigFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: pass a biber tool configuration file with -c/--configfile",
                    msg
                )
            }
            AppError::Parse(msg) => write!(f, "{}", msg),
            AppError::Tool(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that biber is installed (or set --biber / BIBER); \
                     temporary *_tmp.bib files are left in place for inspection",
                    msg
                )
            }
            AppError::MissingField(msg) => {
                write!(
                    f,
                    "{}\n  hint: add a title to the entry (books may use booktitle, inbooks chapter)",
                    msg
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

impl From<ConvertError> for AppError {
    fn from(e: ConvertError) -> Self {
        let msg = e.to_string();
        match e {
            ConvertError::NoInputs | ConvertError::Input(_) => AppError::InputFile(msg),
            ConvertError::MissingConfig(_) => AppError::ConfigFile(msg),
            ConvertError::Preprocess(e) => match e {
                PreprocessError::Input(_) => AppError::InputFile(msg),
                PreprocessError::MissingConfig(_) => AppError::ConfigFile(msg),
                PreprocessError::Parse { .. } => AppError::Parse(msg),
                PreprocessError::Write { .. } => AppError::OutputFile(msg),
                PreprocessError::Tool(ToolError::Cleanup { .. }) => AppError::OutputFile(msg),
                PreprocessError::Tool(_) => AppError::Tool(msg),
            },
            ConvertError::Normalize(e) => match e {
                NormalizeError::Parse { .. } => AppError::Parse(msg),
                NormalizeError::Read { .. } => AppError::Tool(msg),
                NormalizeError::Cleanup { .. } => AppError::OutputFile(msg),
                NormalizeError::MissingTitle { .. } | NormalizeError::EmptyTitle { .. } => {
                    AppError::MissingField(msg)
                }
            },
            ConvertError::Output(_) => AppError::OutputFile(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.run_config();
    if matches!(cli.output, Some(None)) {
        tracing::info!("no output path given, saving to {}", config.output.display());
    }
    tracing::debug!(
        templates = %template_names().join(", "),
        selected = %config.template,
        class = config.template.latex_class(),
        "publisher templates"
    );

    let biber = Biber::new(&cli.biber);
    let summary = convert(&config, &biber)?;

    eprintln!(
        "converted {} entries from {} file(s), wrote {}",
        summary.entries,
        summary.files,
        summary.output.display()
    );
    Ok(())
}

/// Logs go to stderr. `RUST_LOG` overrides the level chosen by `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
