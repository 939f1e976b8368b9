//! biblatex2bibtex: convert biblatex bibliographies into BibTeX.
//!
//! This library provides functionality to:
//! - Validate and parse `.bib` sources
//! - Preprocess them and run `biber --tool` over a temporary copy
//! - Normalize field names and values to BibTeX conventions
//! - Aggregate the results from several sources into one output file

pub mod aggregate;
pub mod entry;
pub mod input;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod preprocess;
pub mod template;
pub mod tool;
pub mod writer;

pub use aggregate::{write_collections, OutputTarget};
pub use entry::{Bibliography, Entry, Field};
pub use input::load_bib;
pub use normalize::{normalize_entry, normalize_file, TitleFallback};
pub use parser::parse_bibliography;
pub use pipeline::{convert, ConvertError, RunConfig, Summary};
pub use preprocess::preprocess;
pub use template::PublisherTemplate;
pub use tool::{Biber, Normalizer, ToolRequest};
pub use writer::{format_bibliography, format_entry};
