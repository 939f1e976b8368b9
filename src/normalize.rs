//! Field normalization from biblatex conventions to BibTeX conventions.
//!
//! Runs on the output of the external normalization tool. Each entry gets a
//! resolved title, brace-free titles, en-dash page ranges, BibTeX field
//! names, a plain year and a `howpublished` marker for manuscripts.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, trace};

use crate::entry::{Bibliography, Entry, Field};
use crate::parser::{parse_bibliography, ParseError};

/// biblatex field name → BibTeX field name, applied in this order.
///
/// No target appears as a source, so applying the table twice is the same
/// as applying it once.
pub const FIELD_RENAMES: &[(&str, &str)] = &[
    ("date", "year"),
    ("location", "address"),
    ("journaltitle", "journal"),
    ("issue", "number"),
    ("origdate", "year"),
    ("school", "institution"),
    ("maintitle", "booktitle"),
];

/// Note value marking an unpublished manuscript.
pub const MANUSCRIPT_MARKER: &str = r"\textsc{ms}";

/// Value written to `howpublished` in place of [`MANUSCRIPT_MARKER`].
pub const MANUSCRIPT_HOWPUBLISHED: &str = "Manuscript";

/// Errors that can occur during normalization.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove temporary file '{path}': {source}")]
    Cleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("entry '{key}' (@{entry_type}) has no title and no {fallback} to take one from")]
    MissingTitle {
        key: String,
        entry_type: String,
        fallback: TitleFallback,
    },

    #[error("entry '{key}' (@{entry_type}) has an empty title")]
    EmptyTitle { key: String, entry_type: String },
}

/// Where a title comes from when an entry has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleFallback {
    /// Copy the named field.
    Field(&'static str),
    /// Rename a title field written in another letter case (e.g. `TITLE`).
    OtherCase,
}

impl TitleFallback {
    /// Picks the fallback for an entry type.
    pub fn for_type(entry_type: &str) -> Self {
        match entry_type {
            "book" => TitleFallback::Field("booktitle"),
            "inbook" => TitleFallback::Field("chapter"),
            _ => TitleFallback::OtherCase,
        }
    }

    /// Sets `title` from the fallback. Returns false when the fallback
    /// source is missing too.
    fn apply(self, entry: &mut Entry) -> bool {
        match self {
            // A differently-cased title is replaced, not overwritten in place.
            TitleFallback::Field(name) => match entry.get(name) {
                Some(value) => {
                    let value = value.to_string();
                    entry.remove("title");
                    entry.fields.push(Field {
                        name: "title".to_string(),
                        value,
                    });
                    true
                }
                None => false,
            },
            // Lookup ignores case; the re-inserted field is lower-case.
            TitleFallback::OtherCase => entry.rename("title", "title"),
        }
    }
}

impl std::fmt::Display for TitleFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleFallback::Field(name) => write!(f, "'{}' field", name),
            TitleFallback::OtherCase => f.write_str("differently-cased title field"),
        }
    }
}

/// Reads a normalized temporary file, deletes it, and normalizes its entries.
///
/// The file is removed as soon as it has been parsed, whether or not the
/// entries then normalize cleanly.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any entry
/// is left without a title.
pub fn normalize_file(path: &Path) -> Result<Bibliography, NormalizeError> {
    debug!(path = %path.display(), "parsing normalized file");

    let content = fs::read_to_string(path).map_err(|source| NormalizeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut bib = parse_bibliography(&content).map_err(|source| NormalizeError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    fs::remove_file(path).map_err(|source| NormalizeError::Cleanup {
        path: path.display().to_string(),
        source,
    })?;

    normalize_bibliography(&mut bib)?;
    Ok(bib)
}

/// Normalizes every entry of a bibliography in place.
pub fn normalize_bibliography(bib: &mut Bibliography) -> Result<(), NormalizeError> {
    for entry in &mut bib.entries {
        normalize_entry(entry)?;
    }
    Ok(())
}

/// Normalizes a single entry in place.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingTitle`] when the entry has no title and
/// its type-specific fallback is missing, and
/// [`NormalizeError::EmptyTitle`] when the title is empty once braces are
/// stripped.
pub fn normalize_entry(entry: &mut Entry) -> Result<(), NormalizeError> {
    debug!(key = %entry.key, entry_type = %entry.entry_type, "normalizing entry");

    resolve_title(entry)?;

    strip_braces(entry, "title");
    strip_braces(entry, "booktitle");

    if let Some(pages) = entry.get("pages") {
        if pages.contains("--") {
            let pages = pages.replace("--", "\u{2013}");
            entry.set("pages", pages);
        }
    }

    for &(from, to) in FIELD_RENAMES {
        if entry.rename(from, to) {
            trace!(key = %entry.key, from, to, "renamed field");
        }
    }

    if let Some(year) = entry.get("year") {
        if let Some((first, _)) = year.split_once('-') {
            let first = first.to_string();
            entry.set("year", first);
        }
    }

    if entry.get("note") == Some(MANUSCRIPT_MARKER) {
        entry.remove("note");
        entry.set("howpublished", MANUSCRIPT_HOWPUBLISHED);
    }

    if entry.get("title").map_or(true, str::is_empty) {
        return Err(NormalizeError::EmptyTitle {
            key: entry.key.clone(),
            entry_type: entry.entry_type.clone(),
        });
    }

    if let Ok(json) = serde_json::to_string(entry) {
        trace!(entry = %json, "normalized entry");
    }
    Ok(())
}

fn resolve_title(entry: &mut Entry) -> Result<(), NormalizeError> {
    if entry.get_exact("title").is_some() {
        return Ok(());
    }

    let fallback = TitleFallback::for_type(&entry.entry_type);
    if fallback.apply(entry) {
        debug!(key = %entry.key, %fallback, "title taken from fallback");
        Ok(())
    } else {
        Err(NormalizeError::MissingTitle {
            key: entry.key.clone(),
            entry_type: entry.entry_type.clone(),
            fallback,
        })
    }
}

fn strip_braces(entry: &mut Entry, name: &str) {
    if let Some(value) = entry.get(name) {
        if value.contains(['{', '}']) {
            let stripped = value.replace(['{', '}'], "");
            entry.set(name, stripped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_bibliography;
    use std::io::Write;

    fn entry_from(source: &str) -> Entry {
        parse_bibliography(source).unwrap().entries.remove(0)
    }

    fn normalized(source: &str) -> Entry {
        let mut entry = entry_from(source);
        normalize_entry(&mut entry).unwrap();
        entry
    }

    // ===========================================
    // Tests for title resolution
    // ===========================================

    #[test]
    fn test_title_present_is_kept() {
        let entry = normalized("@article{a, title = {Plain}}");
        assert_eq!(entry.get("title"), Some("Plain"));
    }

    #[test]
    fn test_book_title_falls_back_to_booktitle() {
        // Given: a book without title but with a braced booktitle
        let entry = normalized("@book{b, booktitle = {{Foo}}}");

        // Then: title is the booktitle without braces
        assert_eq!(entry.get("title"), Some("Foo"));
        assert_eq!(entry.get("booktitle"), Some("Foo"));
    }

    #[test]
    fn test_inbook_title_falls_back_to_chapter() {
        let entry = normalized("@inbook{c, chapter = {Third Chapter}, booktitle = {Whole}}");
        assert_eq!(entry.get("title"), Some("Third Chapter"));
    }

    #[test]
    fn test_other_type_uses_uppercase_title() {
        // Given: an article whose only title field is upper-case
        let entry = normalized("@article{d, TITLE = {Upper {Case}}}");

        // Then: it becomes a lower-case title with braces stripped
        assert_eq!(entry.get_exact("title"), Some("Upper Case"));
        assert_eq!(entry.get_exact("TITLE"), None);
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_article_without_any_title_fails() {
        // Given: an article with no title and no usable fallback
        let mut entry = entry_from("@article{e, booktitle = {Not used for articles}}");

        // When: we normalize
        let err = normalize_entry(&mut entry).unwrap_err();

        // Then: the error names the entry
        match &err {
            NormalizeError::MissingTitle {
                key,
                entry_type,
                fallback,
            } => {
                assert_eq!(key, "e");
                assert_eq!(entry_type, "article");
                assert_eq!(*fallback, TitleFallback::OtherCase);
            }
            other => panic!("Expected MissingTitle, got {:?}", other),
        }
        assert!(err.to_string().contains("'e'"));
    }

    #[test]
    fn test_book_without_booktitle_fails() {
        let mut entry = entry_from("@book{f, TITLE = {Ignored for books}}");
        let err = normalize_entry(&mut entry).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MissingTitle {
                fallback: TitleFallback::Field("booktitle"),
                ..
            }
        ));
    }

    #[test]
    fn test_book_fallback_replaces_uppercase_title() {
        // Given: a book with an upper-case TITLE and a booktitle
        let entry = normalized("@book{h, TITLE = {Shouted}, booktitle = {Real Title}}");

        // Then: a single lower-case title holds the booktitle
        assert_eq!(entry.get_exact("title"), Some("Real Title"));
        assert_eq!(entry.get_exact("TITLE"), None);
        let titles = entry
            .fields
            .iter()
            .filter(|f| f.name.eq_ignore_ascii_case("title"))
            .count();
        assert_eq!(titles, 1);
    }

    #[test]
    fn test_title_of_only_braces_is_empty() {
        let mut entry = entry_from("@misc{g, title = {{}}}");
        let err = normalize_entry(&mut entry).unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyTitle { .. }));
    }

    // ===========================================
    // Tests for value rewriting
    // ===========================================

    #[test]
    fn test_braces_stripped_from_title_and_booktitle_only() {
        let entry = normalized(
            "@incollection{h, title = {The {DNA} of {Rust}}, booktitle = {{Proc}}, publisher = {{ACM}}}",
        );
        assert_eq!(entry.get("title"), Some("The DNA of Rust"));
        assert_eq!(entry.get("booktitle"), Some("Proc"));
        assert_eq!(entry.get("publisher"), Some("{ACM}"));
    }

    #[test]
    fn test_page_range_gets_en_dash() {
        let entry = normalized("@article{i, title = {T}, pages = {12--34}}");
        assert_eq!(entry.get("pages"), Some("12\u{2013}34"));
    }

    #[test]
    fn test_single_page_untouched() {
        let entry = normalized("@article{i, title = {T}, pages = {12}}");
        assert_eq!(entry.get("pages"), Some("12"));
    }

    #[test]
    fn test_year_range_truncated() {
        let entry = normalized("@book{j, title = {T}, year = {1990-1995}}");
        assert_eq!(entry.get("year"), Some("1990"));
    }

    #[test]
    fn test_full_date_becomes_year() {
        let entry = normalized("@article{k, title = {T}, date = {2020-05-17}}");
        assert_eq!(entry.get("year"), Some("2020"));
        assert!(!entry.contains("date"));
    }

    #[test]
    fn test_manuscript_note() {
        // Given: the manuscript marker as note
        let entry = normalized(r"@unpublished{l, title = {Draft}, note = {\textsc{ms}}}");

        // Then: note is replaced by howpublished
        assert!(!entry.contains("note"));
        assert_eq!(entry.get("howpublished"), Some("Manuscript"));
    }

    #[test]
    fn test_other_note_kept() {
        let entry = normalized(r"@unpublished{l, title = {Draft}, note = {\textsc{ms} draft}}");
        assert_eq!(entry.get("note"), Some(r"\textsc{ms} draft"));
        assert!(!entry.contains("howpublished"));
    }

    // ===========================================
    // Tests for the rename table
    // ===========================================

    #[test]
    fn test_journaltitle_renamed() {
        let entry = normalized("@article{m, title = {T}, journaltitle = {Nature}}");
        assert_eq!(entry.get("journal"), Some("Nature"));
        assert!(!entry.contains("journaltitle"));
    }

    #[test]
    fn test_every_rename_applied() {
        let entry = normalized(
            "@thesis{n, title = {T}, location = {Turku}, issue = {3}, \
             school = {Åbo Akademi}, maintitle = {Collected}}",
        );
        assert_eq!(entry.get("address"), Some("Turku"));
        assert_eq!(entry.get("number"), Some("3"));
        assert_eq!(entry.get("institution"), Some("Åbo Akademi"));
        assert_eq!(entry.get("booktitle"), Some("Collected"));
        for (from, _) in FIELD_RENAMES {
            assert!(!entry.contains(from), "'{}' should be gone", from);
        }
    }

    #[test]
    fn test_origdate_wins_over_date() {
        let entry = normalized("@book{o, title = {T}, date = {2001}, origdate = {1887}}");
        assert_eq!(entry.get("year"), Some("1887"));
    }

    #[test]
    fn test_rename_overwrites_existing_target() {
        let entry = normalized("@article{p, title = {T}, journal = {Old}, journaltitle = {New}}");
        assert_eq!(entry.get("journal"), Some("New"));
        assert_eq!(
            entry.fields.iter().filter(|f| f.name == "journal").count(),
            1
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalized(
            "@article{q, title = {{A}}, journaltitle = {J}, date = {1990-1995}, pages = {1--2}}",
        );
        let mut twice = once.clone();
        normalize_entry(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unrelated_fields_untouched() {
        let mut entry = Entry::new("misc", "r");
        entry.fields.push(Field {
            name: "title".to_string(),
            value: "T".to_string(),
        });
        entry.fields.push(Field {
            name: "url".to_string(),
            value: "https://example.org/a--b".to_string(),
        });

        normalize_entry(&mut entry).unwrap();

        assert_eq!(entry.get("url"), Some("https://example.org/a--b"));
    }

    // ===========================================
    // Tests for normalize_file
    // ===========================================

    #[test]
    fn test_normalize_file_deletes_input() {
        // Given: a temporary file with one entry
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs_tmp.bib");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "@article{{a, title = {{T}}, journaltitle = {{J}}}}").unwrap();
        drop(file);

        // When: we normalize it
        let bib = normalize_file(&path).unwrap();

        // Then: the entry is normalized and the file is gone
        assert_eq!(bib.entries[0].get("journal"), Some("J"));
        assert!(!path.exists());
    }

    #[test]
    fn test_normalize_file_deletes_input_even_when_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs_tmp.bib");
        fs::write(&path, "@article{a, author = {Nobody}}").unwrap();

        let result = normalize_file(&path);

        assert!(matches!(result, Err(NormalizeError::MissingTitle { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_normalize_file_parse_error_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs_tmp.bib");
        fs::write(&path, "@article{a, title = {unterminated").unwrap();

        let result = normalize_file(&path);

        assert!(matches!(result, Err(NormalizeError::Parse { .. })));
        assert!(path.exists());
    }

    #[test]
    fn test_normalize_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = normalize_file(&dir.path().join("never_written_tmp.bib"));

        assert!(matches!(result, Err(NormalizeError::Read { .. })), "got {:?}", result);
    }
}
