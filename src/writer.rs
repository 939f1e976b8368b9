//! BibTeX serialization.
//!
//! Converts a [`Bibliography`] back to its text representation.

use crate::entry::{Bibliography, Entry};

/// Formats a single entry.
///
/// Field names are written lower-case; purely numeric values are written
/// bare, everything else is wrapped in braces.
pub fn format_entry(entry: &Entry) -> String {
    let mut result = String::new();

    result.push('@');
    result.push_str(&entry.entry_type);
    result.push('{');
    result.push_str(&entry.key);
    result.push_str(",\n");

    for field in &entry.fields {
        result.push_str("    ");
        result.push_str(&field.name.to_lowercase());
        result.push_str(" = ");
        result.push_str(&format_field_value(&field.value));
        result.push_str(",\n");
    }

    result.push('}');
    result
}

/// Formats a whole bibliography: preambles, then `@string` definitions, then
/// entries, separated by blank lines and ending with a newline.
///
/// # Examples
///
/// ```
/// use biblatex2bibtex::{format_bibliography, Bibliography, Entry};
///
/// let mut entry = Entry::new("misc", "k");
/// entry.set("year", "2020");
/// let bib = Bibliography { entries: vec![entry], ..Default::default() };
///
/// assert_eq!(format_bibliography(&bib), "@misc{k,\n    year = 2020,\n}\n");
/// ```
pub fn format_bibliography(bib: &Bibliography) -> String {
    let mut blocks: Vec<String> = Vec::new();

    for preamble in &bib.preambles {
        blocks.push(format!("@preamble{{{}}}", format_field_value(preamble)));
    }
    for (name, value) in &bib.strings {
        blocks.push(format!("@string{{{} = {}}}", name, format_field_value(value)));
    }
    blocks.extend(bib.entries.iter().map(format_entry));

    if blocks.is_empty() {
        return String::new();
    }

    let mut output = blocks.join("\n\n");
    output.push('\n');
    output
}

fn format_field_value(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len() + 2);
    result.push('{');
    result.push_str(value);
    result.push('}');
    result
}
