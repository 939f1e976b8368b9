//! Bibliography entry data structures.
//!
//! An [`Entry`] keeps its fields in source order so that a file written back
//! out reads the same way its author arranged it.

use serde::Serialize;

/// A single field (key-value pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// A parsed bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Entry type, lower-cased (e.g. "book", "inbook", "collection")
    pub entry_type: String,
    /// Citation key
    pub key: String,
    /// Fields in the order they were read or inserted
    pub fields: Vec<Field>,
}

impl Entry {
    /// Creates an entry without fields.
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into().to_lowercase(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Gets a field value by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.fields[i].value.as_str())
    }

    /// Gets a field value by its exact, case-sensitive name.
    pub fn get_exact(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Returns true if a field with this name (case-insensitive) exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets a field, replacing the value in place if it already exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => self.fields[i].value = value,
            None => self.fields.push(Field {
                name: name.to_lowercase(),
                value,
            }),
        }
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.fields.remove(i).value)
    }

    /// Moves the value of `from` to `to`, overwriting `to` if present.
    ///
    /// Returns false when `from` does not exist.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.remove(from) {
            Some(value) => {
                self.set(to, value);
                true
            }
            None => false,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// All entries read from a single file, plus the macros and preambles that
/// travel with them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bibliography {
    pub entries: Vec<Entry>,
    /// `@string` definitions, in definition order
    pub strings: Vec<(String, String)>,
    pub preambles: Vec<String>,
}

impl Bibliography {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_is_lowercased() {
        let entry = Entry::new("Book", "knuth84");
        assert_eq!(entry.entry_type, "book");
        assert_eq!(entry.key, "knuth84");
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let mut entry = Entry::new("article", "a");
        entry.set("Title", "Hello");

        assert_eq!(entry.get("title"), Some("Hello"));
        assert_eq!(entry.get("TITLE"), Some("Hello"));
        assert!(entry.contains("tItLe"));
    }

    #[test]
    fn test_get_exact_is_case_sensitive() {
        let mut entry = Entry::new("article", "a");
        entry.fields.push(Field {
            name: "TITLE".to_string(),
            value: "Upper".to_string(),
        });

        assert_eq!(entry.get_exact("TITLE"), Some("Upper"));
        assert_eq!(entry.get_exact("title"), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        // Given: an entry with two fields
        let mut entry = Entry::new("book", "b");
        entry.set("author", "Doe");
        entry.set("year", "2001");

        // When: we overwrite the first one
        entry.set("author", "Roe");

        // Then: the order is unchanged
        let names: Vec<_> = entry.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["author", "year"]);
        assert_eq!(entry.get("author"), Some("Roe"));
    }

    #[test]
    fn test_rename_overwrites_target() {
        // Given: both the old and the new key exist
        let mut entry = Entry::new("article", "a");
        entry.set("journal", "Old");
        entry.set("journaltitle", "New");

        // When: we rename
        let renamed = entry.rename("journaltitle", "journal");

        // Then: the new key holds the old key's value and the old key is gone
        assert!(renamed);
        assert_eq!(entry.get("journal"), Some("New"));
        assert!(!entry.contains("journaltitle"));
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_rename_missing_source_is_noop() {
        let mut entry = Entry::new("article", "a");
        entry.set("journal", "Kept");

        assert!(!entry.rename("journaltitle", "journal"));
        assert_eq!(entry.get("journal"), Some("Kept"));
    }
}
