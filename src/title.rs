//! Title collision resolution for duplicated compositions.
//!
//! A copy of `"Foo"` is named `"copy 1: Foo"`, or `"copy 2: Foo"` if that
//! title is taken, and so on. Copying a copy strips the old marker first,
//! so `"copy 1: Foo"` duplicates to `"copy 2: Foo"`, never
//! `"copy 1: copy 1: Foo"`.

use regex_lite::Regex;
use std::collections::BTreeSet;

/// Placeholder replaced by the copy index in a prefix template.
pub const INDEX_PLACEHOLDER: &str = "%index%";

/// Default prefix template.
pub const DEFAULT_COPY_PREFIX: &str = "copy %index%: ";

/// Default pattern recognizing an applied copy marker.
pub const DEFAULT_COPY_PATTERN: &str = "^copy [0-9]+: ";

/// Error type for title resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Prefix template lacks the index placeholder.
    #[error("Copy prefix template {0:?} does not contain %index%")]
    InvalidTemplate(String),
    /// Marker pattern does not compile.
    #[error("Invalid copy marker pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },
    /// No free title within the iteration cap.
    #[error("No free copy title for {title:?} after {attempts} attempts")]
    Exhausted {
        /// Stripped source title.
        title: String,
        /// Candidates tried.
        attempts: usize,
    },
}

/// Prefix template plus copy-marker pattern.
#[derive(Debug, Clone)]
pub struct TitleTemplate {
    prefix: String,
    marker: Regex,
}

impl TitleTemplate {
    /// Build a template, validating both parts.
    pub fn new(prefix: impl Into<String>, marker_pattern: &str) -> Result<Self, TitleError> {
        let prefix = prefix.into();
        if !prefix.contains(INDEX_PLACEHOLDER) {
            return Err(TitleError::InvalidTemplate(prefix));
        }
        let marker = Regex::new(marker_pattern).map_err(|e| TitleError::InvalidPattern {
            pattern: marker_pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { prefix, marker })
    }

    /// Render the prefix for `index`.
    pub fn prefix(&self, index: usize) -> String {
        self.prefix.replace(INDEX_PLACEHOLDER, &index.to_string())
    }

    /// Remove the first copy marker from `title`.
    pub fn strip_marker(&self, title: &str) -> String {
        self.marker.replace(title, "").into_owned()
    }

    /// Produce the first `prefix(i) + stripped(source)` not in `existing`.
    pub fn resolve(&self, existing: &BTreeSet<String>, source_title: &str) -> Result<String, TitleError> {
        let stripped = self.strip_marker(source_title);
        let cap = existing.len() + 1;

        for index in 1..=cap {
            let candidate = format!("{}{}", self.prefix(index), stripped);
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }

        tracing::error!(title = %stripped, attempts = cap, "Copy title resolution exhausted");
        Err(TitleError::Exhausted { title: stripped, attempts: cap })
    }
}

impl Default for TitleTemplate {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COPY_PREFIX.to_string(),
            marker: Regex::new(DEFAULT_COPY_PATTERN).expect("default copy pattern compiles"),
        }
    }
}

/// Resolve a copy title with the default template.
pub fn resolve_copy_title(existing: &BTreeSet<String>, source_title: &str) -> Result<String, TitleError> {
    TitleTemplate::default().resolve(existing, source_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_copy() {
        assert_eq!(resolve_copy_title(&titles(&[]), "Foo").unwrap(), "copy 1: Foo");
    }

    #[test]
    fn test_skips_taken_indices() {
        let existing = titles(&["copy 1: Foo", "copy 2: Foo"]);
        assert_eq!(resolve_copy_title(&existing, "Foo").unwrap(), "copy 3: Foo");
    }

    #[test]
    fn test_copy_of_copy_strips_marker() {
        let existing = titles(&["Foo", "copy 1: Foo"]);
        assert_eq!(resolve_copy_title(&existing, "copy 1: Foo").unwrap(), "copy 2: Foo");
    }

    #[test]
    fn test_unrelated_titles_do_not_block() {
        let existing = titles(&["Bar", "copy 1: Bar", "Foo"]);
        assert_eq!(resolve_copy_title(&existing, "Foo").unwrap(), "copy 1: Foo");
    }

    #[test]
    fn test_marker_only_stripped_at_start() {
        assert_eq!(
            resolve_copy_title(&titles(&[]), "Notes on copy 4: drafts").unwrap(),
            "copy 1: Notes on copy 4: drafts"
        );
    }

    #[test]
    fn test_custom_template() {
        let template = TitleTemplate::new("kopie %index%: ", "^kopie [0-9]+: ").unwrap();
        let existing = titles(&["kopie 1: Rivieren"]);
        assert_eq!(template.resolve(&existing, "kopie 1: Rivieren").unwrap(), "kopie 2: Rivieren");
    }

    #[test]
    fn test_invalid_templates_rejected() {
        assert!(matches!(
            TitleTemplate::new("copy: ", DEFAULT_COPY_PATTERN),
            Err(TitleError::InvalidTemplate(_))
        ));
        assert!(matches!(
            TitleTemplate::new(DEFAULT_COPY_PREFIX, "^copy ([0-9]+: "),
            Err(TitleError::InvalidPattern { .. })
        ));
    }
}
