//! Class catalog: the ordered label list that gives model output indices a name.

use crate::core::errors::{ClassifyError, ClassifyResult};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Labels used when no label file is available.
pub const DEFAULT_CLASS_LABELS: [&str; 5] = [
    "Ayrshire",
    "Brown Swiss",
    "Holstein Friesian",
    "Jersey",
    "Red Dane",
];

/// Where the catalog's labels came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LabelSource {
    File(PathBuf),
    BuiltInDefault,
    /// Supplied directly in code.
    Inline,
}

impl LabelSource {
    fn origin(&self) -> &Path {
        match self {
            LabelSource::File(path) => path,
            LabelSource::BuiltInDefault => Path::new("<built-in labels>"),
            LabelSource::Inline => Path::new("<inline labels>"),
        }
    }
}

/// Ordered, immutable list of class labels. Index `i` names model output `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    labels: Vec<String>,
    source: LabelSource,
}

impl ClassCatalog {
    /// Creates a catalog, rejecting empty, blank or duplicate labels.
    pub fn new(labels: Vec<String>, source: LabelSource) -> ClassifyResult<Self> {
        let origin = source.origin();
        if labels.is_empty() {
            return Err(ClassifyError::model_load_message(origin, "label list is empty"));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for (idx, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ClassifyError::model_load_message(
                    origin,
                    format!("label {idx} is blank"),
                ));
            }
            if !seen.insert(label.as_str()) {
                return Err(ClassifyError::model_load_message(
                    origin,
                    format!("label '{label}' appears more than once"),
                ));
            }
        }
        Ok(Self { labels, source })
    }

    /// Builds a catalog from labels given in code.
    pub fn from_labels<I, S>(labels: I) -> ClassifyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            labels.into_iter().map(Into::into).collect(),
            LabelSource::Inline,
        )
    }

    /// Reads a newline-delimited label file. Lines are trimmed and blank lines
    /// skipped; line order is output-index order.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ModelLoad`] if the file cannot be read or its
    /// labels are empty or duplicated.
    pub fn from_file(path: &Path) -> ClassifyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::model_load_error(path, "failed to read label file", Some(e))
        })?;
        let labels = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels, LabelSource::File(path.to_path_buf()))
    }

    /// The built-in label sequence.
    pub fn built_in() -> Self {
        Self {
            labels: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            source: LabelSource::BuiltInDefault,
        }
    }

    /// Loads labels from `labels_path` if that file exists, otherwise falls back
    /// to the built-in sequence when `allow_default` permits it.
    pub fn resolve(labels_path: Option<&Path>, allow_default: bool) -> ClassifyResult<Self> {
        if let Some(path) = labels_path.filter(|p| p.is_file()) {
            return Self::from_file(path);
        }
        let missing = labels_path.unwrap_or(Path::new("<no label file configured>"));
        if !allow_default {
            return Err(ClassifyError::model_load_message(
                missing,
                "label file not found and default labels are disabled",
            ));
        }
        tracing::warn!(
            labels_path = %missing.display(),
            labels = ?DEFAULT_CLASS_LABELS,
            "label file not found; using built-in default labels"
        );
        Ok(Self::built_in())
    }

    /// Checks that the catalog names every output unit of the model.
    pub fn ensure_matches(&self, output_units: usize, model_path: &Path) -> ClassifyResult<()> {
        if self.labels.len() == output_units {
            Ok(())
        } else {
            Err(ClassifyError::model_load_message(
                model_path,
                format!(
                    "catalog has {} labels but the model has {} output units",
                    self.labels.len(),
                    output_units
                ),
            ))
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn source(&self) -> &LabelSource {
        &self.source
    }

    pub fn is_default(&self) -> bool {
        self.source == LabelSource::BuiltInDefault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_file_trims_and_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Jersey\r\n  Holstein Friesian \n\nAyrshire\n").unwrap();

        let catalog = ClassCatalog::from_file(file.path()).unwrap();
        assert_eq!(
            catalog.labels(),
            &["Jersey", "Holstein Friesian", "Ayrshire"]
        );
        assert_eq!(catalog.get(1), Some("Holstein Friesian"));
        assert_eq!(catalog.get(3), None);
        assert!(!catalog.is_default());
    }

    #[test]
    fn test_duplicate_labels_are_rejected() {
        let err = ClassCatalog::from_labels(["A", "B", "A"]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(ClassCatalog::from_file(file.path()).is_err());
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let catalog =
            ClassCatalog::resolve(Some(Path::new("/nonexistent/labels.txt")), true).unwrap();
        assert!(catalog.is_default());
        assert_eq!(catalog.len(), DEFAULT_CLASS_LABELS.len());
    }

    #[test]
    fn test_resolve_without_fallback_fails() {
        let err = ClassCatalog::resolve(None, false).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad { .. }));
    }

    #[test]
    fn test_ensure_matches_reports_count_mismatch() {
        let catalog = ClassCatalog::from_labels(["A", "B", "C"]).unwrap();
        assert!(catalog.ensure_matches(3, Path::new("m")).is_ok());
        let err = catalog.ensure_matches(4, Path::new("m")).unwrap_err();
        assert!(err.to_string().contains("3 labels"));
    }
}
