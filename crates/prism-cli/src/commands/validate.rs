//! Validate command handler

use std::path::Path;

use anyhow::{bail, Context, Result};

use prism_core::tree::{self, ValidationReport};

use crate::output::Output;

/// Check a document file against the tree invariants
pub fn validate(path: &Path, output: &Output) -> Result<()> {
    let report = check_file(path)?;
    output.print_report(path, &report)?;

    if !report.valid {
        bail!("{} failed validation", path.display());
    }
    Ok(())
}

/// Parse a file and collect every finding instead of stopping at the first
fn check_file(path: &Path) -> Result<ValidationReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {:?}", path))?;
    let (_, report) =
        tree::inspect(&json).with_context(|| format!("Not a document: {:?}", path))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{sample_document, write_document};
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_validate_valid_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_document(temp_dir.path(), "doc.json", &sample_document());

        let output = Output::new(OutputFormat::Quiet);
        validate(&path, &output).unwrap();
    }

    #[test]
    fn test_validate_collects_duplicate_ids() {
        let temp_dir = TempDir::new().unwrap();
        let mut value = serde_json::to_value(sample_document()).unwrap();
        value["root"]["children"][1]["id"] = serde_json::Value::from("h");
        let path = temp_dir.path().join("dup.json");
        std::fs::write(&path, value.to_string()).unwrap();

        let report = check_file(&path).unwrap();
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("'h'")));

        let output = Output::new(OutputFormat::Quiet);
        assert!(validate(&path, &output).is_err());
    }

    #[test]
    fn test_validate_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = check_file(&path).unwrap_err();
        assert!(err.to_string().contains("Not a document"));
    }
}
