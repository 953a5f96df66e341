//! Command handlers

pub mod config;
pub mod export;
pub mod history;
pub mod recommend;
pub mod stats;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use prism_core::{tree, Document};

/// Read and validate a document file
pub fn read_document(path: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {:?}", path))?;
    tree::deserialize(&json).with_context(|| format!("Failed to load document: {:?}", path))
}

/// Write `content` to `path`, or to stdout when no path is given
pub fn write_or_print(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write file: {:?}", path)),
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_document(temp_dir.path(), "doc.json", &sample_document());

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.id, "doc-cli");
        assert_eq!(doc.blocks().len(), 3);
    }

    #[test]
    fn test_read_document_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_document(&temp_dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read document"));
    }

    #[test]
    fn test_write_or_print_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.md");
        write_or_print(Some(&path), "# Title\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Title\n");
    }
}
