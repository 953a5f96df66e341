//! Export command handler

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;

use prism_core::{headless_registry, Config, EditorOrchestrator};

use super::{read_document, write_or_print};
use crate::output::Output;

/// Target format for `prism export`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Html,
    Markdown,
}

/// Render a document file in another format
pub fn export(
    config: Config,
    path: &Path,
    format: ExportFormat,
    out: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let rendered = render(config, path, format)?;
    write_or_print(out, &rendered)?;

    if let Some(out) = out {
        output.success(&format!("Exported {} to {}", path.display(), out.display()));
    }
    Ok(())
}

fn render(config: Config, path: &Path, format: ExportFormat) -> Result<String> {
    let doc = read_document(path)?;
    let mut editor = EditorOrchestrator::new(config, Arc::new(headless_registry()));
    editor
        .set_content(doc)
        .with_context(|| format!("Failed to open document: {:?}", path))?;

    let rendered = match format {
        ExportFormat::Json => editor.export_to_json(),
        ExportFormat::Html => editor.export_to_html(),
        ExportFormat::Markdown => editor.export_to_markdown(),
    }
    .context("Failed to export document")?;

    editor.destroy();
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{sample_document, write_document};
    use crate::output::OutputFormat;
    use prism_core::tree;
    use tempfile::TempDir;

    #[test]
    fn test_render_markdown() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_document(temp_dir.path(), "doc.json", &sample_document());

        let markdown = render(Config::default(), &path, ExportFormat::Markdown).unwrap();
        assert!(markdown.contains("# Findings"));
        assert!(markdown.contains("- first"));
    }

    #[test]
    fn test_render_html() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_document(temp_dir.path(), "doc.json", &sample_document());

        let html = render(Config::default(), &path, ExportFormat::Html).unwrap();
        assert!(html.contains("<h1>Findings</h1>"));
        assert!(html.contains("<li>second</li>"));
    }

    #[test]
    fn test_export_json_to_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let doc = sample_document();
        let path = write_document(temp_dir.path(), "doc.json", &doc);
        let out = temp_dir.path().join("copy.json");

        let output = Output::new(OutputFormat::Quiet);
        export(Config::default(), &path, ExportFormat::Json, Some(&out), &output).unwrap();

        let copy = tree::deserialize(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(copy.id, doc.id);
        assert_eq!(copy.blocks().len(), 3);
    }
}
