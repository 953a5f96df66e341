//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use prism_core::history::HistoryStats;
use prism_core::tree::ValidationReport;
use prism_core::{Recommendation, StateSnapshot};

use crate::commands::stats::DocumentStats;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the outcome of validating one file
    pub fn print_report(&self, path: &Path, report: &ValidationReport) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if report.valid {
                    println!("✓ {} is valid", path.display());
                } else {
                    println!("✗ {} is invalid", path.display());
                }
                for error in &report.errors {
                    println!("  error:   {}", error);
                }
                for warning in &report.warnings {
                    println!("  warning: {}", warning);
                }
            }
            OutputFormat::Json => print_json(report)?,
            OutputFormat::Quiet => {
                println!("{}", if report.valid { "valid" } else { "invalid" });
            }
        }
        Ok(())
    }

    /// Print document statistics
    pub fn print_stats(&self, stats: &DocumentStats) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", stats.id);
                if let Some(ref title) = stats.title {
                    println!("Title:     {}", truncate(title, 60));
                }
                println!("Blocks:    {}", stats.blocks);
                println!("Nodes:     {}", stats.nodes);
                println!("Depth:     {}", stats.max_depth);
                println!("Words:     {}", stats.words);
                if let Some(scene) = stats.scene_template {
                    println!("Scene:     {}", scene);
                }
                if let Some(view) = stats.view_type {
                    println!("View:      {}", view.display_name());
                }
                println!("Updated:   {}", stats.updated_at.format("%Y-%m-%d %H:%M"));

                if !stats.node_types.is_empty() {
                    println!();
                    println!("── Node types ──");
                    for (node_type, count) in &stats.node_types {
                        println!("{:<14} {}", node_type, count);
                    }
                }
            }
            OutputFormat::Json => print_json(stats)?,
            OutputFormat::Quiet => {
                println!("{}", stats.nodes);
            }
        }
        Ok(())
    }

    /// Print view recommendations, best first
    pub fn print_recommendations(&self, recommendations: &[Recommendation]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if recommendations.is_empty() {
                    println!("No views support this scene.");
                    return Ok(());
                }
                for rec in recommendations {
                    println!(
                        "{:<10} {:>4.0}%  {}",
                        rec.view_type.as_str(),
                        rec.confidence * 100.0,
                        truncate(&rec.reason, 50)
                    );
                }
                println!("\n{} view(s)", recommendations.len());
            }
            OutputFormat::Json => print_json(&recommendations)?,
            OutputFormat::Quiet => {
                for rec in recommendations {
                    println!("{}", rec.view_type);
                }
            }
        }
        Ok(())
    }

    /// Print the persisted history: statistics plus one line per snapshot
    pub fn print_history(
        &self,
        stats: &HistoryStats,
        snapshots: &[Arc<StateSnapshot>],
    ) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if snapshots.is_empty() {
                    println!("No history recorded.");
                    return Ok(());
                }
                for (index, snapshot) in snapshots.iter().enumerate() {
                    let marker = if stats.current_index == Some(index) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:>3} | {} | {:<14} | {}",
                        marker,
                        index,
                        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        truncate(snapshot.operation(), 14),
                        truncate_line(snapshot.document.title.as_deref().unwrap_or(""), 30)
                    );
                }
                println!();
                println!(
                    "{} snapshot(s), undo: {}, redo: {}",
                    stats.total_snapshots,
                    if stats.can_undo { "yes" } else { "no" },
                    if stats.can_redo { "yes" } else { "no" }
                );
            }
            OutputFormat::Json => print_json(stats)?,
            OutputFormat::Quiet => {
                if let Some(index) = stats.current_index {
                    println!("{}", index);
                }
            }
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{}", json);
    Ok(())
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
