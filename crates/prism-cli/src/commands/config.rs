//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use prism_core::{Config, SceneTemplate};

use crate::output::{Output, OutputFormat};

/// Keys accepted by `prism config set`
const KEYS: &str = "data_dir, log_file, default_scene, max_history_size, auto_save, \
                    auto_save_interval_secs, content_debounce_ms, selection_throttle_ms, \
                    ai_timeout_secs";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to encode configuration")?;
            println!("{}", json);
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!(
                "  log_file:              {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  default_scene:         {}", config.default_scene);
            println!();
            println!("History:");
            println!("  max_history_size:      {}", config.history.max_history_size);
            println!("  compress_interval:     {}", config.history.compress_interval);
            println!("  auto_save:             {}", config.history.auto_save);
            println!(
                "  auto_save_interval:    {}s",
                config.history.auto_save_interval_secs
            );
            println!();
            println!("Input:");
            println!("  content_debounce:      {}ms", config.input.content_debounce_ms);
            println!(
                "  selection_throttle:    {}ms",
                config.input.selection_throttle_ms
            );
            println!();
            println!("AI:");
            println!("  timeout:               {}s", config.ai.timeout_secs);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "default_scene" => {
            config.default_scene = value
                .parse::<SceneTemplate>()
                .context("Invalid value for default_scene")?;
        }
        "max_history_size" => {
            let size: usize = value
                .parse()
                .context("Invalid value for max_history_size. Use a positive number.")?;
            if size == 0 {
                bail!("max_history_size must be at least 1");
            }
            config.history.max_history_size = size;
        }
        "auto_save" => {
            config.history.auto_save = value
                .parse()
                .context("Invalid value for auto_save. Use 'true' or 'false'.")?;
        }
        "auto_save_interval_secs" => {
            config.history.auto_save_interval_secs = value
                .parse()
                .context("Invalid value for auto_save_interval_secs")?;
        }
        "content_debounce_ms" => {
            config.input.content_debounce_ms = value
                .parse()
                .context("Invalid value for content_debounce_ms")?;
        }
        "selection_throttle_ms" => {
            config.input.selection_throttle_ms = value
                .parse()
                .context("Invalid value for selection_throttle_ms")?;
        }
        "ai_timeout_secs" => {
            config.ai.timeout_secs = value
                .parse()
                .context("Invalid value for ai_timeout_secs")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "default_scene", "project-management").unwrap();
        apply(&mut config, "max_history_size", "10").unwrap();
        apply(&mut config, "auto_save", "false").unwrap();
        apply(&mut config, "log_file", "/tmp/prism.log").unwrap();

        assert_eq!(config.default_scene, SceneTemplate::ProjectManagement);
        assert_eq!(config.history.max_history_size, 10);
        assert!(!config.history.auto_save);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/prism.log")));

        apply(&mut config, "log_file", "none").unwrap();
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "default_scene", "daydreaming").is_err());
        assert!(apply(&mut config, "max_history_size", "0").is_err());
        assert!(apply(&mut config, "auto_save", "maybe").is_err());

        let err = apply(&mut config, "sync_url", "x").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "content_debounce_ms".to_string(),
            "250".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("content_debounce_ms = 250"));
    }
}
