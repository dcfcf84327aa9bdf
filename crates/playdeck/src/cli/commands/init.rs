//! Init command

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use dialoguer::{Confirm, Select};
use tracing::info;

use playdeck_core::config::defaults::{
    DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML,
};
use playdeck_core::config::Config;

use crate::cli::{output, Cli};

/// Create a playdeck configuration file
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Use defaults without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, yes = self.yes, "executing init command");
        let cwd = std::env::current_dir()?;

        let format = match &self.output {
            Some(path) => format_for(path),
            None if self.yes => "toml",
            None => {
                let formats = ["toml", "yaml"];
                let selection = Select::new()
                    .with_prompt("Configuration format")
                    .items(&formats)
                    .default(0)
                    .interact()?;
                formats[selection]
            }
        };
        let config_path = self.output.clone().unwrap_or_else(|| {
            cwd.join(if format == "yaml" {
                DEFAULT_CONFIG_YAML
            } else {
                DEFAULT_CONFIG_TOML
            })
        });

        if config_path.exists() && !self.force {
            if self.yes {
                anyhow::bail!(
                    "Configuration file already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }

            let overwrite = Confirm::new()
                .with_prompt(format!(
                    "Configuration file already exists at {}. Overwrite?",
                    config_path.display()
                ))
                .default(false)
                .interact()?;

            if !overwrite {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        std::fs::write(&config_path, render(format)?)?;

        if !cli.quiet {
            output::success(&format!(
                "Created configuration at {}",
                output::path_style().apply_to(config_path.display())
            ));
            println!();
            println!("Next steps:");
            println!(
                "  1. Set credentials.path in {} or export PLAYDECK_CREDENTIALS",
                config_path.display()
            );
            println!(
                "  2. Run {} to check a package name",
                style("playdeck validate package com.example.app").cyan()
            );
            println!(
                "  3. Run {} to see what is live",
                style("playdeck releases com.example.app").cyan()
            );
        }

        Ok(())
    }
}

fn format_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => "yaml",
        _ => "toml",
    }
}

/// Default configuration in the requested format
fn render(format: &str) -> anyhow::Result<String> {
    if format == "yaml" {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE)?;
        Ok(serde_yaml::to_string(&config)?)
    } else {
        Ok(DEFAULT_CONFIG_TEMPLATE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_extension() {
        assert_eq!(format_for(Path::new("playdeck.yml")), "yaml");
        assert_eq!(format_for(Path::new("playdeck.yaml")), "yaml");
        assert_eq!(format_for(Path::new("playdeck.toml")), "toml");
        assert_eq!(format_for(Path::new("playdeck")), "toml");
    }

    #[test]
    fn test_rendered_configs_load() {
        let dir = tempfile::TempDir::new().unwrap();

        let toml_path = dir.path().join("playdeck.toml");
        std::fs::write(&toml_path, render("toml").unwrap()).unwrap();
        let config = playdeck_core::config::load_config(&toml_path).unwrap();
        assert_eq!(config.retry.max_retries, 3);

        let yaml_path = dir.path().join("playdeck.yaml");
        std::fs::write(&yaml_path, render("yaml").unwrap()).unwrap();
        let config = playdeck_core::config::load_config(&yaml_path).unwrap();
        assert_eq!(config.server.port, 8000);
    }
}
