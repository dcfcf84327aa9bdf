//! Validate command

use clap::{Args, Subcommand};
use tracing::info;

use playdeck_core::config::validation::validate_config;
use playdeck_core::validation::{
    validate_listing_text, validate_package_name, validate_rollout, validate_track,
};
use playdeck_core::{PublishError, ValidationReport};

use crate::cli::context;
use crate::cli::{output, Cli, OutputFormat};

/// Check inputs without contacting the service
#[derive(Debug, Args)]
pub struct ValidateCommand {
    #[command(subcommand)]
    pub command: ValidateSubcommand,
}

/// Validate subcommands
#[derive(Debug, Subcommand)]
pub enum ValidateSubcommand {
    /// Check an application package name
    Package {
        /// Package name, e.g. com.example.app
        package_name: String,
    },

    /// Check a track name
    Track {
        /// Track name
        track: String,
    },

    /// Check a rollout percentage
    Rollout {
        /// Percentage of users (0-100)
        percentage: f64,
    },

    /// Check listing text lengths
    Listing {
        /// App title
        #[arg(long)]
        title: Option<String>,

        /// Short description
        #[arg(long)]
        short_description: Option<String>,

        /// Full description
        #[arg(long)]
        full_description: Option<String>,
    },

    /// Check the configuration file
    Config,
}

impl ValidateCommand {
    /// Execute the validate command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(command = ?self.command, "executing validate command");

        let report = match &self.command {
            ValidateSubcommand::Package { package_name } => validate_package_name(package_name),
            ValidateSubcommand::Track { track } => validate_track(track),
            ValidateSubcommand::Rollout { percentage } => validate_rollout(*percentage),
            ValidateSubcommand::Listing {
                title,
                short_description,
                full_description,
            } => validate_listing_text(
                title.as_deref(),
                short_description.as_deref(),
                full_description.as_deref(),
            ),
            ValidateSubcommand::Config => return self.check_config(cli),
        };

        self.report(cli, report)
    }

    fn check_config(&self, cli: &Cli) -> anyhow::Result<()> {
        let (config, path) = context::load(cli)?;
        validate_config(&config).map_err(PublishError::from)?;

        if !cli.quiet {
            match path {
                Some(path) => output::success(&format!(
                    "Configuration at {} is valid",
                    output::path_style().apply_to(path.display())
                )),
                None => output::success("No configuration file found; defaults are valid"),
            }
            if !config.credentials.is_configured() {
                output::warning("No credential source configured");
            }
        }
        Ok(())
    }

    fn report(&self, cli: &Cli, report: ValidationReport) -> anyhow::Result<()> {
        match cli.format {
            OutputFormat::Json => output::json(&report)?,
            OutputFormat::Text if report.is_valid() => {
                if !cli.quiet {
                    output::success("Valid");
                }
            }
            OutputFormat::Text => output::violations(&report),
        }

        if !report.is_valid() {
            std::process::exit(crate::exit_codes::VALIDATION_ERROR);
        }
        Ok(())
    }
}
