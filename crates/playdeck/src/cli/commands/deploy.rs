//! Deploy and batch deploy commands

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use playdeck_core::ReleaseNotes;
use playdeck_publisher::{BatchDeployRequest, DeployRequest, ReleaseNotesInput};
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Release notes flags shared by deploy commands
#[derive(Debug, Args)]
pub struct NotesArgs {
    /// Release notes in the default language
    #[arg(long, conflicts_with = "localized_notes")]
    pub notes: Option<String>,

    /// Release notes for one language as LANG=TEXT (repeatable)
    #[arg(long = "notes-for", value_name = "LANG=TEXT", value_parser = parse_pair)]
    pub localized_notes: Vec<(String, String)>,
}

impl NotesArgs {
    fn to_input(&self) -> Option<ReleaseNotesInput> {
        if let Some(text) = &self.notes {
            return Some(ReleaseNotesInput::Text(text.clone()));
        }
        if self.localized_notes.is_empty() {
            return None;
        }
        let notes: ReleaseNotes = self.localized_notes.iter().cloned().collect();
        Some(ReleaseNotesInput::Localized(notes))
    }
}

/// Upload an artifact and release it on a track
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Application package name
    pub package_name: String,

    /// Path to the .aab or .apk
    pub artifact: PathBuf,

    /// Target track (internal, alpha, beta, production)
    #[arg(short, long, default_value = "internal")]
    pub track: String,

    /// Percentage of users receiving the release (0-100)
    #[arg(short, long, default_value_t = 100.0)]
    pub rollout: f64,

    #[command(flatten)]
    pub notes: NotesArgs,
}

impl DeployCommand {
    /// Execute the deploy command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        runtime()?.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            track = %self.track,
            artifact = %self.artifact.display(),
            "executing deploy command"
        );
        let services = Services::build(cli)?;

        if cli.chatty() {
            output::info(&format!(
                "Deploying {} to {}",
                output::path_style().apply_to(self.artifact.display()),
                self.track
            ));
        }

        let request = DeployRequest {
            package_name: self.package_name.clone(),
            track: self.track.clone(),
            artifact: self.artifact.clone(),
            release_notes: self.notes.to_input(),
            rollout_percentage: self.rollout,
        };
        let result = services.releases.deploy(&request).await?;

        match cli.format {
            OutputFormat::Json => output::json(&result)?,
            OutputFormat::Text if !cli.quiet => output::deployment(&result),
            OutputFormat::Text => {}
        }
        Ok(())
    }
}

/// Deploy one artifact to several tracks
#[derive(Debug, Args)]
pub struct BatchDeployCommand {
    /// Application package name
    pub package_name: String,

    /// Path to the .aab or .apk
    pub artifact: PathBuf,

    /// Tracks to deploy to, in order
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub tracks: Vec<String>,

    /// Rollout percentage for tracks without an override
    #[arg(short, long, default_value_t = 100.0)]
    pub rollout: f64,

    /// Per-track rollout as TRACK=PERCENT (repeatable)
    #[arg(long = "track-rollout", value_name = "TRACK=PERCENT", value_parser = parse_rollout)]
    pub track_rollouts: Vec<(String, f64)>,

    #[command(flatten)]
    pub notes: NotesArgs,
}

impl BatchDeployCommand {
    /// Execute the batch deploy command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        runtime()?.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            tracks = ?self.tracks,
            "executing batch deploy command"
        );
        let services = Services::build(cli)?;

        let request = BatchDeployRequest {
            package_name: self.package_name.clone(),
            artifact: self.artifact.clone(),
            tracks: self.tracks.clone(),
            release_notes: self.notes.to_input(),
            rollout_percentage: self.rollout,
            track_rollouts: self.track_rollouts.iter().cloned().collect::<BTreeMap<_, _>>(),
        };
        let result = services.releases.batch_deploy(&request).await?;

        match cli.format {
            OutputFormat::Json => output::json(&result.summary())?,
            OutputFormat::Text if !cli.quiet => output::batch(&result),
            OutputFormat::Text => {}
        }

        if !result.success() {
            std::process::exit(exit_codes::PARTIAL_FAILURE);
        }
        Ok(())
    }
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    let (key, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))?;
    if key.is_empty() {
        return Err(format!("missing key in '{}'", value));
    }
    Ok((key.to_string(), rest.to_string()))
}

fn parse_rollout(value: &str) -> Result<(String, f64), String> {
    let (track, percent) = parse_pair(value)?;
    let percent: f64 = percent
        .trim_end_matches('%')
        .parse()
        .map_err(|_| format!("invalid percentage in '{}'", value))?;
    Ok((track, percent))
}
