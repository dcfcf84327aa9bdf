//! Commands that change an existing release

use clap::Args;
use playdeck_core::DeploymentResult;
use playdeck_publisher::PromoteRequest;
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};

fn report(cli: &Cli, result: &DeploymentResult) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => output::json(result)?,
        OutputFormat::Text if !cli.quiet => output::deployment(result),
        OutputFormat::Text => {}
    }
    Ok(())
}

/// Release an existing version on another track
#[derive(Debug, Args)]
pub struct PromoteCommand {
    /// Application package name
    pub package_name: String,

    /// Version code to promote
    pub version_code: i64,

    /// Track the version is currently on
    #[arg(long)]
    pub from: String,

    /// Track to release it on
    #[arg(long)]
    pub to: String,

    /// Percentage of users receiving the release (0-100)
    #[arg(short, long, default_value_t = 100.0)]
    pub rollout: f64,
}

impl PromoteCommand {
    /// Execute the promote command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            version_code = self.version_code,
            from = %self.from,
            to = %self.to,
            "executing promote command"
        );
        let services = Services::build(cli)?;
        let request = PromoteRequest {
            package_name: self.package_name.clone(),
            from_track: self.from.clone(),
            to_track: self.to.clone(),
            version_code: self.version_code,
            rollout_percentage: self.rollout,
        };

        let result = runtime()?.block_on(services.releases.promote(&request))?;
        report(cli, &result)
    }
}

/// Halt a staged rollout
#[derive(Debug, Args)]
pub struct HaltCommand {
    /// Application package name
    pub package_name: String,

    /// Version code to halt
    pub version_code: i64,

    /// Track of the release
    #[arg(short, long)]
    pub track: String,
}

impl HaltCommand {
    /// Execute the halt command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            version_code = self.version_code,
            track = %self.track,
            "executing halt command"
        );
        let services = Services::build(cli)?;
        let result = runtime()?.block_on(services.releases.halt(
            &self.package_name,
            &self.track,
            self.version_code,
        ))?;
        report(cli, &result)
    }
}

/// Change the rollout percentage of a staged release
#[derive(Debug, Args)]
pub struct RolloutCommand {
    /// Application package name
    pub package_name: String,

    /// Version code of the release
    pub version_code: i64,

    /// New rollout percentage (0-100); 100 completes the rollout
    pub percentage: f64,

    /// Track of the release
    #[arg(short, long)]
    pub track: String,
}

impl RolloutCommand {
    /// Execute the rollout command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            version_code = self.version_code,
            track = %self.track,
            percentage = self.percentage,
            "executing rollout command"
        );
        let services = Services::build(cli)?;
        let result = runtime()?.block_on(services.releases.update_rollout(
            &self.package_name,
            &self.track,
            self.version_code,
            self.percentage,
        ))?;
        report(cli, &result)
    }
}

/// Tester groups of a track
#[derive(Debug, Args)]
pub struct TestersCommand {
    /// Application package name
    pub package_name: String,

    /// Track whose testers to show or change
    #[arg(short, long)]
    pub track: String,

    /// Replace the tester groups with these addresses (repeatable)
    #[arg(long = "group", value_name = "EMAIL")]
    pub groups: Vec<String>,

    /// Remove every tester group
    #[arg(long, conflicts_with = "groups")]
    pub clear: bool,
}

impl TestersCommand {
    /// Execute the testers command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let rt = runtime()?;

        if self.groups.is_empty() && !self.clear {
            let testers =
                rt.block_on(services.releases.get_testers(&self.package_name, &self.track))?;
            match cli.format {
                OutputFormat::Json => output::json(&testers)?,
                OutputFormat::Text => output::testers(&testers),
            }
            return Ok(());
        }

        info!(
            package = %self.package_name,
            track = %self.track,
            groups = self.groups.len(),
            "executing testers update"
        );
        let update = rt.block_on(services.releases.update_testers(
            &self.package_name,
            &self.track,
            self.groups.clone(),
        ))?;
        match cli.format {
            OutputFormat::Json => output::json(&update)?,
            OutputFormat::Text if !cli.quiet => {
                output::success(&update.message);
                output::testers(&update.testers);
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }
}
