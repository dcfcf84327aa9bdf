//! App, review and vitals commands

use clap::{Args, Subcommand};
use playdeck_core::VitalsMetricKind;
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};

/// List apps the service account can see
#[derive(Debug, Args)]
pub struct AppsCommand {}

impl AppsCommand {
    /// Execute the apps command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let apps = runtime()?.block_on(services.insights.list_apps())?;
        match cli.format {
            OutputFormat::Json => output::json(&apps)?,
            OutputFormat::Text => output::apps(&apps),
        }
        Ok(())
    }
}

/// User review commands
#[derive(Debug, Args)]
pub struct ReviewsCommand {
    #[command(subcommand)]
    pub command: ReviewsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ReviewsSubcommand {
    /// Show recent reviews
    List(ReviewsListCommand),

    /// Reply to a review, replacing any earlier reply
    Reply(ReviewReplyCommand),
}

#[derive(Debug, Args)]
pub struct ReviewsListCommand {
    /// Application package name
    pub package_name: String,

    /// Reviews per page
    #[arg(short = 'n', long)]
    pub max_results: Option<u32>,

    /// Reviews to skip
    #[arg(long)]
    pub start_index: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ReviewReplyCommand {
    /// Application package name
    pub package_name: String,

    /// Review to answer
    pub review_id: String,

    /// Reply text (max 350 characters)
    pub text: String,
}

impl ReviewsCommand {
    /// Execute the reviews command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let rt = runtime()?;

        match &self.command {
            ReviewsSubcommand::List(cmd) => {
                info!(package = %cmd.package_name, "executing reviews list");
                let reviews = rt.block_on(services.insights.list_reviews(
                    &cmd.package_name,
                    cmd.max_results,
                    cmd.start_index,
                ))?;
                match cli.format {
                    OutputFormat::Json => output::json(&reviews)?,
                    OutputFormat::Text => output::reviews(&reviews),
                }
            }
            ReviewsSubcommand::Reply(cmd) => {
                info!(package = %cmd.package_name, review_id = %cmd.review_id, "executing reviews reply");
                let reply = rt.block_on(services.insights.reply_to_review(
                    &cmd.package_name,
                    &cmd.review_id,
                    &cmd.text,
                ))?;
                match cli.format {
                    OutputFormat::Json => output::json(&reply)?,
                    OutputFormat::Text if !cli.quiet => output::success(&reply.message),
                    OutputFormat::Text => {}
                }
            }
        }
        Ok(())
    }
}

/// Android vitals commands
#[derive(Debug, Args)]
pub struct VitalsCommand {
    #[command(subcommand)]
    pub command: VitalsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum VitalsSubcommand {
    /// Latest value of every metric
    Overview {
        /// Application package name
        package_name: String,
    },

    /// One metric broken down by a dimension
    Metric {
        /// Application package name
        package_name: String,

        /// crash_rate, anr_rate, excessive_wakeups or stuck_wake_locks
        metric: VitalsMetricKind,

        /// Breakdown dimension (default: apiLevel)
        #[arg(short, long)]
        dimension: Option<String>,
    },
}

impl VitalsCommand {
    /// Execute the vitals command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let rt = runtime()?;

        match &self.command {
            VitalsSubcommand::Overview { package_name } => {
                let overview = rt.block_on(services.insights.vitals_overview(package_name))?;
                match cli.format {
                    OutputFormat::Json => output::json(&overview)?,
                    OutputFormat::Text => output::vitals_overview(&overview),
                }
            }
            VitalsSubcommand::Metric {
                package_name,
                metric,
                dimension,
            } => {
                let metrics = rt.block_on(services.insights.vitals_metrics(
                    package_name,
                    *metric,
                    dimension.as_deref(),
                ))?;
                match cli.format {
                    OutputFormat::Json => output::json(&metrics)?,
                    OutputFormat::Text => output::vitals_metrics(&metrics),
                }
            }
        }
        Ok(())
    }
}
