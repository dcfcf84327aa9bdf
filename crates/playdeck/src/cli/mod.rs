//! CLI definition and command handling

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    AppsCommand, BatchDeployCommand, CompletionsCommand, DeployCommand, DetailsCommand,
    ExpansionFileCommand, HaltCommand, InitCommand, ListingCommand, OrderCommand,
    ProductsCommand, PromoteCommand, PurchaseCommand, ReleasesCommand, ReviewsCommand,
    RolloutCommand, ServeCommand, SubscriptionsCommand, TestersCommand, ValidateCommand,
    VitalsCommand, VoidedCommand,
};

/// playdeck - Google Play release orchestration
#[derive(Debug, Parser)]
#[command(name = "playdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: search upward from the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Service account key: a file path or inline JSON
    #[arg(long, global = true, env = "PLAYDECK_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeCommand),

    /// Upload an artifact and release it on a track
    Deploy(DeployCommand),

    /// Deploy one artifact to several tracks
    BatchDeploy(BatchDeployCommand),

    /// Release an existing version on another track
    Promote(PromoteCommand),

    /// Halt a staged rollout
    Halt(HaltCommand),

    /// Change the rollout percentage of a staged release
    Rollout(RolloutCommand),

    /// Show releases on every track
    Releases(ReleasesCommand),

    /// Read or edit the store listing
    Listing(ListingCommand),

    /// Show app details
    Details(DetailsCommand),

    /// Show or replace the tester groups of a track
    Testers(TestersCommand),

    /// Show the expansion file of an APK version
    ExpansionFile(ExpansionFileCommand),

    /// List apps the service account can see
    Apps(AppsCommand),

    /// Read and answer user reviews
    Reviews(ReviewsCommand),

    /// Show Android vitals
    Vitals(VitalsCommand),

    /// List subscription products
    Subscriptions(SubscriptionsCommand),

    /// Show a subscription purchase
    Purchase(PurchaseCommand),

    /// List voided purchases
    Voided(VoidedCommand),

    /// List or show in-app products
    Products(ProductsCommand),

    /// Show an order
    Order(OrderCommand),

    /// Check inputs without contacting the service
    Validate(ValidateCommand),

    /// Create a configuration file
    Init(InitCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Serve(ref cmd) => cmd.execute(&self),
            Commands::Deploy(ref cmd) => cmd.execute(&self),
            Commands::BatchDeploy(ref cmd) => cmd.execute(&self),
            Commands::Promote(ref cmd) => cmd.execute(&self),
            Commands::Halt(ref cmd) => cmd.execute(&self),
            Commands::Rollout(ref cmd) => cmd.execute(&self),
            Commands::Releases(ref cmd) => cmd.execute(&self),
            Commands::Listing(ref cmd) => cmd.execute(&self),
            Commands::Details(ref cmd) => cmd.execute(&self),
            Commands::Testers(ref cmd) => cmd.execute(&self),
            Commands::ExpansionFile(ref cmd) => cmd.execute(&self),
            Commands::Apps(ref cmd) => cmd.execute(&self),
            Commands::Reviews(ref cmd) => cmd.execute(&self),
            Commands::Vitals(ref cmd) => cmd.execute(&self),
            Commands::Subscriptions(ref cmd) => cmd.execute(&self),
            Commands::Purchase(ref cmd) => cmd.execute(&self),
            Commands::Voided(ref cmd) => cmd.execute(&self),
            Commands::Products(ref cmd) => cmd.execute(&self),
            Commands::Order(ref cmd) => cmd.execute(&self),
            Commands::Validate(ref cmd) => cmd.execute(&self),
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether to print human-readable progress
    pub fn chatty(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "playdeck",
            "--format",
            "json",
            "deploy",
            "com.example.app",
            "app.aab",
            "--track",
            "beta",
            "--rollout",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Deploy(cmd) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(cmd.track, "beta");
        assert_eq!(cmd.rollout, 20.0);
    }

    #[test]
    fn test_parse_testers_update() {
        let cli = Cli::try_parse_from([
            "playdeck",
            "testers",
            "com.example.app",
            "--track",
            "beta",
            "--group",
            "qa@googlegroups.com",
            "--group",
            "beta@googlegroups.com",
        ])
        .unwrap();
        let Commands::Testers(cmd) = cli.command else {
            panic!("expected testers");
        };
        assert_eq!(cmd.groups.len(), 2);
        assert!(!cmd.clear);

        assert!(Cli::try_parse_from([
            "playdeck",
            "testers",
            "com.example.app",
            "--track",
            "beta",
            "--group",
            "qa@googlegroups.com",
            "--clear",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_vitals_metric() {
        let cli = Cli::try_parse_from([
            "playdeck",
            "vitals",
            "metric",
            "com.example.app",
            "anr_rate",
            "--dimension",
            "deviceModel",
        ])
        .unwrap();
        let Commands::Vitals(VitalsCommand {
            command: commands::VitalsSubcommand::Metric { metric, dimension, .. },
        }) = cli.command
        else {
            panic!("expected vitals metric");
        };
        assert_eq!(metric, playdeck_core::VitalsMetricKind::AnrRate);
        assert_eq!(dimension.as_deref(), Some("deviceModel"));

        assert!(Cli::try_parse_from(["playdeck", "vitals", "metric", "com.example.app", "battery"])
            .is_err());
    }

    #[test]
    fn test_parse_expansion_file_type() {
        let cli = Cli::try_parse_from([
            "playdeck",
            "expansion-file",
            "com.example.app",
            "42",
            "--type",
            "patch",
        ])
        .unwrap();
        let Commands::ExpansionFile(cmd) = cli.command else {
            panic!("expected expansion-file");
        };
        assert_eq!(cmd.file_type, playdeck_core::ExpansionFileType::Patch);
    }
}
