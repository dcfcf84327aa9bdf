//! Store listing and app details commands

use clap::{Args, Subcommand};
use playdeck_core::ListingUpdate;
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};

/// Store listing commands
#[derive(Debug, Args)]
pub struct ListingCommand {
    #[command(subcommand)]
    pub command: ListingSubcommand,
}

/// Listing subcommands
#[derive(Debug, Subcommand)]
pub enum ListingSubcommand {
    /// Show the listing for a language
    Get(ListingGetCommand),

    /// Show the listings of every language
    List {
        /// Application package name
        package_name: String,
    },

    /// Change listing fields; omitted fields stay as they are
    Update(ListingUpdateCommand),
}

/// Show the listing for a language
#[derive(Debug, Args)]
pub struct ListingGetCommand {
    /// Application package name
    pub package_name: String,

    /// Listing language (default: release.default_language)
    #[arg(short, long)]
    pub language: Option<String>,
}

/// Change listing fields
#[derive(Debug, Args)]
pub struct ListingUpdateCommand {
    /// Application package name
    pub package_name: String,

    /// Listing language (default: release.default_language)
    #[arg(short, long)]
    pub language: Option<String>,

    /// App title (max 50 characters)
    #[arg(long)]
    pub title: Option<String>,

    /// Short description (max 80 characters)
    #[arg(long)]
    pub short_description: Option<String>,

    /// Full description (max 4000 characters)
    #[arg(long)]
    pub full_description: Option<String>,

    /// Promo video URL
    #[arg(long)]
    pub video: Option<String>,
}

impl ListingCommand {
    /// Execute the listing command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let rt = runtime()?;

        match &self.command {
            ListingSubcommand::Get(cmd) => {
                let language = cmd
                    .language
                    .clone()
                    .unwrap_or_else(|| services.config.release.default_language.clone());
                info!(package = %cmd.package_name, language = %language, "executing listing get");

                let listing =
                    rt.block_on(services.listings.get_listing(&cmd.package_name, &language))?;
                match cli.format {
                    OutputFormat::Json => output::json(&listing)?,
                    OutputFormat::Text => output::listing(&listing),
                }
            }
            ListingSubcommand::List { package_name } => {
                let listings = rt.block_on(services.listings.list_all_listings(package_name))?;
                match cli.format {
                    OutputFormat::Json => output::json(&listings)?,
                    OutputFormat::Text => {
                        for (i, listing) in listings.iter().enumerate() {
                            if i > 0 {
                                println!();
                            }
                            output::listing(listing);
                        }
                    }
                }
            }
            ListingSubcommand::Update(cmd) => {
                let language = cmd
                    .language
                    .clone()
                    .unwrap_or_else(|| services.config.release.default_language.clone());
                info!(package = %cmd.package_name, language = %language, "executing listing update");

                let update = ListingUpdate {
                    title: cmd.title.clone(),
                    short_description: cmd.short_description.clone(),
                    full_description: cmd.full_description.clone(),
                    video: cmd.video.clone(),
                };
                if update == ListingUpdate::default() {
                    anyhow::bail!("Nothing to update: pass at least one listing field");
                }

                let listing = rt.block_on(services.listings.update_listing(
                    &cmd.package_name,
                    &language,
                    &update,
                ))?;
                match cli.format {
                    OutputFormat::Json => output::json(&listing)?,
                    OutputFormat::Text if !cli.quiet => {
                        output::success(&format!("Updated {} listing", language));
                        output::listing(&listing);
                    }
                    OutputFormat::Text => {}
                }
            }
        }
        Ok(())
    }
}

/// Show app details
#[derive(Debug, Args)]
pub struct DetailsCommand {
    /// Application package name
    pub package_name: String,

    /// Language of the listing text (default: release.default_language)
    #[arg(short, long)]
    pub language: Option<String>,
}

impl DetailsCommand {
    /// Execute the details command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(package = %self.package_name, "executing details command");
        let services = Services::build(cli)?;
        let language = self
            .language
            .clone()
            .unwrap_or_else(|| services.config.release.default_language.clone());

        let details = runtime()?
            .block_on(services.listings.get_app_details(&self.package_name, &language))?;
        match cli.format {
            OutputFormat::Json => output::json(&details)?,
            OutputFormat::Text => output::details(&details),
        }
        Ok(())
    }
}
