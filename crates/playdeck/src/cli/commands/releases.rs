//! Releases command

use clap::Args;
use playdeck_core::ExpansionFileType;
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};

/// Show releases on every track
#[derive(Debug, Args)]
pub struct ReleasesCommand {
    /// Application package name
    pub package_name: String,
}

impl ReleasesCommand {
    /// Execute the releases command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(package = %self.package_name, "executing releases command");
        let services = Services::build(cli)?;
        let tracks = runtime()?.block_on(services.releases.get_releases(&self.package_name))?;

        match cli.format {
            OutputFormat::Json => output::json(&tracks)?,
            OutputFormat::Text => output::releases(&self.package_name, &tracks),
        }

        let failed = tracks.iter().filter(|t| t.error.is_some()).count();
        if failed > 0 && cli.chatty() {
            println!();
            output::warning(&format!("{} of {} tracks could not be read", failed, tracks.len()));
        }
        Ok(())
    }
}

/// Show the expansion file of an APK version
#[derive(Debug, Args)]
pub struct ExpansionFileCommand {
    /// Application package name
    pub package_name: String,

    /// APK version code
    pub version_code: i64,

    /// main or patch
    #[arg(long = "type", default_value = "main")]
    pub file_type: ExpansionFileType,
}

impl ExpansionFileCommand {
    /// Execute the expansion-file command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let file = runtime()?.block_on(services.releases.get_expansion_file(
            &self.package_name,
            self.version_code,
            self.file_type,
        ))?;
        match cli.format {
            OutputFormat::Json => output::json(&file)?,
            OutputFormat::Text => output::expansion_file(&file),
        }
        Ok(())
    }
}
