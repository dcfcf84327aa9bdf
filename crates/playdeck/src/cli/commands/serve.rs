//! Serve command

use clap::Args;
use playdeck_server::AppState;
use tracing::{info, warn};

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli};

/// Run the HTTP service
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind (default: server.host)
    #[arg(long, env = "PLAYDECK_HOST")]
    pub host: Option<String>,

    /// Port to bind (default: server.port)
    #[arg(short, long, env = "PLAYDECK_PORT")]
    pub port: Option<u16>,
}

impl ServeCommand {
    /// Execute the serve command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        runtime()?.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let mut server = services.config.server.clone();
        if let Some(host) = &self.host {
            server.host = host.clone();
        }
        if let Some(port) = self.port {
            server.port = port;
        }

        // A bad startup credential is not fatal: it can be replaced through the endpoint
        match services.store.probe_current().await {
            Ok(()) => info!(
                client_email = services.store.get().client_email(),
                "startup credential validated"
            ),
            Err(e) => {
                warn!(error = %e, "startup credential failed validation");
                if !cli.quiet {
                    output::warning(&format!(
                        "Startup credential failed validation: {}. POST new credentials to /credentials.",
                        e
                    ));
                }
            }
        }

        if cli.chatty() {
            output::info(&format!(
                "Listening on http://{}:{}",
                server.host, server.port
            ));
        }
        let state = AppState::new(
            services.client.clone(),
            &services.config.release.default_language,
        );
        playdeck_server::serve(&server, state).await?;
        Ok(())
    }
}
