//! Subscription, purchase, product and order lookups

use clap::{Args, Subcommand};
use tracing::info;

use crate::cli::context::{runtime, Services};
use crate::cli::{output, Cli, OutputFormat};

/// List subscription products and their base plans
#[derive(Debug, Args)]
pub struct SubscriptionsCommand {
    /// Application package name
    pub package_name: String,
}

impl SubscriptionsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let products =
            runtime()?.block_on(services.commerce.list_subscriptions(&self.package_name))?;
        match cli.format {
            OutputFormat::Json => output::json(&products)?,
            OutputFormat::Text => output::subscriptions(&products),
        }
        Ok(())
    }
}

/// Show the state of a subscription purchase
#[derive(Debug, Args)]
pub struct PurchaseCommand {
    /// Application package name
    pub package_name: String,

    /// Subscription product ID
    pub subscription_id: String,

    /// Purchase token from the device
    pub token: String,
}

impl PurchaseCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            package = %self.package_name,
            subscription_id = %self.subscription_id,
            "executing purchase command"
        );
        let services = Services::build(cli)?;
        let purchase = runtime()?.block_on(services.commerce.get_subscription_purchase(
            &self.package_name,
            &self.subscription_id,
            &self.token,
        ))?;
        match cli.format {
            OutputFormat::Json => output::json(&purchase)?,
            OutputFormat::Text => output::purchase(&purchase),
        }
        Ok(())
    }
}

/// List refunded, charged back or revoked purchases
#[derive(Debug, Args)]
pub struct VoidedCommand {
    /// Application package name
    pub package_name: String,

    /// Maximum purchases to return
    #[arg(short = 'n', long)]
    pub max_results: Option<u32>,
}

impl VoidedCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let voided = runtime()?.block_on(
            services
                .commerce
                .list_voided_purchases(&self.package_name, self.max_results),
        )?;
        match cli.format {
            OutputFormat::Json => output::json(&voided)?,
            OutputFormat::Text => output::voided(&voided),
        }
        Ok(())
    }
}

/// In-app product commands
#[derive(Debug, Args)]
pub struct ProductsCommand {
    #[command(subcommand)]
    pub command: ProductsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ProductsSubcommand {
    /// List every in-app product
    List {
        /// Application package name
        package_name: String,
    },

    /// Show one in-app product
    Get {
        /// Application package name
        package_name: String,

        /// Product SKU
        sku: String,
    },
}

impl ProductsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::build(cli)?;
        let rt = runtime()?;

        match &self.command {
            ProductsSubcommand::List { package_name } => {
                let products = rt.block_on(services.commerce.list_in_app_products(package_name))?;
                match cli.format {
                    OutputFormat::Json => output::json(&products)?,
                    OutputFormat::Text => output::products(&products),
                }
            }
            ProductsSubcommand::Get { package_name, sku } => {
                let product =
                    rt.block_on(services.commerce.get_in_app_product(package_name, sku))?;
                match cli.format {
                    OutputFormat::Json => output::json(&product)?,
                    OutputFormat::Text => output::product(&product),
                }
            }
        }
        Ok(())
    }
}

/// Show an order
#[derive(Debug, Args)]
pub struct OrderCommand {
    /// Application package name
    pub package_name: String,

    /// Order ID (GPA.xxxx)
    pub order_id: String,
}

impl OrderCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(package = %self.package_name, order_id = %self.order_id, "executing order command");
        let services = Services::build(cli)?;
        let order =
            runtime()?.block_on(services.commerce.get_order(&self.package_name, &self.order_id))?;
        match cli.format {
            OutputFormat::Json => output::json(&order)?,
            OutputFormat::Text => output::order(&order),
        }
        Ok(())
    }
}
