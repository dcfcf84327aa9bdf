//! CLI commands

mod commerce;
mod completions;
mod deploy;
mod init;
mod insights;
mod listing;
mod releases;
mod serve;
mod tracks;
mod validate;

pub use commerce::{
    OrderCommand, ProductsCommand, PurchaseCommand, SubscriptionsCommand, VoidedCommand,
};
pub use completions::CompletionsCommand;
pub use deploy::{BatchDeployCommand, DeployCommand};
pub use init::InitCommand;
pub use insights::{AppsCommand, ReviewsCommand, VitalsCommand, VitalsSubcommand};
pub use listing::{DetailsCommand, ListingCommand};
pub use releases::{ExpansionFileCommand, ReleasesCommand};
pub use serve::ServeCommand;
pub use tracks::{HaltCommand, PromoteCommand, RolloutCommand, TestersCommand};
pub use validate::ValidateCommand;
