//! Detonator CLI entry point.

use clap::Parser;

use detonator::cli::Cli;
use detonator::services::TechniqueRegistry;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = detonator::cli::run(cli, TechniqueRegistry::new()).await {
        detonator::cli::handle_error(err, json_mode);
    }
}
