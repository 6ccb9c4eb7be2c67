//! testrecall CLI entry point.

use clap::Parser;

use testrecall::cli::commands::{self, CommandContext};
use testrecall::cli::{handle_error, Cli, Commands};
use testrecall::infrastructure::config::ConfigLoader;
use testrecall::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    // Dropping the logger flushes the file appender.
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging).verbose(cli.verbose)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let ctx = CommandContext::new(config, cli.json);
    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Import(args) => commands::import::execute(args, &ctx).await,
        Commands::Runs(args) => commands::runs::execute(args, &ctx).await,
        Commands::History(args) => commands::history::execute(args, &ctx).await,
        Commands::Failed(args) => commands::failed::execute(args, &ctx).await,
        Commands::Check(args) => commands::check::execute(args, &ctx).await,
        Commands::CheckRun(args) => commands::check_run::execute(args, &ctx).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
