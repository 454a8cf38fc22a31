mod cli;
mod error;
mod logging;
mod startup;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use cardingest_config::Config;
use cardingest_ingest::Context;
use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use exn::ResultExt;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            _ = err.print();
            return match err.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        },
    };

    let config = Config::load();
    let log_file = config.as_ref().ok().and_then(|config| config.log_file.as_deref());
    if let Err(err) = logging::init(log_file) {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    let result = match config.or_raise(|| ErrorKind::Config) {
        Ok(config) => run(&cli, &config).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let storage = startup::storage(&config.storage)?;
    let catalog = startup::catalog(&cli.command).await?;
    let ctx = Context::new(storage, catalog.handle, config);

    let summary = cardingest_ingest::run(&ctx, cli.command.roots(), cli.command.report()).await;
    if let Some(database) = catalog.database {
        database.close().await;
    }
    let summary = summary.or_raise(|| ErrorKind::Batch)?;
    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "some collections failed; see the report for details");
    }
    Ok(())
}
