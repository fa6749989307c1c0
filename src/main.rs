mod cli;
mod config;
mod io;
mod logging;
mod outside;
mod pipeline;
mod progress;
mod publish;
mod result;
mod types;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info};

use crate::{
    cli::Args,
    config::Config,
    outside::Ytdl,
    pipeline::{Mode, Pipeline, PipelineSettings},
    progress::JsonFileStore,
    publish::{OAuthSessions, YouTube},
};

fn main() -> miette::Result<()> {
    // Initialize the CLI & logging before any thread gets spawned
    let args = Args::parse();
    logging::init_logging(args.log_level)?;

    let config = Config::load(&args)?;
    debug!("{config:#?}");

    // Make sure the needed directories are created
    std::fs::create_dir_all(&config.source.videos_dir)
        .into_diagnostic()
        .wrap_err("Could not create videos directory")?;

    let source = Ytdl::new(config.source.clone())?;
    let store = JsonFileStore::new(&config.progress.state_file);

    let http = config.destination.http_client()?;
    let sessions = OAuthSessions::new(
        http.clone(),
        config.destination.client_secrets.clone(),
        config.destination.token_file.clone(),
    );
    let publisher = YouTube::new(http, sessions);

    let settings = PipelineSettings {
        account: config.account.clone(),
        mode: Mode::from_process_all(args.process_all),
        delay: config.pipeline.delay(),
        publish: config.destination.publish.clone(),
        prune_after_publish: config.pipeline.prune_after_publish,
    };
    let mut pipeline = Pipeline::new(&source, &publisher, &store, settings);

    if args.status {
        let snapshot = pipeline.status()?;
        info!(
            "{}/{} videos processed, {} uploaded, {} remaining (progress file: {})",
            snapshot.cursor.min(snapshot.total),
            snapshot.total,
            snapshot.completed,
            snapshot.remaining,
            store.path().display()
        );
        return Ok(());
    }

    info!("Mirroring @{} to YouTube", config.account);
    pipeline.run()?;
    Ok(())
}
