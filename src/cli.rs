use std::path::PathBuf;

use clap::Parser;

use crate::types::Privacy;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("VIDRELAY_", $v)
    };
}

/// Mirror the videos of a short-form video account onto YouTube.
///
/// Every invocation is one pass: it lists the account videos, oldest first,
/// and uploads the next one (or all the remaining ones with `--all`).
/// The progress is saved after every video so that the next pass continues
/// where this one stopped.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The account whose videos are mirrored.
    /// Overrides the `account` value of the configuration file
    #[arg(long, env=arg_env!("ACCOUNT"))]
    pub account: Option<String>,

    /// Upload all the remaining videos instead of only the next one
    #[arg(long = "all", env=arg_env!("ALL"))]
    pub process_all: bool,

    /// The path to the configuration file
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// The path to the progress file, avoiding uploading multiple times the same videos
    #[arg(long, env=arg_env!("STATE"))]
    pub state: Option<PathBuf>,

    /// The directory where the downloaded videos are kept
    #[arg(long, env=arg_env!("VIDEOS_DIR"))]
    pub videos_dir: Option<PathBuf>,

    /// Visibility of the uploaded videos.
    /// Overrides the `destination.privacy` value of the configuration file
    #[arg(long, value_enum, env=arg_env!("PRIVACY"))]
    pub privacy: Option<Privacy>,

    /// Only report the progress, without downloading or uploading anything
    #[arg(long)]
    pub status: bool,

    /// The maximum level of the logs
    #[arg(long, default_value_t = tracing::Level::INFO, env=arg_env!("LOG_LEVEL"))]
    pub log_level: tracing::Level,
}
