use std::{path::Path, path::PathBuf, time::Duration};

use miette::{ensure, Context, IntoDiagnostic, Result};
use serde::Deserialize;

use crate::{cli::Args, outside::SourceSettings, publish::DestinationSettings};

/// Configuration file read when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "vidrelay.toml";

/// Everything a pass needs to know, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account: String,
    pub source: SourceSettings,
    pub destination: DestinationSettings,
    pub progress: ProgressSettings,
    pub pipeline: PassSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub state_file: PathBuf,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("uploaded_videos.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PassSettings {
    /// Pause after every upload in bulk mode
    pub delay_secs: u64,
    /// Delete the downloaded file once the video is uploaded
    pub prune_after_publish: bool,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            delay_secs: 10,
            prune_after_publish: false,
        }
    }
}

impl PassSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Config {
    /// Read the configuration file and apply the command line overrides.
    ///
    /// The file given with `--config` must exist. The default one is optional.
    pub fn load(args: &Args) -> Result<Self> {
        let (path, required) = match &args.config {
            Some(path) => (path.as_path(), true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = Self::from_file(path, required)?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self> {
        config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .build()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read configuration {}", path.display()))?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(account) = &args.account {
            self.account = account.clone();
        }
        if let Some(state) = &args.state {
            self.progress.state_file = state.clone();
        }
        if let Some(videos_dir) = &args.videos_dir {
            self.source.videos_dir = videos_dir.clone();
        }
        if let Some(privacy) = args.privacy {
            self.destination.publish.privacy = privacy;
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.account.trim().is_empty(),
            "No account to mirror. Set it with --account or in the configuration file"
        );
        ensure!(
            self.destination.publish.title_limit > 3,
            "destination.title_limit must leave room for the ellipsis"
        );
        Ok(())
    }
}
