use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use miette::{bail, ensure, Context, IntoDiagnostic, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::command::{assert_success_command, Capture, YT_DLP};
use crate::{io::is_nonempty_file, types::ItemDescriptor};

/// Title given to videos listed without one
const DEFAULT_TITLE: &str = "TikTok Video";

/// In which order a source lists the videos of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrder {
    OldestFirst,
    NewestFirst,
}

/// Interface for listing the videos of an account and downloading them
pub trait VideoSource {
    /// List every video of the account.
    ///
    /// Two calls for the same account **should** give the videos in the same order.
    fn list_items(&self, account: &str) -> Result<Vec<ItemDescriptor>>;

    /// The order in which [`VideoSource::list_items`] gives the videos
    fn listing_order(&self) -> ListingOrder;

    /// Download the video to local storage and return the file path.
    ///
    /// The path only depends on the video ID: if the file is already there,
    /// it is returned without downloading it again.
    fn materialize(&self, item: &ItemDescriptor) -> Result<PathBuf>;
}

/// Where and how the videos are fetched
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Where the downloaded videos are kept
    pub videos_dir: PathBuf,
    /// Page listing the account videos. `{account}` is replaced by the account name
    pub profile_url: String,
    /// Value of the `yt-dlp` format selector
    pub format: String,
    /// Browser impersonated by `yt-dlp` while downloading
    pub impersonate: Option<String>,
    /// Whether the profile page lists the most recent videos first
    pub newest_first: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("tiktok_videos"),
            profile_url: "https://www.tiktok.com/@{account}".to_owned(),
            format: "best".to_owned(),
            impersonate: Some("chrome".to_owned()),
            newest_first: true,
        }
    }
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug)]
pub struct Ytdl {
    settings: SourceSettings,
}

impl Ytdl {
    /// Verify that the `yt-dlp` binary is reachable
    pub fn new(settings: SourceSettings) -> Result<Self> {
        let res = assert_success_command(YT_DLP, |cmd| cmd.arg("--version"), Capture::STDOUT)
            .wrap_err("yt-dlp not found")?;
        debug!(
            "Using yt-dlp {}",
            String::from_utf8_lossy(&res.stdout).trim()
        );

        Ok(Self { settings })
    }

    /// Path where the video with this ID is downloaded
    pub fn media_path(&self, video_id: &str) -> Result<PathBuf> {
        static ID_RE: OnceLock<Regex> = OnceLock::new();
        let id_re = ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

        ensure!(
            id_re.is_match(video_id),
            "Video ID '{video_id}' cannot be used as a file name"
        );
        Ok(self.settings.videos_dir.join(format!("tiktok_{video_id}.mp4")))
    }
}

impl VideoSource for Ytdl {
    fn list_items(&self, account: &str) -> Result<Vec<ItemDescriptor>> {
        let url = self.settings.profile_url.replace("{account}", account);
        info!("Fetching all videos from {url}");

        let res = assert_success_command(
            YT_DLP,
            |cmd| {
                cmd.arg("-q")
                    .arg("--flat-playlist")
                    .arg("-J")
                    .arg("--")
                    .arg(&url)
            },
            Capture::STDOUT,
        )?;

        let items = parse_listing(&res.stdout, account)?;
        info!("Found {} videos total", items.len());
        Ok(items)
    }

    fn listing_order(&self) -> ListingOrder {
        if self.settings.newest_first {
            ListingOrder::NewestFirst
        } else {
            ListingOrder::OldestFirst
        }
    }

    fn materialize(&self, item: &ItemDescriptor) -> Result<PathBuf> {
        let path = self.media_path(&item.id)?;

        if is_nonempty_file(&path) {
            info!("Video already downloaded: {}", path.display());
            return Ok(path);
        }

        info!("Downloading video {}", item.id);
        download(&self.settings, &path, &item.source_locator)?;

        if !is_nonempty_file(&path) {
            bail!("yt-dlp succeeded but {} was not written", path.display());
        }

        info!("Downloaded: {}", path.display());
        Ok(path)
    }
}

fn download(settings: &SourceSettings, path: &Path, locator: &str) -> Result<()> {
    assert_success_command(
        YT_DLP,
        |cmd| {
            let cmd = cmd
                .arg("-q")
                .args([OsStr::new("-o"), path.as_os_str()])
                .args(["-f", settings.format.as_str()]);

            if let Some(target) = &settings.impersonate {
                cmd.args(["--impersonate", target.as_str()]);
            }

            cmd.arg("--").arg(locator)
        },
        Capture::empty(),
    )?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    entries: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    description: Option<String>,
}

/// Parse the JSON document printed by `yt-dlp -J --flat-playlist`
fn parse_listing(json: &[u8], account: &str) -> Result<Vec<ItemDescriptor>> {
    let listing: Listing = serde_json::from_slice(json)
        .into_diagnostic()
        .wrap_err("Could not parse the yt-dlp listing")?;

    let items = listing
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(id) = entry.id.filter(|id| !id.is_empty()) else {
                warn!("Ignoring a listed video without ID: {:?}", entry.title);
                return None;
            };

            let source_locator = entry
                .url
                .or(entry.webpage_url)
                .unwrap_or_else(|| format!("https://www.tiktok.com/@{account}/video/{id}"));

            let title = entry.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned());
            let item = ItemDescriptor::new(id, title, source_locator);

            Some(match entry.description.filter(|d| !d.trim().is_empty()) {
                Some(description) => item.with_description(description),
                None => item,
            })
        })
        .collect();

    Ok(items)
}
