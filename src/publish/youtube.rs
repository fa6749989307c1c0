use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use miette::{bail, miette, Context, IntoDiagnostic, Result};
use reqwest::{
    blocking::{Client, Response},
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AccessToken, Publisher, SessionProvider};
use crate::types::{PublishMetadata, PublishSettings};

const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Destination account and the metadata of the published videos
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DestinationSettings {
    /// OAuth client registration file
    pub client_secrets: PathBuf,
    /// File holding the OAuth tokens, rewritten on refresh
    pub token_file: PathBuf,
    /// Maximum duration of a single HTTP request, upload included
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub publish: PublishSettings,
}

impl Default for DestinationSettings {
    fn default() -> Self {
        Self {
            client_secrets: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            timeout_secs: 3600,
            publish: PublishSettings::default(),
        }
    }
}

impl DestinationSettings {
    /// Build the HTTP client shared by the session provider and the publisher
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .into_diagnostic()
            .wrap_err("Could not build the HTTP client")
    }
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// Publisher for the YouTube Data API, using resumable uploads
#[derive(Debug)]
pub struct YouTube<S> {
    client: Client,
    sessions: S,
    upload_url: String,
}

impl<S: SessionProvider> YouTube<S> {
    pub fn new(client: Client, sessions: S) -> Self {
        Self {
            client,
            sessions,
            upload_url: UPLOAD_URL.to_owned(),
        }
    }

    /// Start a resumable upload and return the URL the file must be sent to
    fn start_upload(
        &self,
        token: &AccessToken,
        size: u64,
        metadata: &PublishMetadata,
    ) -> Result<String> {
        let res = self
            .client
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token.secret())
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", size)
            .json(&video_resource(metadata))
            .send()
            .into_diagnostic()
            .wrap_err("Could not start the upload")?;
        let res = check_status(res)?;

        let location = res
            .headers()
            .get(LOCATION)
            .ok_or_else(|| miette!("Upload session has no location"))?
            .to_str()
            .into_diagnostic()
            .wrap_err("Upload location is not valid text")?;
        Ok(location.to_owned())
    }
}

impl<S: SessionProvider> Publisher for YouTube<S> {
    type Session = AccessToken;

    fn authenticate(&self) -> Result<AccessToken> {
        self.sessions.authenticate()
    }

    fn publish(
        &self,
        token: &AccessToken,
        file: &Path,
        metadata: &PublishMetadata,
    ) -> Result<String> {
        info!("Uploading {} to YouTube", file.display());

        let input = File::open(file)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not open {}", file.display()))?;
        let size = input.metadata().into_diagnostic()?.len();

        let location = self.start_upload(token, size, metadata)?;
        debug!("Upload session opened, sending {size} bytes");

        let res = self
            .client
            .put(location)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, size)
            .body(input)
            .send()
            .into_diagnostic()
            .wrap_err("Could not send the video")?;
        let res = check_status(res)?;

        let uploaded: UploadedVideo = res
            .json()
            .into_diagnostic()
            .wrap_err("Could not parse the upload response")?;

        info!("Upload complete! Video ID: {}", uploaded.id);
        Ok(uploaded.id)
    }
}

/// Turn any non-2xx response into an error holding the body
fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().unwrap_or_default();
    bail!("YouTube answered {status}: {}", body.trim())
}

/// The `video` resource sent when opening the upload
fn video_resource(metadata: &PublishMetadata) -> Value {
    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
            "categoryId": metadata.category_id,
        },
        "status": {
            "privacyStatus": metadata.privacy.as_str(),
            "selfDeclaredMadeForKids": metadata.made_for_kids,
        },
    })
}
