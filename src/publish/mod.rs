mod session;
mod youtube;

use std::path::Path;

use miette::Result;

use crate::types::PublishMetadata;

pub use session::{AccessToken, OAuthSessions, SessionProvider};
pub use youtube::{DestinationSettings, YouTube};

/// Interface for uploading videos to the destination platform
pub trait Publisher {
    /// Proof of authentication given back to every upload
    type Session;

    /// Open a session. Called once per pass, before the first upload.
    fn authenticate(&self) -> Result<Self::Session>;

    /// Upload the file with its metadata and return the ID the
    /// destination platform gave to the video.
    fn publish(
        &self,
        session: &Self::Session,
        file: &Path,
        metadata: &PublishMetadata,
    ) -> Result<String>;
}
