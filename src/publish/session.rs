use std::{
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use miette::{bail, miette, Context, IntoDiagnostic, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::io::write_atomic;

/// A token is refreshed when it expires in less than this
const EXPIRY_MARGIN_SECS: i64 = 60;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Bearer token for the destination API
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Something able to hand out a valid access token, refreshing it if needed
pub trait SessionProvider {
    fn authenticate(&self) -> Result<AccessToken>;
}

/// OAuth client registration, as downloaded from the Google console
#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: Option<ClientInfo>,
    web: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_owned()
}

/// Tokens kept on disk between executions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix timestamp after which the access token is rejected
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self, now: i64) -> bool {
        // Without an expiry date, the token cannot be trusted
        self.expires_at
            .is_some_and(|expires_at| expires_at - EXPIRY_MARGIN_SECS > now)
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

/// Sessions from an OAuth token file, refreshed through the token endpoint.
///
/// The token file must have been created beforehand by an OAuth consent flow.
#[derive(Debug)]
pub struct OAuthSessions {
    client: Client,
    client_secrets: PathBuf,
    token_file: PathBuf,
}

impl OAuthSessions {
    pub fn new(client: Client, client_secrets: PathBuf, token_file: PathBuf) -> Self {
        Self {
            client,
            client_secrets,
            token_file,
        }
    }

    fn read_token(&self) -> Result<StoredToken> {
        let data = match std::fs::read(&self.token_file) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => bail!(
                "No token file at {}. Authorize the application with the OAuth consent flow first",
                self.token_file.display()
            ),
            Err(err) => {
                return Err(err)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Could not read {}", self.token_file.display()))
            }
        };

        serde_json::from_slice(&data)
            .into_diagnostic()
            .wrap_err_with(|| format!("Token file {} is malformed", self.token_file.display()))
    }

    fn refresh(&self, token: &StoredToken, now: i64) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| miette!("The access token expired and there is no refresh token"))?;

        let client = read_client_secrets(&self.client_secrets)?;

        info!("Refreshing the access token");
        let res = self
            .client
            .post(&client.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ])
            .send()
            .into_diagnostic()
            .wrap_err("Could not reach the token endpoint")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            bail!("Token refresh rejected ({status}): {body}");
        }

        let refreshed: RefreshResponse = res
            .json()
            .into_diagnostic()
            .wrap_err("Could not parse the token endpoint response")?;

        Ok(StoredToken {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or_else(|| token.refresh_token.clone()),
            expires_at: Some(now + refreshed.expires_in),
        })
    }
}

impl SessionProvider for OAuthSessions {
    fn authenticate(&self) -> Result<AccessToken> {
        let token = self.read_token()?;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if token.is_fresh(now) {
            debug!("Saved access token is still valid");
            return Ok(AccessToken::new(token.access_token));
        }

        let token = self.refresh(&token, now)?;
        let data = serde_json::to_vec_pretty(&token).into_diagnostic()?;
        write_atomic(&self.token_file, &data).wrap_err("Could not save the refreshed token")?;

        Ok(AccessToken::new(token.access_token))
    }
}

fn read_client_secrets(path: &Path) -> Result<ClientInfo> {
    let data = std::fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read client secrets {}", path.display()))?;
    parse_client_secrets(&data)
}

fn parse_client_secrets(data: &[u8]) -> Result<ClientInfo> {
    let secrets: ClientSecrets = serde_json::from_slice(data)
        .into_diagnostic()
        .wrap_err("Client secrets are malformed")?;

    secrets
        .installed
        .or(secrets.web)
        .ok_or_else(|| miette!("Client secrets have neither an 'installed' nor a 'web' section"))
}
