//! OAuth2 "installed application" flow for the spreadsheet destination.
//!
//! The operator authorizes once; the resulting refresh token is cached on disk and every
//! later run reuses it, refreshing the access token when it is about to expire.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read OAuth client credentials {}: {source}", path.display())]
    CredentialsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth client credentials {} are malformed: {source}", path.display())]
    CredentialsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("OAuth client credentials {} have neither an `installed` nor a `web` section", path.display())]
    NoClientSecrets { path: PathBuf },

    #[error("failed to access token cache {}: {source}", path.display())]
    TokenStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token cache {} is malformed: {source}", path.display())]
    TokenStoreFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid authorization URI '{uri}': {reason}")]
    InvalidAuthUri { uri: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("token request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("token endpoint response is malformed: {0}")]
    TokenResponse(#[source] serde_json::Error),

    #[error("token endpoint did not return a refresh token; revoke access and authorize again")]
    MissingRefreshToken,

    #[error("no authorization code was entered")]
    EmptyCode,

    #[error("failed to prompt for authorization code: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("no cached credentials in {}; run `fleetsync authorize` first", path.display())]
    NotAuthorized { path: PathBuf },
}

/// Client identity from the Google Cloud console credentials download.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AuthError::CredentialsRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents, path)
    }

    fn from_json(contents: &str, path: &Path) -> Result<Self, AuthError> {
        let file: CredentialsFile =
            serde_json::from_str(contents).map_err(|source| AuthError::CredentialsFormat {
                path: path.to_path_buf(),
                source,
            })?;
        file.installed
            .or(file.web)
            .ok_or_else(|| AuthError::NoClientSecrets {
                path: path.to_path_buf(),
            })
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT_URI)
    }
}

/// Cached credential, persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_LEEWAY_SECS) <= now,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, now: DateTime<Utc>, previous_refresh: Option<&str>) -> Result<StoredToken, AuthError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or(AuthError::MissingRefreshToken)?;

        Ok(StoredToken {
            access_token: self.access_token,
            refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scope: self.scope,
        })
    }
}

/// YAML file holding a single [`StoredToken`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredToken>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthError::TokenStoreIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| AuthError::TokenStoreFormat {
                path: self.path.clone(),
                source,
            })
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let contents = serde_yaml::to_string(token).map_err(|source| AuthError::TokenStoreFormat {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, contents).map_err(|source| AuthError::TokenStoreIo {
            path: self.path.clone(),
            source,
        })
    }
}

/// Issues and refreshes spreadsheet credentials.
pub struct Authorizer {
    secrets: ClientSecrets,
    store: TokenStore,
    http: Client,
}

impl Authorizer {
    pub fn new(secrets: ClientSecrets, store: TokenStore, http: Client) -> Self {
        Self {
            secrets,
            store,
            http,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let secrets = ClientSecrets::from_file(&config.google_credentials_path)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(AuthError::Client)?;
        Ok(Self::new(
            secrets,
            TokenStore::new(&config.google_token_path),
            http,
        ))
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn has_cached_token(&self) -> Result<bool, AuthError> {
        Ok(self.store.load()?.is_some())
    }

    /// Consent page the operator has to visit to obtain an authorization code.
    pub fn authorization_url(&self) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.secrets.redirect_uri()),
                ("response_type", "code"),
                ("scope", SPREADSHEETS_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| AuthError::InvalidAuthUri {
            uri: self.secrets.auth_uri.clone(),
            reason: err.to_string(),
        })
    }

    /// Trades an authorization code for a credential and caches it.
    pub fn exchange_code(&self, code: &str) -> Result<StoredToken, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }

        let response = self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", self.secrets.redirect_uri()),
        ])?;

        let token = response.into_stored(Utc::now(), None)?;
        self.store.save(&token)?;
        info!(path = %self.store.path().display(), "Stored spreadsheet credentials");
        Ok(token)
    }

    /// Returns a usable access token, refreshing (and re-caching) it when expired.
    pub fn access_token(&self) -> Result<String, AuthError> {
        let token = self.store.load()?.ok_or_else(|| AuthError::NotAuthorized {
            path: self.store.path().to_path_buf(),
        })?;

        let now = Utc::now();
        if !token.needs_refresh(now) {
            return Ok(token.access_token);
        }

        warn!("Spreadsheet access token expired, refreshing");
        let response = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_str()),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ])?;

        let refreshed = response.into_stored(now, Some(&token.refresh_token))?;
        self.store.save(&refreshed)?;
        Ok(refreshed.access_token)
    }

    fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .map_err(AuthError::Http)?;

        let status = response.status();
        let body = response.text().map_err(AuthError::Http)?;
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(AuthError::TokenResponse)
    }
}

/// Prints the consent URL, blocks for the code on `input`, then exchanges and caches it.
pub fn authorize_interactively<R: BufRead, W: Write>(
    authorizer: &Authorizer,
    mut input: R,
    mut output: W,
) -> Result<StoredToken, AuthError> {
    let url = authorizer.authorization_url()?;
    writeln!(
        output,
        "Open the following URL in the browser and enter the resulting code after authorization:\n{url}"
    )
    .and_then(|_| output.flush())
    .map_err(AuthError::Prompt)?;

    let mut code = String::new();
    input.read_line(&mut code).map_err(AuthError::Prompt)?;
    authorizer.exchange_code(&code)
}
