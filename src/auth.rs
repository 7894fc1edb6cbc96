use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use google_gmail1::oauth2::authenticator::{DefaultHyperClient, HyperClientBuilder};
use google_gmail1::oauth2::storage::{TokenInfo, TokenStorage};
use google_gmail1::oauth2::{
    self, ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    read_application_secret,
};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const APP_NAME: &str = "postsift";
const TOKEN_KEY: &str = "gmail_token";

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
/// Requested together so one consent covers both mail and OCR.
pub const SCOPES: &[&str] = &[GMAIL_MODIFY_SCOPE, VISION_SCOPE];

pub type GmailAuthenticator =
    oauth2::authenticator::Authenticator<<DefaultHyperClient as HyperClientBuilder>::Connector>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenData {
    tokens: Vec<TokenInfo>,
}

/// Keeps the OAuth token in the OS keyring. A single token is stored and
/// returned for every scope request, since it was granted all of `SCOPES`.
pub struct RingStorage;

#[async_trait]
impl TokenStorage for RingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> Result<()> {
        let entry = keyring_entry()?;

        let data = TokenData {
            tokens: vec![token],
        };
        let serialized = serde_json::to_string(&data).context("Failed to serialize tokens")?;

        entry
            .set_password(&serialized)
            .map_err(|e| anyhow!("Keyring error: {}", e))?;
        debug!("Stored OAuth token in keyring");
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.get_all()
            .await
            .ok()
            .and_then(|data| data.tokens.into_iter().next())
    }
}

impl RingStorage {
    async fn get_all(&self) -> Result<TokenData> {
        let entry = keyring_entry()?;

        match entry.get_password() {
            Ok(serialized) => {
                serde_json::from_str(&serialized).context("Failed to deserialize tokens")
            }
            Err(keyring::Error::NoEntry) => Ok(TokenData::default()),
            Err(e) => Err(anyhow!("Keyring error: {}", e)),
        }
    }
}

fn keyring_entry() -> Result<Entry> {
    Entry::new(APP_NAME, TOKEN_KEY).map_err(|e| anyhow!("Keyring error: {}", e))
}

pub struct Authenticator;

impl Authenticator {
    pub async fn load_secret<P: AsRef<Path>>(path: P) -> Result<ApplicationSecret> {
        let path = path.as_ref();
        read_application_secret(path)
            .await
            .with_context(|| format!("Unable to read client secret file {}", path.display()))
    }

    pub async fn authenticate(secret: ApplicationSecret) -> Result<GmailAuthenticator> {
        let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
            .with_storage(Box::new(RingStorage))
            .build()
            .await
            .context("Failed to build authenticator")?;

        // Run the consent flow now rather than in the middle of the batch.
        auth.token(SCOPES)
            .await
            .context("Unable to obtain an OAuth token")?;
        info!("Authenticated with Google");

        Ok(auth)
    }
}
