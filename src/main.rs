mod auth;
mod batch;
mod config;
mod error;
mod gmail;
mod mail;
mod matcher;
mod models;
mod ocr;
mod policy;
mod resolver;

use crate::batch::BatchProcessor;
use crate::config::Config;
use crate::gmail::GmailClient;
use crate::ocr::{VisionAuth, VisionOcr};
use google_gmail1::Gmail;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::load()?;
    info!(
        targets = config.names.targets().len(),
        denies = config.names.denies().len(),
        sender = %config.sender_address,
        label = %config.label_name,
        "Configuration loaded"
    );

    let secret = auth::Authenticator::load_secret(&config.credentials_path).await?;
    let authenticator = auth::Authenticator::authenticate(secret).await?;

    let hub = Gmail::new(gmail::https_client()?, authenticator.clone());
    let mail = GmailClient::new(hub);

    let vision_auth = match &config.vision_api_key {
        Some(key) => VisionAuth::ApiKey(key.clone()),
        None => VisionAuth::OAuth(authenticator),
    };
    let ocr = VisionOcr::new(
        gmail::https_client()?,
        vision_auth,
        config.quota_project.clone(),
    );

    BatchProcessor::new(&mail, &ocr, &config).run().await?;
    Ok(())
}
