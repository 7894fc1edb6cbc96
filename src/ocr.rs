use crate::auth::{GmailAuthenticator, VISION_SCOPE};
use crate::gmail::HttpsClient;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use hyper::{Body, Method, Request, header};
use serde::Deserialize;
use tracing::debug;

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Turns image bytes into recognized text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Every recognized line, each followed by a single space, in engine order.
    async fn detect_text(&self, image: &[u8]) -> Result<String>;
}

pub enum VisionAuth {
    ApiKey(String),
    OAuth(GmailAuthenticator),
}

/// Google Cloud Vision document text detection.
pub struct VisionOcr {
    client: HttpsClient,
    auth: VisionAuth,
    quota_project: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl VisionOcr {
    pub fn new(client: HttpsClient, auth: VisionAuth, quota_project: Option<String>) -> Self {
        Self {
            client,
            auth,
            quota_project,
        }
    }

    async fn build_request(&self, image: &[u8]) -> Result<Request<Body>> {
        let payload = serde_json::json!({
            "requests": [{
                "image": { "content": general_purpose::STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });

        let mut builder = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/json");

        builder = match &self.auth {
            VisionAuth::ApiKey(key) => builder.uri(format!("{}?key={}", ANNOTATE_URL, key)),
            VisionAuth::OAuth(auth) => {
                let access = auth
                    .token(&[VISION_SCOPE])
                    .await
                    .context("Failed to obtain Vision access token")?;
                let token = access
                    .token()
                    .ok_or_else(|| anyhow!("Authenticator returned an empty access token"))?;
                builder
                    .uri(ANNOTATE_URL)
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
        };

        if let Some(project) = &self.quota_project {
            builder = builder.header("x-goog-user-project", project.as_str());
        }

        builder
            .body(Body::from(serde_json::to_vec(&payload)?))
            .context("Failed to build Vision request")
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn detect_text(&self, image: &[u8]) -> Result<String> {
        let request = self.build_request(image).await?;
        let response = self
            .client
            .request(request)
            .await
            .context("Vision request failed")?;

        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .context("Failed to read Vision response")?;

        if !status.is_success() {
            bail!(
                "Vision returned {}: {}",
                status,
                String::from_utf8_lossy(&body).trim()
            );
        }

        let text = parse_annotate_response(&body)?;
        debug!(bytes = image.len(), chars = text.len(), "Vision text detected");
        Ok(text)
    }
}

fn parse_annotate_response(body: &[u8]) -> Result<String> {
    let parsed: AnnotateResponse =
        serde_json::from_slice(body).context("Failed to parse Vision response")?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(String::new());
    };
    if let Some(err) = first.error {
        bail!("Vision error {}: {}", err.code, err.message);
    }

    Ok(first
        .full_text_annotation
        .map(|a| join_lines(&a.text))
        .unwrap_or_default())
}

fn join_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(line);
        out.push(' ');
    }
    out
}
