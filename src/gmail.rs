use crate::mail::MailClient;
use crate::models::{self, MessageRef, Part, PartTree};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use google_gmail1::Gmail;
use google_gmail1::api;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use tracing::debug;

const USER_ID: &str = "me";

pub type HttpsClient = hyper::Client<HttpsConnector<HttpConnector>>;

pub fn https_client() -> Result<HttpsClient> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .context("Failed to load native roots")?
        .https_only()
        .enable_http1()
        .build();
    Ok(hyper::Client::builder().build(connector))
}

#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn search(&self, query: &str) -> Result<Vec<MessageRef>> {
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.hub.users().messages_list(USER_ID).q(query);
            if let Some(token) = &page_token {
                req = req.page_token(token);
            }

            let (_, message_list) = req.doit().await.context("Failed to list messages")?;

            refs.extend(
                message_list
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id)
                    .map(|id| MessageRef { id }),
            );

            match message_list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(refs)
    }

    async fn get_full(&self, id: &str) -> Result<models::Message> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get(USER_ID, id)
            .format("full")
            .doit()
            .await
            .with_context(|| format!("Failed to get message {}", id))?;

        let (subject, parts) = match &msg.payload {
            Some(payload) => (subject_header(payload), part_tree(payload)),
            None => (None, PartTree::default()),
        };

        Ok(models::Message {
            id: msg.id.unwrap_or_else(|| id.to_string()),
            subject,
            parts,
        })
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let (_, body) = self
            .hub
            .users()
            .messages_attachments_get(USER_ID, message_id, attachment_id)
            .doit()
            .await
            .with_context(|| format!("Failed to get attachment for message {}", message_id))?;

        let data = body
            .data
            .with_context(|| format!("Attachment for message {} has no data", message_id))?;
        Ok(decode_body_data(data))
    }

    async fn ensure_label(&self, name: &str) -> Result<String> {
        let (_, label_list) = self
            .hub
            .users()
            .labels_list(USER_ID)
            .doit()
            .await
            .context("Failed to list labels")?;

        let existing = label_list
            .labels
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name.as_deref() == Some(name))
            .and_then(|l| l.id);
        if let Some(id) = existing {
            return Ok(id);
        }

        debug!(label = name, "Creating label");
        let label = api::Label {
            name: Some(name.to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        };
        let (_, created) = self
            .hub
            .users()
            .labels_create(label, USER_ID)
            .doit()
            .await
            .with_context(|| format!("Failed to create label {}", name))?;

        created
            .id
            .with_context(|| format!("Created label {} has no id", name))
    }

    async fn apply_label(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        debug!(id = message_id, add = ?add_label_ids, remove = ?remove_label_ids, "Modifying message labels");
        let req = api::ModifyMessageRequest {
            add_label_ids: Some(add_label_ids.to_vec()),
            remove_label_ids: Some(remove_label_ids.to_vec()),
        };
        self.hub
            .users()
            .messages_modify(req, USER_ID, message_id)
            .doit()
            .await
            .context("Failed to modify message")?;
        Ok(())
    }

    async fn trash(&self, message_id: &str) -> Result<()> {
        debug!(id = message_id, "Trashing message");
        self.hub
            .users()
            .messages_trash(USER_ID, message_id)
            .doit()
            .await
            .context("Failed to trash message")?;
        Ok(())
    }
}

fn subject_header(payload: &api::MessagePart) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| {
            h.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case("Subject"))
        })
        .and_then(|h| h.value.clone())
}

/// Flattens the payload into an arena without recursing.
fn part_tree(payload: &api::MessagePart) -> PartTree {
    let mut tree = PartTree::default();
    let mut stack: Vec<(&api::MessagePart, Option<usize>)> = vec![(payload, None)];

    while let Some((part, parent)) = stack.pop() {
        let index = tree.push(
            parent,
            Part {
                mime_type: part.mime_type.clone().unwrap_or_default(),
                attachment_id: part
                    .body
                    .as_ref()
                    .and_then(|b| b.attachment_id.clone())
                    .filter(|id| !id.is_empty()),
                children: Vec::new(),
            },
        );
        if let Some(children) = &part.parts {
            stack.extend(children.iter().rev().map(|child| (child, Some(index))));
        }
    }

    tree
}

/// The client library normally hands over decoded bytes; fall back to
/// base64url decoding when the payload still looks like encoded text.
fn decode_body_data(data: Vec<u8>) -> Vec<u8> {
    let looks_encoded = !data.is_empty()
        && data
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'+' | b'/' | b'='));
    if !looks_encoded {
        return data;
    }

    let normalized: Vec<u8> = data
        .iter()
        .filter(|b| **b != b'=')
        .map(|b| match b {
            b'+' => b'-',
            b'/' => b'_',
            other => *other,
        })
        .collect();

    general_purpose::URL_SAFE_NO_PAD
        .decode(&normalized)
        .unwrap_or(data)
}
