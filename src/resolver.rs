use crate::mail::MailClient;
use crate::matcher::NameSet;
use crate::models::{Message, MatchOutcome, MessageOutcome, Part, PartTree};
use crate::ocr::OcrEngine;
use anyhow::{Result, bail};
use tracing::{debug, info, warn};

/// Image bytes plus the image's position among the message's image parts.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub index: usize,
    pub data: Vec<u8>,
}

/// Image parts carrying an attachment, parent before children, siblings in
/// structural order.
pub fn image_parts(tree: &PartTree) -> Vec<&Part> {
    let mut found = Vec::new();
    let mut stack: Vec<usize> = tree.root().into_iter().collect();

    while let Some(index) = stack.pop() {
        let Some(part) = tree.get(index) else {
            continue;
        };
        if is_image(&part.mime_type) && part.attachment_id.is_some() {
            found.push(part);
        }
        stack.extend(part.children.iter().rev());
    }

    found
}

fn is_image(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Downloads one image part. A failed download is logged and yields `None`.
pub async fn fetch_image<M>(mail: &M, message_id: &str, index: usize, part: &Part) -> Option<ImageBlob>
where
    M: MailClient + ?Sized,
{
    let attachment_id = part.attachment_id.as_deref()?;
    match mail.get_attachment(message_id, attachment_id).await {
        Ok(data) => Some(ImageBlob { index, data }),
        Err(e) => {
            warn!(id = %message_id, image = index + 1, error = %format!("{e:#}"), "Error getting attachment");
            None
        }
    }
}

/// OCRs one image and matches its text. OCR failure is logged and yields `None`.
pub async fn read_image<O>(
    ocr: &O,
    names: &NameSet,
    message_id: &str,
    image: &ImageBlob,
) -> Option<MatchOutcome>
where
    O: OcrEngine + ?Sized,
{
    let text = match ocr.detect_text(&image.data).await {
        Ok(text) => text,
        Err(e) => {
            warn!(id = %message_id, image = image.index + 1, error = %format!("{e:#}"), "Error detecting text");
            return None;
        }
    };

    let outcome = names.match_text(&text);
    match &outcome {
        MatchOutcome::Skip => {
            info!(id = %message_id, image = image.index + 1, "Image contains deny term; skipping");
        }
        MatchOutcome::Found(name) => {
            info!(id = %message_id, image = image.index + 1, name = %name, "Found target name");
        }
        MatchOutcome::NoMatch => {
            debug!(id = %message_id, image = image.index + 1, "No target name in image");
        }
    }
    Some(outcome)
}

/// Downloads and OCRs images one at a time in structural order, stopping at
/// the first target name so later images are neither fetched nor OCR'd.
/// Errors only when the message has images and none of them could be read.
pub async fn resolve_message<M, O>(
    mail: &M,
    ocr: &O,
    names: &NameSet,
    message: &Message,
) -> Result<MessageOutcome>
where
    M: MailClient + ?Sized,
    O: OcrEngine + ?Sized,
{
    let parts = image_parts(&message.parts);
    let mut unreadable = 0;

    for (index, part) in parts.iter().enumerate() {
        let Some(image) = fetch_image(mail, &message.id, index, part).await else {
            unreadable += 1;
            continue;
        };
        match read_image(ocr, names, &message.id, &image).await {
            Some(MatchOutcome::Found(name)) => {
                return Ok(MessageOutcome::Found {
                    name,
                    image_index: index,
                });
            }
            Some(_) => {}
            None => unreadable += 1,
        }
    }

    debug!(
        id = %message.id,
        parts = message.parts.len(),
        images = parts.len(),
        "No target name in any image"
    );

    if !parts.is_empty() && unreadable == parts.len() {
        bail!("all {} image(s) failed to load or OCR", parts.len());
    }

    Ok(MessageOutcome::NotFound)
}
