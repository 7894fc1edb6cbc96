use crate::models::{Message, MessageRef};
use anyhow::Result;
use async_trait::async_trait;

pub const INBOX_LABEL: &str = "INBOX";

/// Mailbox operations the pipeline needs.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Runs a provider search and returns every matching message.
    async fn search(&self, query: &str) -> Result<Vec<MessageRef>>;

    async fn get_full(&self, id: &str) -> Result<Message>;

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;

    /// Returns the id of the label called `name`, creating it if needed.
    async fn ensure_label(&self, name: &str) -> Result<String>;

    async fn apply_label(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;

    async fn trash(&self, message_id: &str) -> Result<()>;
}
