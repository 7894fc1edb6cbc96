use crate::config::Config;
use crate::error::{BatchError, MessageFailure, Stage};
use crate::mail::{INBOX_LABEL, MailClient};
use crate::models::{Disposition, MessageOutcome, Summary};
use crate::ocr::OcrEngine;
use crate::policy;
use crate::resolver;
use chrono::{Duration, Local, NaiveDate};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info};

/// How far back the search looks for notification emails.
pub const LOOKBACK_DAYS: i64 = 2;

/// Gmail search for unhandled notifications: already-labeled messages are
/// excluded so re-runs never see them again.
pub fn build_query(sender: &str, label: &str, today: NaiveDate) -> String {
    let after = today - Duration::days(LOOKBACK_DAYS);
    let label = if label.chars().any(char::is_whitespace) {
        format!("\"{}\"", label)
    } else {
        label.to_string()
    };
    format!(
        "from:{} after:{} -label:{}",
        sender,
        after.format("%Y/%m/%d"),
        label
    )
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicUsize,
    kept: AtomicUsize,
    discarded: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, result: &Result<Disposition, MessageFailure>) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(Disposition::Keep) => &self.kept,
            Ok(Disposition::Discard) => &self.discarded,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Summary {
        Summary {
            processed: self.processed.load(Ordering::Relaxed),
            kept: self.kept.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct BatchProcessor<'a, M: ?Sized, O: ?Sized> {
    mail: &'a M,
    ocr: &'a O,
    config: &'a Config,
}

impl<'a, M, O> BatchProcessor<'a, M, O>
where
    M: MailClient + ?Sized,
    O: OcrEngine + ?Sized,
{
    pub fn new(mail: &'a M, ocr: &'a O, config: &'a Config) -> Self {
        Self { mail, ocr, config }
    }

    pub async fn run(&self) -> Result<Summary, BatchError> {
        self.run_on(Local::now().date_naive()).await
    }

    /// Processes every candidate found relative to `today`. Only label setup
    /// and the search itself can fail the run; message errors are counted.
    pub async fn run_on(&self, today: NaiveDate) -> Result<Summary, BatchError> {
        let label_name = &self.config.label_name;
        let label_id =
            self.mail
                .ensure_label(label_name)
                .await
                .map_err(|source| BatchError::Label {
                    label: label_name.clone(),
                    source,
                })?;

        let query = build_query(&self.config.sender_address, label_name, today);
        info!(query = %query, "Searching for emails");
        let candidates = self.mail.search(&query).await.map_err(BatchError::Search)?;
        info!("Found {} messages", candidates.len());

        let counters = Counters::default();
        let counters_ref = &counters;
        let label_id = label_id.as_str();

        futures::stream::iter(candidates)
            .for_each_concurrent(self.config.max_concurrent_messages, |candidate| async move {
                let result = self.process(&candidate.id, label_id).await;
                if let Err(failure) = &result {
                    error!(id = %failure.message_id, stage = %failure.stage, error = %format!("{:#}", failure.source), "Error processing message");
                }
                counters_ref.record(&result);
            })
            .await;

        let summary = counters.snapshot();
        info!(
            processed = summary.processed,
            kept = summary.kept,
            discarded = summary.discarded,
            failed = summary.failed,
            "Complete"
        );
        Ok(summary)
    }

    async fn process(&self, id: &str, label_id: &str) -> Result<Disposition, MessageFailure> {
        let message = self
            .mail
            .get_full(id)
            .await
            .map_err(|e| MessageFailure::new(id, Stage::Fetch, e))?;
        info!(id = %id, subject = %message.subject_or_default(), "Processing message");

        let outcome = resolver::resolve_message(self.mail, self.ocr, &self.config.names, &message)
            .await
            .map_err(|e| MessageFailure::new(id, Stage::Resolve, e))?;

        let disposition = policy::decide(&outcome);
        let applied = match &outcome {
            MessageOutcome::Found { name, .. } => {
                info!(id = %id, name = %name, label = %self.config.label_name, "Adding label and removing from inbox");
                self.mail
                    .apply_label(id, &[label_id.to_string()], &[INBOX_LABEL.to_string()])
                    .await
            }
            MessageOutcome::NotFound => {
                info!(id = %id, "Trashing email (no target names found)");
                self.mail.trash(id).await
            }
        };
        applied.map_err(|e| MessageFailure::new(id, Stage::Apply, e))?;
        debug!(id = %id, disposition = disposition.description(), "Applied");

        Ok(disposition)
    }
}
