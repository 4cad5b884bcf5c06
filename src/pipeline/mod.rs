/// Message ingestion pipeline
///
/// Every inbound envelope flows verify -> enrollment gate -> processor
/// pre-process -> durable append -> processor post-process. Rejections
/// happen before any side effect; failures after the append surface as
/// consistency errors because the blob is already durable and a client
/// retry would double-append.
pub mod appender;
pub mod broadcast;
pub mod control;
pub mod locks;

use crate::{
    crypto::verifier::EnvelopeVerifier,
    db::users::UserStore,
    enrollment::EnrollmentChecker,
    envelope::{Message, SignedEnvelope},
    error::{DropsError, DropsResult},
};
use appender::{AppendOutcome, LogAppender};
use async_trait::async_trait;
use broadcast::BroadcastProcessor;
use control::ControlProcessor;
use locks::AppendLocks;

/// Per-kind processing hooks around the durable append
///
/// `pre_process` runs before storage and decides acceptance: `false`
/// is a benign skip (nothing stored, request still succeeds), an error
/// rejects the message outright. `post_process` runs only after a
/// successful append and receives the storage result.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn pre_process(&self, envelope: &SignedEnvelope) -> DropsResult<bool>;

    async fn post_process(
        &self,
        envelope: &SignedEnvelope,
        outcome: &AppendOutcome,
    ) -> DropsResult<()>;
}

/// Result of handling one envelope
#[derive(Debug, Clone)]
pub struct HandleOutcome {
    /// False when pre-processing skipped the append (e.g. re-onboard)
    pub appended: bool,
    pub hash: String,
    pub message_url: Option<String>,
    pub index_link: Option<String>,
}

pub struct MessagePipeline {
    verifier: EnvelopeVerifier,
    enrollment: EnrollmentChecker,
    users: UserStore,
    appender: LogAppender,
    locks: AppendLocks,
    broadcast: BroadcastProcessor,
    control: ControlProcessor,
}

impl MessagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        verifier: EnvelopeVerifier,
        enrollment: EnrollmentChecker,
        users: UserStore,
        appender: LogAppender,
        broadcast: BroadcastProcessor,
        control: ControlProcessor,
    ) -> Self {
        Self {
            verifier,
            enrollment,
            users,
            appender,
            locks: AppendLocks::new(),
            broadcast,
            control,
        }
    }

    pub async fn handle(&self, envelope: SignedEnvelope) -> DropsResult<HandleOutcome> {
        self.verifier.verify(&envelope)?;

        let sender = envelope.sender().to_lowercase();
        let hash = envelope.content_hash().to_string();

        // Onboard is the one operation allowed through unenrolled
        if !envelope.message().is_onboard() && !self.enrollment.is_enrolled(&sender).await? {
            return Err(DropsError::NotEnrolled);
        }

        let processor: &dyn MessageProcessor = match envelope.message() {
            Message::Broadcast(_) => &self.broadcast,
            Message::Control(_) => &self.control,
        };

        // Parsed before pre-processing so a malformed timestamp can
        // never reject a message after its relational effect landed
        let published_at = published_at_ms(&envelope)?;

        if !processor.pre_process(&envelope).await? {
            tracing::debug!(%sender, %hash, "Message skipped by pre-processing");
            return Ok(HandleOutcome {
                appended: false,
                hash,
                message_url: None,
                index_link: None,
            });
        }

        // Serialize the read-mutate-publish of this sender's log head
        let _guard = self.locks.for_sender(&sender).lock_owned().await;

        let outcome = self.appender.append(&sender, &envelope, published_at).await?;

        if let Err(e) = processor.post_process(&envelope, &outcome).await {
            tracing::error!(%sender, %hash, error = %e, "Post-processing failed after append");
            return Err(match e {
                DropsError::Consistency(_) => e,
                other => DropsError::Consistency(format!(
                    "Message {} stored but not fully applied: {}",
                    hash, other
                )),
            });
        }

        tracing::info!(%sender, %hash, url = %outcome.message_url, "Message accepted");
        Ok(HandleOutcome {
            appended: true,
            hash,
            message_url: Some(outcome.message_url),
            index_link: Some(outcome.index_link),
        })
    }
}

/// Publication instant of an envelope, taken from the authority
/// timestamp (epoch millis as a decimal string on the wire)
pub(crate) fn published_at_ms(envelope: &SignedEnvelope) -> DropsResult<i64> {
    envelope
        .data
        .timestamp
        .data
        .timestamp
        .parse::<i64>()
        .map_err(|_| {
            DropsError::Validation(format!(
                "Invalid timestamp: {}",
                envelope.data.timestamp.data.timestamp
            ))
        })
}
