//! Kafka consumer that feeds transition events to the processor.
//!
//! Offsets are committed manually after every message, whether the
//! transition applied or failed. The processor is idempotent, so a
//! redelivery after a crash is harmless, while a poison message gets
//! logged and counted instead of blocking the partition forever.

use catalink_core::{
    LockError, LockStore, ProcessError, ProductBillerRepository, RepositoryError,
    TransitionOutcome, TransitionProcessor,
};
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::KafkaConfig;

/// Errors from consumer setup.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The underlying Kafka client could not be created.
    #[error("Failed to create Kafka consumer: {0}")]
    Create(String),

    /// The subscription to the transition topic was rejected.
    #[error("Failed to subscribe to topic {topic}: {reason}")]
    Subscribe {
        /// Topic the subscription targeted.
        topic: String,
        /// Broker-reported reason.
        reason: String,
    },
}

/// Streaming consumer for the transition topic.
///
/// Runs until the shutdown signal flips to `true` or the message stream
/// ends. The shutdown receiver is also handed to the processor on every
/// message, so a stop request interrupts an in-flight lock wait instead
/// of riding it out.
pub struct TransitionConsumer<S, R> {
    consumer: StreamConsumer,
    processor: TransitionProcessor<S, R>,
    shutdown: watch::Receiver<bool>,
}

impl<S, R> TransitionConsumer<S, R>
where
    S: LockStore,
    R: ProductBillerRepository,
{
    /// Creates the consumer and subscribes to the transition topic.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError`] if the Kafka client cannot be created
    /// or the subscription is rejected.
    pub fn new(
        kafka: &KafkaConfig,
        processor: TransitionProcessor<S, R>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &kafka.brokers)
            .set("group.id", &kafka.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &kafka.auto_offset_reset)
            .set("session.timeout.ms", kafka.session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| ConsumerError::Create(e.to_string()))?;

        consumer
            .subscribe(&[kafka.topic.as_str()])
            .map_err(|e| ConsumerError::Subscribe {
                topic: kafka.topic.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            brokers = %kafka.brokers,
            group_id = %kafka.group_id,
            topic = %kafka.topic,
            "Transition consumer subscribed"
        );

        Ok(Self {
            consumer,
            processor,
            shutdown,
        })
    }

    /// Consumes messages until shutdown is signalled.
    pub async fn run(self) {
        let Self {
            consumer,
            processor,
            mut shutdown,
        } = self;

        tracing::info!("Transition consumer started");
        let mut stream = consumer.stream();

        loop {
            tokio::select! {
                received = stream.next() => match received {
                    Some(Ok(message)) => {
                        handle_message(&consumer, &processor, &message, &shutdown).await;
                    }
                    Some(Err(error)) => {
                        tracing::error!(error = %error, "Failed to receive message");
                        metrics::counter!("catalink.consumer.receive_errors").increment(1);
                    }
                    None => {
                        tracing::warn!("Message stream ended");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Shutdown channel closed, stopping consumer");
                        break;
                    }
                    if *shutdown.borrow() {
                        tracing::info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }
            }
        }

        tracing::info!("Transition consumer stopped");
    }
}

async fn handle_message<S, R>(
    consumer: &StreamConsumer,
    processor: &TransitionProcessor<S, R>,
    message: &BorrowedMessage<'_>,
    shutdown: &watch::Receiver<bool>,
) where
    S: LockStore,
    R: ProductBillerRepository,
{
    if let Some(payload) = message.payload() {
        match processor.handle(payload, shutdown.clone()).await {
            Ok(outcome) => {
                tracing::debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    outcome = outcome_label(outcome),
                    "Transition processed"
                );
                metrics::counter!(
                    "catalink.transitions.processed",
                    "outcome" => outcome_label(outcome)
                )
                .increment(1);
            }
            Err(error) => {
                tracing::error!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %error,
                    "Failed to process transition"
                );
                metrics::counter!(
                    "catalink.transitions.failed",
                    "reason" => error_label(&error)
                )
                .increment(1);
            }
        }
    } else {
        tracing::warn!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Skipping message without payload"
        );
        metrics::counter!("catalink.transitions.failed", "reason" => "empty").increment(1);
    }

    // Commit even after a failure: the processor is idempotent and a
    // poison message must not wedge the partition.
    if let Err(error) = consumer.commit_message(message, CommitMode::Async) {
        tracing::warn!(error = %error, "Failed to commit offset (message may be redelivered)");
    }
}

const fn outcome_label(outcome: TransitionOutcome) -> &'static str {
    match outcome {
        TransitionOutcome::Applied => "applied",
        TransitionOutcome::AlreadyInactive => "already_inactive",
        TransitionOutcome::Settled => "settled",
    }
}

const fn error_label(error: &ProcessError) -> &'static str {
    match error {
        ProcessError::Payload(_) => "payload",
        ProcessError::Lock(LockError::Timeout { .. }) => "lock_timeout",
        ProcessError::Lock(LockError::Cancelled { .. }) => "lock_cancelled",
        ProcessError::Lock(LockError::Store(_)) => "lock_store",
        ProcessError::Repository(RepositoryError::NotFound) => "not_found",
        ProcessError::Repository(_) => "repository",
    }
}
