//! Product update consumer loop
//!
//! Pulls one message at a time from the product-update topic and drives it to
//! a terminal outcome before polling again:
//! - undecodable payloads are dead-lettered immediately, without retries
//! - decoded events go to the handler under the processing retry policy
//! - handler failures that survive the retries are dead-lettered
//!
//! The offset is committed exactly once per message, after its terminal
//! outcome, whether or not the dead-letter publish itself succeeded. When
//! `cancel` fires mid-message nothing is committed or dead-lettered, so the
//! message is redelivered to the next consumer in the group.

use crate::messaging::dead_letter::{DeadLetterOutcome, DeadLetterRouter, DESERIALIZATION_FAILED};
use crate::messaging::handler::{classify, ProductUpdateHandler};
use event_schema::ProductUpdatedEvent;
use message_bus::{EnvelopeConsumer, EnvelopeProducer, Polled, ReceivedMessage};
use resilience::{RetryError, RetryPolicy};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Processed,
    DeadLettered,
    /// Dead-letter publishing gave up; still terminal
    DeadLetterFailed,
    Cancelled,
}

impl MessageOutcome {
    fn is_terminal(self) -> bool {
        !matches!(self, MessageOutcome::Cancelled)
    }
}

pub struct ProductUpdateConsumer<C, P, H> {
    consumer: C,
    dead_letters: DeadLetterRouter<P>,
    handler: H,
    retry_policy: RetryPolicy,
    idle_poll_delay: Duration,
}

impl<C, P, H> ProductUpdateConsumer<C, P, H>
where
    C: EnvelopeConsumer,
    P: EnvelopeProducer,
    H: ProductUpdateHandler,
{
    pub fn new(
        consumer: C,
        dead_letters: DeadLetterRouter<P>,
        handler: H,
        retry_policy: RetryPolicy,
        idle_poll_delay: Duration,
    ) -> Self {
        Self {
            consumer,
            dead_letters,
            handler,
            retry_policy,
            idle_poll_delay,
        }
    }

    /// Consume until `cancel` fires, then close the subscription and flush
    /// the dead-letter producer.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            max_retries = self.retry_policy.max_retries,
            dead_letter_topic = %self.dead_letters.topic(),
            "Product update consumer started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.consumer.poll() => polled,
            };

            match polled {
                Ok(Polled::Message(message)) => {
                    let outcome = self.process(&message, &cancel).await;
                    if !outcome.is_terminal() {
                        info!(
                            topic = %message.topic,
                            partition = message.partition,
                            offset = message.offset,
                            "Processing interrupted by shutdown, message will be redelivered"
                        );
                        break;
                    }
                    self.commit(&message).await;
                }
                Ok(Polled::PartitionEof { topic, partition }) => {
                    debug!(topic = %topic, partition = partition, "Reached end of partition");
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "Error polling for product updates");
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn process(
        &self,
        message: &ReceivedMessage,
        cancel: &CancellationToken,
    ) -> MessageOutcome {
        let event = match ProductUpdatedEvent::decode(&message.envelope.value) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    "Failed to deserialize product update"
                );
                return self
                    .dead_letter(message, DESERIALIZATION_FAILED, cancel)
                    .await;
            }
        };

        debug!(
            product_id = event.product_id(),
            partition = message.partition,
            offset = message.offset,
            "Processing product update"
        );

        let result = self
            .retry_policy
            .execute(cancel, |attempt| {
                let event = &event;
                async move {
                    if attempt > 0 {
                        debug!(
                            product_id = event.product_id(),
                            attempt = attempt,
                            "Retrying product update"
                        );
                    }
                    classify(self.handler.handle_product_update(event, cancel).await)
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(
                    product_id = event.product_id(),
                    partition = message.partition,
                    offset = message.offset,
                    "Product update processed"
                );
                MessageOutcome::Processed
            }
            Err(RetryError::Cancelled { .. }) => MessageOutcome::Cancelled,
            Err(
                RetryError::Exhausted {
                    attempts,
                    last_error: error,
                }
                | RetryError::Fatal { attempts, error },
            ) => {
                let reason = error.to_string();
                warn!(
                    product_id = event.product_id(),
                    attempts = attempts,
                    error = %reason,
                    "Product update failed, routing to dead-letter topic"
                );
                self.dead_letter(message, &reason, cancel).await
            }
        }
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        cancel: &CancellationToken,
    ) -> MessageOutcome {
        match self
            .dead_letters
            .route(&message.envelope, reason, cancel)
            .await
        {
            DeadLetterOutcome::Published(_) => MessageOutcome::DeadLettered,
            DeadLetterOutcome::Failed => MessageOutcome::DeadLetterFailed,
            DeadLetterOutcome::Cancelled => MessageOutcome::Cancelled,
        }
    }

    /// Commit once; a failed commit is logged, the message may be redelivered
    async fn commit(&self, message: &ReceivedMessage) {
        match self.consumer.commit(message).await {
            Ok(()) => debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Offset committed"
            ),
            Err(err) => error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "Failed to commit offset"
            ),
        }
    }

    /// Sleep for the idle delay; `false` when cancelled first
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.idle_poll_delay) => true,
        }
    }

    async fn shutdown(mut self) {
        if let Err(err) = self.consumer.close().await {
            warn!(error = %err, "Failed to close product update consumer");
        }
        self.dead_letters.flush().await;
        info!("Product update consumer stopped");
    }
}
