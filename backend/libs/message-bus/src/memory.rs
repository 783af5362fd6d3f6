//! In-process broker with Kafka-like semantics.
//!
//! Topics are split into a fixed number of partitions; a record's partition is
//! chosen by hashing its key. Each consumer group keeps its own committed
//! offsets, and a new consumer resumes from them, so anything left uncommitted
//! is delivered again. Failure injection hooks let tests exercise the send and
//! commit error paths.

use crate::{
    BusError, BusResult, Delivery, EnvelopeConsumer, EnvelopeProducer, MessageEnvelope, Polled,
    ReceivedMessage,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_PARTITIONS: i32 = 3;

/// One entry of the commit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffset {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    /// Next offset to read, i.e. the committed message's offset + 1
    pub offset: i64,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<MessageEnvelope>>>,
    /// (group, topic, partition) -> next offset to read
    committed: HashMap<(String, String, i32), i64>,
    commit_log: Vec<CommittedOffset>,
    send_failures: HashMap<String, u32>,
    commit_failures: HashMap<String, u32>,
    flushes: u32,
}

impl BrokerState {
    fn partitions_mut(&mut self, topic: &str, count: i32) -> &mut Vec<Vec<MessageEnvelope>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); count as usize])
    }
}

/// Shared handle to an in-process broker. Clones see the same topics.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    partitions: i32,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

impl InMemoryBroker {
    pub fn new(partitions: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            partitions: partitions.max(1),
        }
    }

    pub fn producer(&self) -> InMemoryProducer {
        InMemoryProducer {
            broker: self.clone(),
        }
    }

    /// A consumer for `topic` in `group`, positioned at the group's committed offsets
    pub fn consumer(&self, group: impl Into<String>, topic: impl Into<String>) -> InMemoryConsumer {
        let group = group.into();
        let topic = topic.into();

        let positions = {
            let state = self.state.lock();
            (0..self.partitions)
                .map(|partition| {
                    state
                        .committed
                        .get(&(group.clone(), topic.clone(), partition))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        };

        InMemoryConsumer {
            broker: self.clone(),
            group,
            topic,
            positions,
            next_partition: 0,
            closed: false,
        }
    }

    /// Partition a key maps to
    pub fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions as u64) as i32
    }

    /// Every record on `topic`, ordered by partition then offset
    pub fn records(&self, topic: &str) -> Vec<ReceivedMessage> {
        let state = self.state.lock();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };

        partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, records)| {
                records
                    .iter()
                    .enumerate()
                    .map(move |(offset, envelope)| ReceivedMessage {
                        topic: topic.to_string(),
                        partition: partition as i32,
                        offset: offset as i64,
                        envelope: envelope.clone(),
                    })
            })
            .collect()
    }

    /// Next offset `group` will read from `partition`, if it ever committed
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.state
            .lock()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Every commit made by `group`, in call order
    pub fn commits(&self, group: &str) -> Vec<CommittedOffset> {
        self.state
            .lock()
            .commit_log
            .iter()
            .filter(|commit| commit.group == group)
            .cloned()
            .collect()
    }

    /// Fail the next `count` sends to `topic`
    pub fn fail_sends(&self, topic: impl Into<String>, count: u32) {
        self.state.lock().send_failures.insert(topic.into(), count);
    }

    /// Fail the next `count` commits made by `group`
    pub fn fail_commits(&self, group: impl Into<String>, count: u32) {
        self.state.lock().commit_failures.insert(group.into(), count);
    }

    /// Number of producer flushes observed
    pub fn flush_count(&self) -> u32 {
        self.state.lock().flushes
    }
}

/// Producer handle for an [`InMemoryBroker`]
#[derive(Clone)]
pub struct InMemoryProducer {
    broker: InMemoryBroker,
}

#[async_trait]
impl EnvelopeProducer for InMemoryProducer {
    async fn send(&self, topic: &str, envelope: &MessageEnvelope) -> BusResult<Delivery> {
        let partition = self.broker.partition_for(&envelope.key);
        let mut state = self.broker.state.lock();

        if let Some(remaining) = state.send_failures.get_mut(topic) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BusError::Send {
                    topic: topic.to_string(),
                    reason: "injected send failure".to_string(),
                });
            }
        }

        let records = &mut state.partitions_mut(topic, self.broker.partitions)[partition as usize];
        records.push(envelope.clone());
        let offset = records.len() as i64 - 1;

        debug!(topic = %topic, partition, offset, "Record appended");
        Ok(Delivery { partition, offset })
    }

    async fn flush(&self, _timeout: Duration) -> BusResult<()> {
        self.broker.state.lock().flushes += 1;
        Ok(())
    }
}

/// Consumer handle for one group and topic on an [`InMemoryBroker`]
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group: String,
    topic: String,
    positions: Vec<i64>,
    next_partition: usize,
    closed: bool,
}

#[async_trait]
impl EnvelopeConsumer for InMemoryConsumer {
    async fn poll(&mut self) -> BusResult<Polled> {
        if self.closed {
            return Err(BusError::Closed);
        }

        let state = self.broker.state.lock();
        let partitions = state.topics.get(&self.topic);
        let count = self.positions.len();

        // Round-robin over partitions so one busy partition cannot starve the rest
        for step in 0..count {
            let partition = (self.next_partition + step) % count;
            let position = self.positions[partition];
            let record = partitions
                .and_then(|partitions| partitions.get(partition))
                .and_then(|records| records.get(position as usize));

            if let Some(envelope) = record {
                let message = ReceivedMessage {
                    topic: self.topic.clone(),
                    partition: partition as i32,
                    offset: position,
                    envelope: envelope.clone(),
                };
                self.positions[partition] = position + 1;
                self.next_partition = (partition + 1) % count;
                return Ok(Polled::Message(message));
            }
        }

        let partition = self.next_partition as i32;
        self.next_partition = (self.next_partition + 1) % count;
        Ok(Polled::PartitionEof {
            topic: self.topic.clone(),
            partition,
        })
    }

    async fn commit(&self, message: &ReceivedMessage) -> BusResult<()> {
        if self.closed {
            return Err(BusError::Closed);
        }

        let mut state = self.broker.state.lock();
        if let Some(remaining) = state.commit_failures.get_mut(&self.group) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BusError::Commit("injected commit failure".to_string()));
            }
        }

        let next = message.offset + 1;
        let committed = state
            .committed
            .entry((self.group.clone(), message.topic.clone(), message.partition))
            .or_insert(next);
        // Committed offsets never move backwards
        *committed = (*committed).max(next);

        state.commit_log.push(CommittedOffset {
            group: self.group.clone(),
            topic: message.topic.clone(),
            partition: message.partition,
            offset: next,
        });
        Ok(())
    }

    async fn close(&mut self) -> BusResult<()> {
        self.closed = true;
        Ok(())
    }
}
