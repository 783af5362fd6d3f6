//! Wire-level message types shared by producers and consumers.

/// Ordered header list. Keys may repeat; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<u8>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping insertion order
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Header value decoded as UTF-8, `None` if missing or not valid UTF-8
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The unit exchanged with the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Partition key. Empty means the record has no key: a keyless Kafka
    /// record is received with `""`, and an envelope with `""` is sent keyless.
    pub key: String,
    /// Raw payload bytes, never interpreted by the bus. A null payload is
    /// received as an empty value.
    pub value: Vec<u8>,
    pub headers: Headers,
}

impl MessageEnvelope {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(key, value);
        self
    }
}

/// A message pulled from a topic, with the coordinates needed to commit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub envelope: MessageEnvelope,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    Message(ReceivedMessage),
    /// The consumer has caught up with the end of a partition
    PartitionEof { topic: String, partition: i32 },
}

/// Where a produced record landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_preserve_order() {
        let headers = Headers::new()
            .with("event_type", "product.updated")
            .with("reason", "Deserialization failed");

        let keys: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["event_type", "reason"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_headers_first_match_wins() {
        let mut headers = Headers::new();
        headers.insert("reason", "first");
        headers.insert("reason", "second");

        assert_eq!(headers.get_str("reason"), Some("first"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn test_headers_non_utf8_value() {
        let headers = Headers::new().with("blob", vec![0xff, 0xfe]);
        assert_eq!(headers.get("blob"), Some(&[0xff, 0xfe][..]));
        assert_eq!(headers.get_str("blob"), None);
    }

    #[test]
    fn test_envelope_builder() {
        let envelope = MessageEnvelope::new("42", b"{}".to_vec()).with_header("reason", "boom");
        assert_eq!(envelope.key, "42");
        assert_eq!(envelope.value, b"{}");
        assert_eq!(envelope.headers.get_str("reason"), Some("boom"));
    }
}
