//! In-process message channel
//!
//! Records declarations, bindings and published bodies. Failures can be
//! queued up front to drive the dispatcher's error paths.

use super::{ChannelError, MessageChannel};
use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct State {
    queues: BTreeSet<String>,
    bindings: BTreeSet<(String, String, String)>,
    published: Vec<Published>,
    publish_failures: VecDeque<ChannelError>,
    publish_attempts: usize,
    closed: bool,
}

#[derive(Default)]
pub struct MemoryChannel {
    state: Mutex<State>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next publish attempts with these errors, in order
    pub fn fail_next_publishes(&self, errors: impl IntoIterator<Item = ChannelError>) {
        self.lock().publish_failures.extend(errors);
    }

    pub fn queues(&self) -> Vec<String> {
        self.lock().queues.iter().cloned().collect()
    }

    pub fn bindings(&self) -> Vec<(String, String, String)> {
        self.lock().bindings.iter().cloned().collect()
    }

    pub fn published(&self) -> Vec<Published> {
        self.lock().published.clone()
    }

    pub fn publish_attempts(&self) -> usize {
        self.lock().publish_attempts
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a panicked test thread must not hide the recorded state
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn declare(&self, queue: &str) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::InvalidState("channel closed".to_string()));
        }
        state.queues.insert(queue.to_string());
        Ok(())
    }

    async fn bind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::InvalidState("channel closed".to_string()));
        }
        if !state.queues.contains(queue) {
            return Err(ChannelError::InvalidState(format!("no queue '{}'", queue)));
        }
        state.bindings.insert((exchange.to_string(), queue.to_string(), routing_key.to_string()));
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.publish_attempts += 1;
        if state.closed {
            return Err(ChannelError::InvalidState("channel closed".to_string()));
        }
        if let Some(e) = state.publish_failures.pop_front() {
            return Err(e);
        }
        state.published.push(Published {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_declare_and_bind_are_idempotent() {
        let channel = MemoryChannel::new();
        for _ in 0..2 {
            channel.declare("logs").await.unwrap();
            channel.bind("logs", "logs", "logs.ultrasonic-sensors").await.unwrap();
        }
        assert_eq!(channel.queues(), vec!["logs".to_string()]);
        assert_eq!(channel.bindings().len(), 1);
    }

    #[tokio::test]
    async fn test_bind_requires_declared_queue() {
        let channel = MemoryChannel::new();
        let err = channel.bind("logs", "missing", "rk").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_publish() {
        let channel = MemoryChannel::new();
        channel.close().await.unwrap();
        let err = channel.publish("logs", "rk", b"{}").await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidState(_)));
        assert!(channel.is_closed());
    }
}
