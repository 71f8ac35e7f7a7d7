//! Fake model backends shared by unit tests.

use crate::llm::{ChatBackend, ChatContext, Turn};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

/// Backend that always answers with the same text and records what it saw.
#[derive(Default)]
pub struct FixedBackend {
    reply: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Vec<Turn>, String)>>,
}

impl FixedBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// History and prompt of every call, in order.
    pub fn seen(&self) -> Vec<(Vec<Turn>, String)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for FixedBackend {
    async fn send_message(&self, context: ChatContext<'_>, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .push((context.history.to_vec(), prompt.to_string()));
        Ok(self.reply.clone())
    }
}

/// Backend whose every call fails with the given message.
pub struct FailingBackend(pub &'static str);

#[async_trait]
impl ChatBackend for FailingBackend {
    async fn send_message(&self, _context: ChatContext<'_>, _prompt: &str) -> Result<String> {
        Err(anyhow::anyhow!(self.0))
    }
}

/// Backend that holds each call for a while and tracks peak concurrency.
#[derive(Default)]
pub struct SlowBackend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowBackend {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for SlowBackend {
    async fn send_message(&self, _context: ChatContext<'_>, prompt: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("echo: {}", prompt))
    }
}
