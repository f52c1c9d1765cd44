use std::collections::VecDeque;

use super::api::{GalleryTransport, TransportError};

/// Pure in-memory transport, used by tests and by replay mode.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub inbound: VecDeque<String>,
    pub sent: Vec<String>,
    pub subscribed: bool,
    pub subscribe_calls: usize,
    pub unsubscribe_calls: usize,
    /// When set, every `send_frame` fails.
    pub fail_sends: bool,
    /// Frames delivered while nobody was listening.
    pub dropped: usize,
    pub closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a frame arriving from the backend.
    pub fn push_frame(&mut self, frame: impl Into<String>) {
        if self.subscribed {
            self.inbound.push_back(frame.into());
        } else {
            log::trace!("[MEMORY] no listener, frame dropped");
            self.dropped += 1;
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Outbound frames parsed back to JSON, for assertions.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .filter_map(|f| serde_json::from_str(f).ok())
            .collect()
    }
}

impl GalleryTransport for MemoryTransport {
    fn subscribe(&mut self) -> Result<(), TransportError> {
        if self.subscribed {
            return Err(TransportError::AlreadySubscribed);
        }
        self.subscribed = true;
        self.subscribe_calls += 1;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if self.subscribed {
            self.unsubscribe_calls += 1;
        }
        self.subscribed = false;
        self.inbound.clear();
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    fn poll_frame(&mut self) -> Option<String> {
        if !self.subscribed {
            return None;
        }
        self.inbound.pop_front()
    }

    fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Send("simulated failure".to_string()));
        }
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(frame);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed && self.inbound.is_empty()
    }
}
