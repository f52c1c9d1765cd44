use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("a listener is already subscribed")]
    AlreadySubscribed,

    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Minimal Connection Transport interface used by the orchestrator.
/// Everything is text-frame based.
///
/// A transport delivers inbound frames only while a listener is subscribed;
/// frames arriving with no listener are dropped, as they would be by a socket
/// whose message handler has been removed.
pub trait GalleryTransport {
    /// Attaches the single inbound listener.
    fn subscribe(&mut self) -> Result<(), TransportError>;

    /// Detaches the listener and discards any frames queued for it.
    fn unsubscribe(&mut self);

    fn is_subscribed(&self) -> bool;

    /// Non-blocking poll: returns the next inbound frame (if any).
    fn poll_frame(&mut self) -> Option<String>;

    /// Enqueues an outbound frame. Does not wait for acknowledgement.
    fn send_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// True once the underlying channel is gone and no frames remain.
    fn is_closed(&self) -> bool {
        false
    }
}
