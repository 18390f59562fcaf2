use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Why a frame could not be written to a subscriber
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("subscriber connection closed")]
    Closed,

    #[error("write failed: {0}")]
    Write(String),
}

/// Writable end of one subscriber connection.
///
/// Writes happen while the registry lock is held, so implementations must not
/// block or await.
pub trait EventSink: Send + Sync + 'static {
    fn send_frame(&self, frame: Bytes) -> Result<(), SinkError>;
}

/// Channel feeding an HTTP response stream. Fails once the receiving half
/// (the response body) has been dropped.
impl EventSink for UnboundedSender<Bytes> {
    fn send_frame(&self, frame: Bytes) -> Result<(), SinkError> {
        self.send(frame).map_err(|_| SinkError::Closed)
    }
}
