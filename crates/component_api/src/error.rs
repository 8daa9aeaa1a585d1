use shared::error::EnvelopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bus channel is closed")]
    Closed,
    #[error("no async runtime available to deliver envelopes")]
    NoRuntime,
    #[error(transparent)]
    Encode(#[from] EnvelopeError),
}

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("configuration invalid reason must not be empty")]
    InvalidReason,
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}
