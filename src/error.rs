//! Unified error type.

use std::any::Any;

/// A boxed, thread-safe error. Handlers attach these to a
/// [`Response`](crate::Response) via [`Response::set_error`](crate::Response::set_error).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by jsonpipe's fallible operations.
///
/// Request-level failures (oversized or malformed bodies) surface here first
/// and are then usually recorded on the response, which renders them as a
/// `500` envelope. Sink and server failures are logged by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request body too large: {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: u64, limit: u64 },

    #[error("request body already consumed")]
    BodyConsumed,

    #[error("malformed JSON body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("headers already sent")]
    HeadersSent,

    #[error("status line already sent")]
    StatusSent,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("response sink already released")]
    SinkReleased,

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("middleware panicked during {stage}: {message}")]
    MiddlewarePanicked { stage: &'static str, message: String },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Best-effort text of a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
