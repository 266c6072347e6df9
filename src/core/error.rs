use thiserror::Error;

/// Error types for the uplink application core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Link handler initialization failed: {0}")]
    FatalInit(String),

    #[error("Join failed: {0}")]
    RetryableJoin(String),

    #[error("Payload of {size} bytes exceeds the link maximum of {max_size} bytes")]
    PreconditionViolation { size: usize, max_size: usize },

    #[error("Link busy")]
    Busy,

    #[error("Fragment decoder access out of bounds: {len} bytes at {addr} (capacity {capacity})")]
    DecoderFault { addr: u32, len: usize, capacity: usize },

    #[error("Link error: {0}")]
    Link(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sensor error: {0}")]
    Sensor(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new fatal initialization error
    pub fn fatal_init(msg: impl Into<String>) -> Self {
        Error::FatalInit(msg.into())
    }

    /// Creates a new retryable join error
    pub fn retryable_join(msg: impl Into<String>) -> Self {
        Error::RetryableJoin(msg.into())
    }

    /// Creates a new link error
    pub fn link(msg: impl Into<String>) -> Self {
        Error::Link(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new sensor error
    pub fn sensor(msg: impl Into<String>) -> Self {
        Error::Sensor(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Whether the dispatcher should simply try again on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Busy | Error::RetryableJoin(_))
    }
}
