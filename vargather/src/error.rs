use crate::types::Rank;

pub type Result<T> = std::result::Result<T, GatherError>;

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("process group already initialized")]
    AlreadyInitialized,

    #[error("shape mismatch: shapes describe {expected} elements, buffer holds {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("metadata mismatch: {keys} keys but {shapes} shapes")]
    MetadataMismatch { keys: usize, shapes: usize },

    #[error("serialization failed: {0}")]
    SerializationFailure(String),

    #[error("no merge rule for {kind} payload from rank {rank}")]
    UnsupportedPayloadType { kind: &'static str, rank: Rank },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("connection to rank {rank} failed: {reason}")]
    ConnectionFailed { rank: Rank, reason: String },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("group formation timed out: {joined}/{expected} ranks joined")]
    GroupFormationTimeout { joined: u32, expected: u32 },

    #[error("{operation} timed out after {timeout_ms}ms")]
    CollectiveTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("QUIC transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl GatherError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a failure observed while exchanging with `rank`.
    pub fn collective(operation: &'static str, rank: Rank, reason: impl ToString) -> Self {
        Self::CollectiveFailed {
            operation,
            rank,
            reason: reason.to_string(),
        }
    }
}
