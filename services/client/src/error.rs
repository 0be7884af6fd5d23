use thiserror::Error;

use crate::types::{ContractId, Handle, ValueType};

/// Failures reported by a ciphertext runtime, for a whole request or for a
/// single handle inside one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("ciphertext runtime unavailable: {0}")]
    Unavailable(String),

    #[error("ciphertext runtime timed out")]
    Timeout,

    #[error("authorization signature rejected")]
    InvalidSignature,

    #[error("decryption capability expired")]
    CapabilityExpired,

    #[error("contract {0} is outside the capability scope")]
    ContractNotAuthorized(ContractId),

    #[error("access denied on handle {0}")]
    AccessDenied(Handle),

    #[error("unknown handle {0}")]
    UnknownHandle(Handle),
}

impl RuntimeError {
    /// Worth retrying with the same inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Why one handle of a batch produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleFailure {
    #[error(transparent)]
    Rejected(#[from] RuntimeError),

    #[error("expected {expected:?}, runtime returned {found:?}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    #[error("runtime returned no result for this handle")]
    Missing,

    #[error("handle requested under both {first} and {second}")]
    ConflictingContracts { first: ContractId, second: ContractId },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("capability store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("capability store encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("capability store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input broke a rule. Never retried.
    Policy,
    /// Proof, signature or access rejected. Retrying fails identically.
    Authorization,
    /// Runtime or network trouble that outlived the retry budget.
    Transient,
    /// The local signer failed.
    Local,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("game too short: {duration_secs}s, minimum is {minimum}s")]
    GameTooShort { duration_secs: u32, minimum: u32 },

    #[error("{operation} rejected: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: RuntimeError,
    },

    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Transient {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: RuntimeError,
    },

    #[error("signing failed: {0}")]
    Signing(String),
}

impl ClientError {
    pub(crate) fn from_runtime(operation: &'static str, attempts: u32, source: RuntimeError) -> Self {
        if source.is_transient() {
            Self::Transient {
                operation,
                attempts,
                source,
            }
        } else {
            Self::Rejected { operation, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GameTooShort { .. } => ErrorKind::Policy,
            Self::Rejected { .. } => ErrorKind::Authorization,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Signing(_) => ErrorKind::Local,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Name of the operation that failed, where one applies.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Rejected { operation, .. } | Self::Transient { operation, .. } => Some(operation),
            Self::GameTooShort { .. } => Some("prepare_submission"),
            Self::Signing(_) => Some("sign_authorization"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
