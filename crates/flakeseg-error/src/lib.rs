use thiserror::Error;

/// Primary error type for flakeseg operations.
///
/// The engine itself performs no I/O, so almost every variant describes a
/// caller bug (a broken contract) or undecodable persisted state. Both are
/// fatal for the current unit of work. Only [`FlakeError::StoreUnavailable`]
/// is transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlakeError {
    // === Contract Errors ===
    /// A collaborator (analyzer, ingestion) broke an input contract.
    #[error("contract violation: {detail}")]
    ContractViolation { detail: String },

    // === History Codec Errors ===
    /// Encoded history bytes are malformed.
    #[error("encoded history is malformed: {detail}")]
    HistoryCorrupt { detail: String },

    /// Encoded history uses a format version this build cannot read.
    #[error("unsupported history format version {version}")]
    UnsupportedHistoryVersion { version: u8 },

    /// Encoded history failed its integrity check.
    #[error("history checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    HistoryChecksumMismatch { stored: u64, computed: u64 },

    // === Configuration Errors ===
    /// Buffer configuration is unusable.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === Storage Errors ===
    /// The storage adapter could not complete the request; retry the
    /// surrounding read-modify-write.
    #[error("branch store unavailable: {detail}")]
    StoreUnavailable { detail: String },

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`FlakeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller or analyzer bug. Abort the unit of work.
    Contract,
    /// Persisted bytes cannot be trusted.
    Corruption,
    /// Misconfiguration detected at startup.
    Configuration,
    /// Collaborator I/O failure; the orchestration layer may retry.
    Transient,
    /// Bug inside flakeseg itself.
    Internal,
}

impl FlakeError {
    /// Classify this error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ContractViolation { .. } => ErrorClass::Contract,
            Self::HistoryCorrupt { .. }
            | Self::UnsupportedHistoryVersion { .. }
            | Self::HistoryChecksumMismatch { .. } => ErrorClass::Corruption,
            Self::InvalidConfig { .. } => ErrorClass::Configuration,
            Self::StoreUnavailable { .. } => ErrorClass::Transient,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether the current unit of work must be aborted without retry.
    pub const fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Whether this is a transient error that may succeed on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient)
    }

    /// Create a contract violation.
    pub fn contract(detail: impl Into<String>) -> Self {
        Self::ContractViolation {
            detail: detail.into(),
        }
    }

    /// Create a history corruption error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::HistoryCorrupt {
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Create a transient storage error.
    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `FlakeError`.
pub type Result<T> = std::result::Result<T, FlakeError>;
