//! Shared error type across meterkit crates.

use thiserror::Error;

/// Stable error codes (safe to match on in callers and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Same instrument identity requested with a different definition.
    DuplicateDefinition,
    /// Instrument name failed validation.
    InvalidName,
    /// View could not be built.
    InvalidView,
    /// An observer reported against an instrument it was not registered for.
    ContractViolation,
    /// An observer returned an error during a collection pass.
    Callback,
    /// Accumulated value no longer fits the numeric width.
    Overflow,
    /// Operation after shutdown.
    Closed,
    /// Reader is not attached to a provider.
    ReaderNotRegistered,
    /// Reader attached to more than one provider.
    DuplicateRegistration,
    /// Resources with different schema URLs were merged.
    SchemaUrlConflict,
    /// Exporter failed.
    Export,
    /// Bad configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and HTTP responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateDefinition => "DUPLICATE_DEFINITION",
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::InvalidView => "INVALID_VIEW",
            ErrorCode::ContractViolation => "CONTRACT_VIOLATION",
            ErrorCode::Callback => "CALLBACK_FAILED",
            ErrorCode::Overflow => "OVERFLOW",
            ErrorCode::Closed => "CLOSED",
            ErrorCode::ReaderNotRegistered => "READER_NOT_REGISTERED",
            ErrorCode::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            ErrorCode::SchemaUrlConflict => "SCHEMA_URL_CONFLICT",
            ErrorCode::Export => "EXPORT_FAILED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("instrument {scope}/{name} already registered with a different definition: {reason}")]
    DuplicateDefinition {
        scope: String,
        name: String,
        reason: String,
    },
    #[error("invalid instrument name: {0:?}")]
    InvalidName(String),
    #[error("invalid view: {0}")]
    InvalidView(String),
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("observer #{id} failed: {source}")]
    Callback {
        id: u64,
        #[source]
        source: Box<MeterError>,
    },
    #[error("overflow while aggregating {0}")]
    Overflow(String),
    #[error("closed")]
    Closed,
    #[error("reader is not registered with a meter provider")]
    ReaderNotRegistered,
    #[error("reader is already registered with a meter provider")]
    DuplicateRegistration,
    #[error("cannot merge resources with different schema urls: {0} vs {1}")]
    SchemaUrlConflict(String, String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MeterError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeterError::DuplicateDefinition { .. } => ErrorCode::DuplicateDefinition,
            MeterError::InvalidName(_) => ErrorCode::InvalidName,
            MeterError::InvalidView(_) => ErrorCode::InvalidView,
            MeterError::ContractViolation(_) => ErrorCode::ContractViolation,
            MeterError::Callback { .. } => ErrorCode::Callback,
            MeterError::Overflow(_) => ErrorCode::Overflow,
            MeterError::Closed => ErrorCode::Closed,
            MeterError::ReaderNotRegistered => ErrorCode::ReaderNotRegistered,
            MeterError::DuplicateRegistration => ErrorCode::DuplicateRegistration,
            MeterError::SchemaUrlConflict(..) => ErrorCode::SchemaUrlConflict,
            MeterError::Export(_) => ErrorCode::Export,
            MeterError::Config(_) => ErrorCode::Config,
            MeterError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Wrap an observer failure with the registration id it came from.
    pub(crate) fn callback(id: u64, source: MeterError) -> Self {
        MeterError::Callback {
            id,
            source: Box::new(source),
        }
    }
}
