//! History query error types
//!
//! Error codes:
//! - HISTORY_MALFORMED_ENCODING (FATAL)
//! - HISTORY_INVALID_RANGE (ERROR)
//! - HISTORY_INTEGRITY_VIOLATION (FATAL)
//! - HISTORY_RESOURCE_UNAVAILABLE (ERROR)

use std::error::Error as StdError;
use std::fmt;

use crate::blockstore::BlockStoreError;
use crate::codec::CodecError;
use crate::kvstore::StoreError;

/// Severity levels for history errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query fails, the index stays usable
    Error,
    /// The index or the ledger is damaged
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// History error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryErrorCode {
    /// Varint or composite key/value could not be decoded
    MalformedEncoding,
    /// Caller supplied a range that cannot be served
    InvalidRange,
    /// Index entry points at a transaction that does not write the key
    IntegrityViolation,
    /// Ordered store or block store failure
    ResourceUnavailable,
}

impl HistoryErrorCode {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            HistoryErrorCode::MalformedEncoding => "HISTORY_MALFORMED_ENCODING",
            HistoryErrorCode::InvalidRange => "HISTORY_INVALID_RANGE",
            HistoryErrorCode::IntegrityViolation => "HISTORY_INTEGRITY_VIOLATION",
            HistoryErrorCode::ResourceUnavailable => "HISTORY_RESOURCE_UNAVAILABLE",
        }
    }

    /// Severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            HistoryErrorCode::MalformedEncoding => Severity::Fatal,
            HistoryErrorCode::InvalidRange => Severity::Error,
            HistoryErrorCode::IntegrityViolation => Severity::Fatal,
            HistoryErrorCode::ResourceUnavailable => Severity::Error,
        }
    }
}

impl fmt::Display for HistoryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// History error with code, message and optional context
#[derive(Debug)]
pub struct HistoryError {
    code: HistoryErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl HistoryError {
    fn new(code: HistoryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Undecodable index bytes
    pub fn malformed_encoding(message: impl Into<String>) -> Self {
        Self::new(HistoryErrorCode::MalformedEncoding, message)
    }

    /// Rejected query bounds
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::new(HistoryErrorCode::InvalidRange, message)
    }

    /// Index entry and ledger disagree about a (block, tx) pair
    pub fn integrity_violation(
        namespace: &str,
        key: &str,
        block_num: u64,
        tran_num: u64,
    ) -> Self {
        let mut err = Self::new(
            HistoryErrorCode::IntegrityViolation,
            format!(
                "no write to namespace {} key {} in indexed transaction",
                namespace, key
            ),
        );
        err.details = Some(format!("block_num: {}, tran_num: {}", block_num, tran_num));
        err
    }

    /// Storage-level failure
    pub fn resource_unavailable(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        let mut err = Self::new(HistoryErrorCode::ResourceUnavailable, message);
        err.source = Some(Box::new(source));
        err
    }

    /// Attaches context to the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> HistoryErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Whether the index or ledger is damaged
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl StdError for HistoryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<CodecError> for HistoryError {
    fn from(err: CodecError) -> Self {
        let mut converted = HistoryError::malformed_encoding(err.to_string());
        converted.source = Some(Box::new(err));
        converted
    }
}

impl From<StoreError> for HistoryError {
    fn from(err: StoreError) -> Self {
        HistoryError::resource_unavailable("history index unavailable", err)
    }
}

impl From<BlockStoreError> for HistoryError {
    fn from(err: BlockStoreError) -> Self {
        if err.is_corruption() {
            let mut converted = HistoryError::malformed_encoding(err.to_string());
            converted.source = Some(Box::new(err));
            converted
        } else {
            HistoryError::resource_unavailable("block store unavailable", err)
        }
    }
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            HistoryErrorCode::MalformedEncoding.code(),
            "HISTORY_MALFORMED_ENCODING"
        );
        assert_eq!(HistoryErrorCode::InvalidRange.code(), "HISTORY_INVALID_RANGE");
        assert_eq!(
            HistoryErrorCode::IntegrityViolation.code(),
            "HISTORY_INTEGRITY_VIOLATION"
        );
        assert_eq!(
            HistoryErrorCode::ResourceUnavailable.code(),
            "HISTORY_RESOURCE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_severity_levels() {
        assert!(HistoryError::malformed_encoding("x").is_fatal());
        assert!(HistoryError::integrity_violation("ns", "k", 1, 0).is_fatal());
        assert!(!HistoryError::invalid_range("x").is_fatal());
        assert!(!HistoryError::from(StoreError::Closed).is_fatal());
    }

    #[test]
    fn test_display_contains_context() {
        let err = HistoryError::integrity_violation("marbles", "marble1", 12, 3);
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("HISTORY_INTEGRITY_VIOLATION"));
        assert!(display.contains("marble1"));
        assert!(display.contains("block_num: 12, tran_num: 3"));
    }

    #[test]
    fn test_codec_error_maps_to_malformed() {
        let err: HistoryError = CodecError::MalformedVarint("truncated".into()).into();
        assert_eq!(err.code(), HistoryErrorCode::MalformedEncoding);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_block_store_errors_map_by_kind() {
        let not_found: HistoryError = BlockStoreError::BlockNotFound {
            block_num: 4,
            height: 2,
        }
        .into();
        assert_eq!(not_found.code(), HistoryErrorCode::ResourceUnavailable);
        assert!(not_found.source().unwrap().to_string().contains("block 4"));

        let corrupt: HistoryError = BlockStoreError::Corruption {
            offset: 0,
            reason: "checksum mismatch".into(),
        }
        .into();
        assert_eq!(corrupt.code(), HistoryErrorCode::MalformedEncoding);

        let bad_location: HistoryError = BlockStoreError::LocationCorruption {
            block_num: 3,
            tran_num: 1,
            reason: "truncated".into(),
        }
        .into();
        assert_eq!(bad_location.code(), HistoryErrorCode::MalformedEncoding);
    }
}
