//! Error types for WPA export records.

use thiserror::Error;

/// Result type alias for WPA operations.
pub type Result<T> = std::result::Result<T, WpaError>;

/// Error type for WPA operations.
#[derive(Error, Debug)]
pub enum WpaError {
    /// A hashcat line could not be parsed back into a record.
    #[error("Malformed hash line: {0}")]
    MalformedLine(String),

    /// A hex field had an odd length or a non-hex digit.
    #[error("Invalid hex in field {field}: {value}")]
    InvalidHex { field: &'static str, value: String },
}
