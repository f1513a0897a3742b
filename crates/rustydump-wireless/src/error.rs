//! Error types for rustydump-wireless
//!
//! Malformed radio input is never an error here: parsers stop early and keep
//! whatever state they already applied. These variants cover user input and
//! capture-file I/O.

use thiserror::Error;

/// Result type alias for wireless operations
pub type Result<T> = std::result::Result<T, WirelessError>;

/// Main error type for wireless operations
#[derive(Error, Debug)]
pub enum WirelessError {
    /// Invalid MAC address
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// Filter string could not be understood
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// ESSID regular expression failed to compile
    #[error("Invalid ESSID pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Capture file is not a pcap we can read
    #[error("Capture file error: {0}")]
    Pcap(String),

    /// Link type not carrying 802.11 frames
    #[error("Unsupported link type: {0}")]
    UnsupportedLinkType(u32),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WirelessError {
    /// Create a filter error
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create a capture file error
    pub fn pcap(msg: impl Into<String>) -> Self {
        Self::Pcap(msg.into())
    }

    /// Check if this error came from the filesystem
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
