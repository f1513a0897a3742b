//! # rustydump-wpa
//!
//! Offline-cracker export records for material captured by the analyzer:
//! WPA 4-way handshakes and PMKIDs, rendered as hashcat 22000 lines.

pub mod error;
pub mod handshake;
mod hex;
pub mod pmkid;

pub use error::{Result, WpaError};
pub use handshake::{HandshakeExport, MessagePair};
pub use pmkid::PmkidExport;
