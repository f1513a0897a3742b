//! # rustydump-wireless
//!
//! Passive 802.11 analysis core. Captured frames go in one at a time; the
//! analyzer attributes each to an access point, a station or an
//! unidentified transmitter, accumulates what the frame reveals about it
//! (security, capabilities, traffic quality, handshake material) and pushes
//! anything notable to caller-supplied sinks.
//!
//! ## Example
//!
//! ```no_run
//! use rustydump_wireless::{Analyzer, AnalyzerConfig, MemorySink, PcapReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::fs::File::open("capture.pcap")?;
//! let mut reader = PcapReader::new(file)?;
//! let link = reader.link_type();
//! let mut analyzer = Analyzer::new(AnalyzerConfig::default(), MemorySink::new())?;
//!
//! while let Some(record) = reader.next_record()? {
//!     if let Some((rx, frame)) = record.frame(link) {
//!         analyzer.process_frame(frame, &rx);
//!         analyzer.tick(rx.timestamp);
//!     }
//! }
//! for ap in analyzer.directory().access_points().iter() {
//!     println!("{} {}", ap.bssid, ap.essid_str());
//! }
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod config;
pub mod cursor;
pub mod decloak;
pub mod directory;
pub mod elements;
pub mod entities;
pub mod error;
pub mod frames;
pub mod handshake;
pub mod pcap;
pub mod probe;
pub mod radiotap;
pub mod rates;
pub mod security;
pub mod sinks;
pub mod traffic;
pub mod wep;

pub use analyzer::{Analyzer, AnalyzerStats, Snapshot};
pub use config::{AnalyzerConfig, BssidFilter, EssidFilter, Filters};
pub use directory::{Directory, EntityKind, PurgeReport};
pub use entities::{AccessPoint, Station, UnidentifiedNode};
pub use error::{Result, WirelessError};
pub use frames::{locate, DsMode, FrameControl, HeaderLocation, MacAddress};
pub use handshake::{HandshakeProgress, WpaHandshake};
pub use pcap::{LinkType, PcapReader, PcapRecord, PcapWriter};
pub use probe::build_probe_request;
pub use radiotap::RxInfo;
pub use security::Security;
pub use sinks::{CapturedKey, MemorySink, NotableEvent, NullSink, Sinks};
pub use wep::{IvRecord, Keystream};
