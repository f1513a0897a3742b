//! Analyzer options and the filters compiled from them.

use std::time::Duration;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frames::MacAddress;
use crate::security::{parse_encryption_filter, Security};

pub const DEFAULT_MIN_PKTS: u64 = 2;
pub const DEFAULT_BERLIN: Duration = Duration::from_secs(120);

/// Every option the analyzer core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Keep the per-AP unique IV set and export keystream records
    pub record_ivs: bool,
    /// Arm decloak detection on every new AP
    pub decloak: bool,
    /// Flag WEP cloaking (same IV, different ciphertext)
    pub detect_anomaly: bool,
    /// Forward only the first beacon of each AP to the raw sink
    pub one_beacon: bool,
    /// Process probe responses only
    pub active_scan: bool,
    /// Frames needed before an AP is displayed
    pub min_pkts: u64,
    /// APs silent for longer than this are hidden
    pub berlin: Duration,
    /// Idle entities are purged after this; zero keeps them forever
    pub max_age: Duration,
    /// Channel used when radio metadata has none
    pub fixed_channel: Option<u8>,
    /// Encryption filter, e.g. `wpa2,owe`
    pub encryption: Option<String>,
    /// ESSIDs allowed through
    pub essids: Vec<String>,
    /// ESSID regular expression
    pub essid_regex: Option<String>,
    pub bssids: Vec<MacAddress>,
    pub netmask: Option<MacAddress>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            record_ivs: false,
            decloak: false,
            detect_anomaly: false,
            one_beacon: false,
            active_scan: false,
            min_pkts: DEFAULT_MIN_PKTS,
            berlin: DEFAULT_BERLIN,
            max_age: Duration::ZERO,
            fixed_channel: None,
            encryption: None,
            essids: Vec::new(),
            essid_regex: None,
            bssids: Vec::new(),
            netmask: None,
        }
    }
}

impl AnalyzerConfig {
    /// Compile the filter options. Fails on an unknown encryption name or
    /// a bad regular expression.
    pub fn filters(&self) -> Result<Filters> {
        let encryption = match &self.encryption {
            Some(spec) => parse_encryption_filter(spec)?,
            None => Security::NONE,
        };
        let pattern = self.essid_regex.as_deref().map(Regex::new).transpose()?;
        Ok(Filters {
            encryption,
            essid: EssidFilter::new(self.essids.iter().map(|e| e.as_bytes().to_vec()).collect(), pattern),
            bssid: BssidFilter::new(self.bssids.clone(), self.netmask),
        })
    }
}

/// Compiled, read-only filter set.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub encryption: Security,
    pub essid: EssidFilter,
    pub bssid: BssidFilter,
}

/// ESSID allow list and optional pattern. Both must accept when both are set.
#[derive(Debug, Clone, Default)]
pub struct EssidFilter {
    allow: Vec<Vec<u8>>,
    pattern: Option<Regex>,
}

impl EssidFilter {
    pub fn new(allow: Vec<Vec<u8>>, pattern: Option<Regex>) -> Self {
        Self { allow, pattern }
    }

    pub fn is_active(&self) -> bool {
        !self.allow.is_empty() || self.pattern.is_some()
    }

    /// True when the ESSID should be suppressed.
    pub fn is_filtered(&self, essid: &[u8]) -> bool {
        if !self.allow.is_empty() && !self.allow.iter().any(|e| e.as_slice() == essid) {
            return true;
        }
        match &self.pattern {
            Some(pattern) => !pattern.is_match(essid),
            None => false,
        }
    }
}

/// BSSID list compared under an optional netmask.
#[derive(Debug, Clone, Default)]
pub struct BssidFilter {
    bssids: Vec<MacAddress>,
    netmask: Option<MacAddress>,
}

impl BssidFilter {
    pub fn new(bssids: Vec<MacAddress>, netmask: Option<MacAddress>) -> Self {
        Self { bssids, netmask }
    }

    pub fn is_active(&self) -> bool {
        !self.bssids.is_empty()
    }

    /// True when the BSSID matches none of the configured entries.
    pub fn is_filtered(&self, bssid: &MacAddress) -> bool {
        if self.bssids.is_empty() {
            return false;
        }
        let matches = |wanted: &MacAddress| match &self.netmask {
            Some(mask) => bssid.masked(mask) == wanted.masked(mask),
            None => bssid == wanted,
        };
        !self.bssids.iter().any(matches)
    }
}
