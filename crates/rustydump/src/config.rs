use std::env;
use std::time::Duration;

use rustydump_wireless::AnalyzerConfig;
use rustydump_wireless::config::{DEFAULT_BERLIN, DEFAULT_MIN_PKTS};

use crate::cli::ReplayArgs;

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;
pub const DEFAULT_MAX_AGE_SECS: u64 = 0;

/// Settings read from `RUSTYDUMP_*` variables. Command-line flags win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub min_pkts: u64,
    pub berlin: Duration,
    pub max_age: Duration,
    pub queue_depth: usize,
    pub record_ivs: bool,
    pub decloak: bool,
    pub detect_anomaly: bool,
    pub encryption: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            min_pkts: DEFAULT_MIN_PKTS,
            berlin: DEFAULT_BERLIN,
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            record_ivs: false,
            decloak: false,
            detect_anomaly: false,
            encryption: None,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let min_pkts = env::var("RUSTYDUMP_MIN_PKTS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MIN_PKTS);
        let berlin = env::var("RUSTYDUMP_BERLIN_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_BERLIN);
        let max_age_secs = env::var("RUSTYDUMP_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_AGE_SECS);
        let queue_depth = env::var("RUSTYDUMP_QUEUE_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(DEFAULT_QUEUE_DEPTH);
        let encryption = env::var("RUSTYDUMP_ENCRYPT").ok().filter(|v| !v.trim().is_empty());

        Self {
            min_pkts,
            berlin,
            max_age: Duration::from_secs(max_age_secs),
            queue_depth,
            record_ivs: env_bool("RUSTYDUMP_IVS", false),
            decloak: env_bool("RUSTYDUMP_DECLOAK", false),
            detect_anomaly: env_bool("RUSTYDUMP_DETECT_ANOMALY", false),
            encryption,
        }
    }

    /// Analyzer options for one replay.
    pub fn analyzer_config(&self, args: &ReplayArgs) -> AnalyzerConfig {
        let encryption = if args.encryption.is_empty() {
            self.encryption.clone()
        } else {
            Some(args.encryption.join(","))
        };

        AnalyzerConfig {
            record_ivs: args.ivs || self.record_ivs,
            decloak: args.decloak || self.decloak,
            detect_anomaly: args.detect_anomaly || self.detect_anomaly,
            one_beacon: args.one_beacon,
            active_scan: args.active_scan,
            min_pkts: args.min_packets.unwrap_or(self.min_pkts),
            berlin: args.berlin.map(Duration::from_secs).unwrap_or(self.berlin),
            max_age: args.max_age.map(Duration::from_secs).unwrap_or(self.max_age),
            fixed_channel: args.channel,
            encryption,
            essids: args.essids.clone(),
            essid_regex: args.essid_regex.clone(),
            bssids: args.bssids.clone(),
            netmask: args.netmask,
        }
    }

    pub fn queue_depth(&self, args: &ReplayArgs) -> usize {
        args.queue_depth.filter(|depth| *depth > 0).unwrap_or(self.queue_depth)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(default)
}
