use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rustydump_wireless::{LinkType, MacAddress};

#[derive(Parser, Debug)]
#[command(
    name = "rustydump",
    author,
    version,
    about = "Passive 802.11 analyzer for capture files"
)]
pub struct Cli {
    /// State directory holding config/ and logs/ (file logging is off without one)
    #[arg(long, global = true, env = "RUSTYDUMP_ROOT")]
    pub root: Option<PathBuf>,

    /// Output format for command responses
    #[arg(
        long = "output",
        value_enum,
        default_value_t = OutputFormat::Text,
        global = true
    )]
    pub output_format: OutputFormat,

    /// Shorthand for --output json
    #[arg(long, global = true)]
    pub json: bool,

    /// Log filter directive, overrides config/logging.json
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a capture file through the analyzer
    Replay(ReplayArgs),
    /// Write broadcast probe requests to a capture file
    Probe(ProbeArgs),
    #[command(subcommand)]
    Logs(LogsCommand),
}

#[derive(Args, Debug, Default)]
pub struct ReplayArgs {
    /// pcap file with 802.11 (105) or radiotap (127) link type
    pub input: PathBuf,

    /// Output prefix; writes <prefix>.22000, <prefix>.ivs, <prefix>.pcap and <prefix>.json
    #[arg(short = 'w', long)]
    pub write: Option<PathBuf>,

    /// Link type for the raw frame capture
    #[arg(long, value_enum)]
    pub raw_link: Option<RawLink>,

    /// Export unique WEP IVs
    #[arg(long)]
    pub ivs: bool,

    /// Watch for frames padded to hide keystream reuse
    #[arg(long)]
    pub decloak: bool,

    /// Flag WEP IVs reused with different ciphertext
    #[arg(long)]
    pub detect_anomaly: bool,

    /// Keep one beacon per access point in the raw capture
    #[arg(long)]
    pub one_beacon: bool,

    /// Only probe responses are processed
    #[arg(long)]
    pub active_scan: bool,

    /// Packets before an access point is shown
    #[arg(long)]
    pub min_packets: Option<u64>,

    /// Seconds an access point stays shown after it was last heard
    #[arg(long)]
    pub berlin: Option<u64>,

    /// Seconds of silence before an entity is dropped, 0 keeps everything
    #[arg(long)]
    pub max_age: Option<u64>,

    /// Channel the capture was taken on
    #[arg(short = 'c', long)]
    pub channel: Option<u8>,

    /// Encryption filter: opn, wep, wpa, wpa1, wpa2, wpa3, owe (repeatable)
    #[arg(long = "encrypt")]
    pub encryption: Vec<String>,

    /// ESSID to keep (repeatable)
    #[arg(long = "essid")]
    pub essids: Vec<String>,

    /// Regular expression the ESSID must match
    #[arg(long)]
    pub essid_regex: Option<String>,

    /// BSSID to keep (repeatable)
    #[arg(long = "bssid")]
    pub bssids: Vec<MacAddress>,

    /// Mask applied to both sides of a BSSID comparison
    #[arg(long)]
    pub netmask: Option<MacAddress>,

    /// Records buffered between the reader thread and the analyzer
    #[arg(long)]
    pub queue_depth: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RawLink {
    Ieee80211,
    Radiotap,
}

impl From<RawLink> for LinkType {
    fn from(link: RawLink) -> Self {
        match link {
            RawLink::Ieee80211 => LinkType::Ieee80211,
            RawLink::Radiotap => LinkType::Radiotap,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Destination pcap file (802.11 link type)
    pub output: PathBuf,

    /// Number of probe requests
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Seed for reproducible source addresses
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Delete expired log files and enforce the size cap
    Prune,
    /// Show the logging config in effect
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_flags_parse() {
        let cli = Cli::try_parse_from([
            "rustydump",
            "--json",
            "replay",
            "cap.pcap",
            "-w",
            "out",
            "--encrypt",
            "wpa2",
            "--bssid",
            "00:11:22:33:44:55",
            "--netmask",
            "FF:FF:FF:00:00:00",
            "--max-age",
            "30",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.input, PathBuf::from("cap.pcap"));
        assert_eq!(args.write, Some(PathBuf::from("out")));
        assert_eq!(args.encryption, vec!["wpa2".to_string()]);
        assert_eq!(args.bssids, vec![MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])]);
        assert_eq!(args.netmask, Some(MacAddress([0xFF, 0xFF, 0xFF, 0, 0, 0])));
        assert_eq!(args.max_age, Some(30));
    }

    #[test]
    fn bad_mac_is_rejected() {
        assert!(Cli::try_parse_from(["rustydump", "replay", "cap.pcap", "--bssid", "nope"]).is_err());
    }
}
