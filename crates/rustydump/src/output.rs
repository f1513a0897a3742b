use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rustydump_wireless::{
    AccessPoint, CapturedKey, IvRecord, LinkType, MacAddress, NotableEvent, PcapWriter, RxInfo, Sinks, Snapshot,
};
use serde::Serialize;

/// Files produced by one replay.
#[derive(Debug, Clone, Serialize)]
pub struct OutputPaths {
    pub hashcat: PathBuf,
    pub ivs: Option<PathBuf>,
    pub pcap: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    pub fn for_prefix(prefix: &Path, record_ivs: bool) -> Self {
        let with = |ext: &str| {
            let mut name = prefix.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        };
        Self {
            hashcat: with("22000"),
            ivs: record_ivs.then(|| with("ivs")),
            pcap: with("pcap"),
            summary: with("json"),
        }
    }
}

/// Counts of what the sinks accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputCounts {
    pub handshakes: u64,
    pub pmkids: u64,
    pub ivs: u64,
    pub raw_frames: u64,
    pub events: u64,
}

/// Sinks writing hashcat lines, IV records and raw frames.
///
/// Sink calls cannot fail, so the first write error of each stream is kept,
/// the stream is closed and later deliveries to it are dropped. `finish`
/// reports the error.
pub struct CaptureSinks<W: Write> {
    hashcat: Option<W>,
    ivs: Option<W>,
    pcap: Option<PcapWriter<W>>,
    counts: OutputCounts,
    last_event: Option<NotableEvent>,
    error: Option<(&'static str, io::Error)>,
}

impl CaptureSinks<BufWriter<File>> {
    pub fn create(paths: &OutputPaths, raw_link: LinkType) -> Result<Self> {
        let hashcat = create_file(&paths.hashcat)?;
        let ivs = paths.ivs.as_deref().map(create_file).transpose()?;
        let pcap = PcapWriter::new(create_file(&paths.pcap)?, raw_link)
            .with_context(|| format!("writing pcap header to {}", paths.pcap.display()))?;
        Ok(Self::new(Some(hashcat), ivs, Some(pcap)))
    }
}

impl<W: Write> CaptureSinks<W> {
    pub fn new(hashcat: Option<W>, ivs: Option<W>, pcap: Option<PcapWriter<W>>) -> Self {
        Self {
            hashcat,
            ivs,
            pcap,
            counts: OutputCounts::default(),
            last_event: None,
            error: None,
        }
    }

    pub fn counts(&self) -> OutputCounts {
        self.counts
    }

    pub fn last_event(&self) -> Option<&NotableEvent> {
        self.last_event.as_ref()
    }

    /// Flushes every stream and hands the writers back.
    pub fn finish(mut self) -> Result<(OutputCounts, Option<W>, Option<W>, Option<W>)> {
        if let Some(w) = self.hashcat.as_mut() {
            w.flush().context("flushing hashcat output")?;
        }
        if let Some(w) = self.ivs.as_mut() {
            w.flush().context("flushing IV output")?;
        }
        if let Some(w) = self.pcap.as_mut() {
            w.flush().context("flushing raw capture")?;
        }
        if let Some((stream, err)) = self.error.take() {
            return Err(anyhow::Error::new(err).context(format!("writing {stream} output")));
        }
        Ok((self.counts, self.hashcat, self.ivs, self.pcap.map(PcapWriter::into_inner)))
    }

    fn failed(&mut self, stream: &'static str, err: io::Error) {
        tracing::warn!(target: "capture", stream, error = %err, "output_stream_closed");
        if self.error.is_none() {
            self.error = Some((stream, err));
        }
    }
}

impl<W: Write> Sinks for CaptureSinks<W> {
    fn on_iv(&mut self, record: &IvRecord) {
        let Some(w) = self.ivs.as_mut() else {
            return;
        };
        match w.write_all(iv_line(record).as_bytes()) {
            Ok(()) => self.counts.ivs += 1,
            Err(err) => {
                self.ivs = None;
                self.failed("IV", err);
            }
        }
    }

    fn on_key(&mut self, bssid: MacAddress, station: MacAddress, key: &CapturedKey) {
        match key {
            CapturedKey::Handshake(_) => self.counts.handshakes += 1,
            CapturedKey::Pmkid(_) => self.counts.pmkids += 1,
        }
        tracing::info!(target: "crypto", bssid = %bssid, station = %station, kind = key_kind(key), "key_material_exported");

        let Some(w) = self.hashcat.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(w, "{}", key.to_hashcat_22000()) {
            self.hashcat = None;
            self.failed("hashcat", err);
        }
    }

    fn on_event(&mut self, event: &NotableEvent) {
        self.counts.events += 1;
        self.last_event = Some(*event);
    }

    fn on_raw_frame(&mut self, frame: &[u8], rx: &RxInfo) {
        let Some(w) = self.pcap.as_mut() else {
            return;
        };
        match w.write_frame(frame, rx) {
            Ok(()) => self.counts.raw_frames += 1,
            Err(err) => {
                self.pcap = None;
                self.failed("raw capture", err);
            }
        }
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn key_kind(key: &CapturedKey) -> &'static str {
    match key {
        CapturedKey::Handshake(_) => "handshake",
        CapturedKey::Pmkid(_) => "pmkid",
    }
}

/// `<bssid> <iv> <keystream>` with IV and keystream in lowercase hex.
pub fn iv_line(record: &IvRecord) -> String {
    format!("{} {} {}\n", record.bssid, hex(&record.iv), hex(&record.keystream.to_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

pub fn write_summary(path: &Path, summary: &serde_json::Value) -> Result<()> {
    let data = serde_json::to_vec_pretty(summary).context("serializing summary")?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

/// Plain-text table of the visible access points and their stations.
pub fn render_text(snapshot: &Snapshot<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<17}  {:>4}  {:>8}  {:>6}  {:>3}  {:<18}  {:<19}  ESSID",
        "BSSID", "PWR", "Beacons", "#Data", "CH", "ENC", "LAST SEEN"
    );
    for view in snapshot.access_points.iter().filter(|view| view.visible) {
        let ap = view.ap;
        let _ = writeln!(
            out,
            "{:<17}  {:>4}  {:>8}  {:>6}  {:>3}  {:<18}  {:<19}  {}",
            ap.bssid,
            power(ap),
            ap.beacons,
            ap.data_frames,
            ap.channel.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            ap.security.labels().join(" "),
            timestamp(ap.last_seen),
            ap.essid_str()
        );
    }

    if !snapshot.stations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<17}  {:<17}  {:>4}  {:>7}  PROBES", "BSSID", "STATION", "PWR", "Frames");
        for station in &snapshot.stations {
            let bssid = match station.ap {
                Some(ap) if !ap.is_broadcast() => ap.to_string(),
                _ => "(not associated)".to_string(),
            };
            let probes: Vec<String> = station.probes.iter().map(|p| String::from_utf8_lossy(p).into_owned()).collect();
            let _ = writeln!(
                out,
                "{:<17}  {:<17}  {:>4}  {:>7}  {}",
                bssid,
                station.mac,
                station.power.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                station.packets,
                probes.join(",")
            );
        }
    }

    if let Some(message) = &snapshot.last_message {
        let _ = writeln!(out);
        let _ = writeln!(out, "[ {} ]", message);
    }
    out
}

fn power(ap: &AccessPoint) -> String {
    ap.power.best.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
}

fn timestamp(ts: SystemTime) -> String {
    DateTime::<Utc>::from(ts).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustydump_wireless::Keystream;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(last: u8) -> IvRecord {
        IvRecord {
            bssid: MacAddress([0, 1, 2, 3, 4, 5]),
            iv: [0xAA, 0xBB, last, 0x00],
            keystream: Keystream::Xor(vec![0xDE, 0xAD]),
        }
    }

    #[test]
    fn prefix_paths() {
        let paths = OutputPaths::for_prefix(Path::new("/tmp/run-01"), false);
        assert_eq!(paths.hashcat, PathBuf::from("/tmp/run-01.22000"));
        assert_eq!(paths.pcap, PathBuf::from("/tmp/run-01.pcap"));
        assert_eq!(paths.summary, PathBuf::from("/tmp/run-01.json"));
        assert!(paths.ivs.is_none());
        let paths = OutputPaths::for_prefix(Path::new("cap"), true);
        assert_eq!(paths.ivs, Some(PathBuf::from("cap.ivs")));
    }

    #[test]
    fn iv_records_are_hex_lines() {
        assert_eq!(iv_line(&record(0xCC)), "00:01:02:03:04:05 aabbcc00 dead\n");
    }

    #[test]
    fn failed_stream_is_closed_and_reported() {
        let mut sinks: CaptureSinks<Broken> = CaptureSinks::new(None, Some(Broken), None);
        sinks.on_iv(&record(1));
        sinks.on_iv(&record(2));
        assert_eq!(sinks.counts().ivs, 0);
        let err = sinks.finish().err().expect("write error");
        assert!(format!("{:#}", err).contains("disk full"));
    }

    #[test]
    fn events_are_counted() {
        let mut sinks: CaptureSinks<Vec<u8>> = CaptureSinks::new(None, None, None);
        sinks.on_event(&NotableEvent::Decloak(MacAddress([0, 1, 2, 3, 4, 5])));
        assert_eq!(sinks.counts().events, 1);
        assert_eq!(sinks.last_event(), Some(&NotableEvent::Decloak(MacAddress([0, 1, 2, 3, 4, 5]))));
    }
}
