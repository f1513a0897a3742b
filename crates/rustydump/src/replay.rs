use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use rustydump_wireless::{Analyzer, AnalyzerStats, PcapReader, PcapRecord, Sinks};
use serde::Serialize;

/// What one pass over a capture file did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub records: u64,
    /// Malformed radiotap header or bad FCS
    pub undecodable: u64,
    /// Entities dropped by aging during the replay
    pub purged: u64,
    pub first_timestamp: Option<SystemTime>,
    pub last_timestamp: Option<SystemTime>,
    pub stats: AnalyzerStats,
}

pub fn open_capture(path: &Path) -> Result<PcapReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    PcapReader::new(BufReader::new(file)).with_context(|| format!("reading pcap header of {}", path.display()))
}

/// Feeds every record of `reader` to the analyzer in file order.
///
/// Records are read on a separate thread and handed over through a bounded
/// channel of `queue_depth` entries. The analyzer clock is the capture
/// clock: `tick` runs after each frame with that frame's timestamp.
pub fn replay<R, S>(reader: PcapReader<R>, analyzer: &mut Analyzer<S>, queue_depth: usize) -> Result<ReplayReport>
where
    R: Read + Send + 'static,
    S: Sinks,
{
    let link = reader.link_type();
    let (tx, records) = mpsc::sync_channel::<rustydump_wireless::Result<PcapRecord>>(queue_depth.max(1));
    let reader_thread = thread::Builder::new()
        .name("pcap-reader".into())
        .spawn(move || {
            for record in reader {
                let failed = record.is_err();
                if tx.send(record).is_err() || failed {
                    break;
                }
            }
        })
        .context("spawning pcap reader thread")?;

    tracing::info!(target: "capture", link = link.code(), queue_depth, "replay_started");

    let mut report = ReplayReport::default();
    let mut failure = None;
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };
        report.records += 1;
        report.first_timestamp.get_or_insert(record.timestamp);
        report.last_timestamp = Some(record.timestamp);

        match record.frame(link) {
            Some((rx, frame)) => {
                analyzer.process_frame(frame, &rx);
                let purged = analyzer.tick(rx.timestamp);
                if !purged.is_empty() {
                    tracing::debug!(
                        target: "wifi",
                        access_points = purged.access_points.len(),
                        stations = purged.stations.len(),
                        unidentified = purged.unidentified.len(),
                        "entities_purged"
                    );
                    report.purged += purged.total() as u64;
                }
            }
            None => {
                report.undecodable += 1;
                tracing::trace!(target: "capture", record = report.records, len = record.data.len(), "record_undecodable");
            }
        }
    }

    reader_thread
        .join()
        .map_err(|_| anyhow!("pcap reader thread panicked"))?;
    if let Some(err) = failure {
        return Err(err).with_context(|| format!("reading record {}", report.records + 1));
    }

    report.stats = analyzer.stats();
    tracing::info!(
        target: "capture",
        records = report.records,
        undecodable = report.undecodable,
        purged = report.purged,
        "replay_finished"
    );
    Ok(report)
}
