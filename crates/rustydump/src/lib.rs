//! Command-line front end for the rustydump analyzer.

pub mod cli;
pub mod config;
pub mod output;
pub mod replay;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustydump_logging::fs::read_config;
use rustydump_wireless::{build_probe_request, Analyzer, LinkType, MacAddress, PcapWriter};
use serde_json::{json, Value};

pub use cli::{Cli, Commands, LogsCommand, OutputFormat, ProbeArgs, ReplayArgs};

use crate::config::EnvConfig;
use crate::output::{render_text, write_summary, CaptureSinks, OutputPaths};
use crate::replay::{open_capture, replay};

/// Result of one command: a one-line message, the JSON payload and an
/// optional table shown instead of the payload in text mode.
#[derive(Debug)]
pub struct CommandOutput {
    pub message: String,
    pub data: Value,
    pub table: Option<String>,
}

impl CommandOutput {
    fn new(message: String, data: Value) -> Self {
        Self {
            message,
            data,
            table: None,
        }
    }
}

pub fn dispatch_command(root: Option<&Path>, command: Commands) -> Result<CommandOutput> {
    match command {
        Commands::Replay(args) => handle_replay(&EnvConfig::from_env(), args),
        Commands::Probe(args) => handle_probe(args),
        Commands::Logs(LogsCommand::Prune) => {
            let root = root.ok_or_else(|| anyhow!("log maintenance needs --root or RUSTYDUMP_ROOT"))?;
            let cfg = read_config(root);
            let report = rustydump_logging::run_retention(root, &cfg).context("pruning logs")?;
            Ok(CommandOutput::new(
                format!("Removed {} log files", report.expired + report.over_cap),
                json!({
                    "expired": report.expired,
                    "over_cap": report.over_cap,
                    "remaining_bytes": report.remaining_bytes,
                }),
            ))
        }
        Commands::Logs(LogsCommand::Show) => {
            let cfg = root.map(read_config).unwrap_or_default();
            Ok(CommandOutput::new(
                "Logging configuration".to_string(),
                serde_json::to_value(&cfg).context("serializing logging config")?,
            ))
        }
    }
}

pub fn handle_replay(env: &EnvConfig, args: ReplayArgs) -> Result<CommandOutput> {
    let config = env.analyzer_config(&args);
    let reader = open_capture(&args.input)?;

    let paths = args
        .write
        .as_deref()
        .map(|prefix| OutputPaths::for_prefix(prefix, config.record_ivs));
    let sinks = match &paths {
        Some(paths) => {
            let link = args.raw_link.map(LinkType::from).unwrap_or(LinkType::Radiotap);
            CaptureSinks::create(paths, link)?
        }
        None => CaptureSinks::<BufWriter<File>>::new(None, None, None),
    };

    let mut analyzer = Analyzer::new(config, sinks).context("invalid filter options")?;
    let report = replay(reader, &mut analyzer, env.queue_depth(&args))
        .with_context(|| format!("replaying {}", args.input.display()))?;

    let now = report.last_timestamp.unwrap_or_else(SystemTime::now);
    let snapshot = analyzer.snapshot(now);
    let table = render_text(&snapshot);
    let visible = snapshot.access_points.iter().filter(|view| view.visible).count();
    let stations = snapshot.stations.len();
    let snapshot = serde_json::to_value(&snapshot).context("serializing snapshot")?;

    let (counts, _, _, _) = analyzer.into_sinks().finish()?;
    let data = json!({
        "input": args.input,
        "report": &report,
        "outputs": &paths,
        "exports": counts,
        "snapshot": snapshot,
    });
    if let Some(paths) = &paths {
        write_summary(&paths.summary, &data)?;
    }

    let message = format!(
        "Replayed {} records: {} access points shown, {} stations, {} handshakes, {} PMKIDs",
        report.records, visible, stations, counts.handshakes, counts.pmkids
    );
    Ok(CommandOutput {
        message,
        data,
        table: Some(table),
    })
}

pub fn handle_probe(args: ProbeArgs) -> Result<CommandOutput> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let file = File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer = PcapWriter::new(BufWriter::new(file), LinkType::Ieee80211)
        .with_context(|| format!("writing pcap header to {}", args.output.display()))?;

    let mut sources = Vec::with_capacity(args.count as usize);
    let rx = rustydump_wireless::RxInfo::new(SystemTime::now());
    for _ in 0..args.count {
        let frame = build_probe_request(&mut rng);
        if let Some(source) = MacAddress::read(&frame, 10) {
            sources.push(source);
        }
        writer
            .write_frame(&frame, &rx)
            .with_context(|| format!("writing {}", args.output.display()))?;
    }
    writer.flush().with_context(|| format!("flushing {}", args.output.display()))?;
    tracing::info!(target: "capture", count = args.count, path = %args.output.display(), "probe_requests_written");

    Ok(CommandOutput::new(
        format!("Wrote {} probe requests to {}", args.count, args.output.display()),
        json!({ "output": args.output, "sources": sources }),
    ))
}
