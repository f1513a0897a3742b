use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use rustydump::config::EnvConfig;
use rustydump::{dispatch_command, handle_replay, Commands, LogsCommand, ProbeArgs, ReplayArgs};
use rustydump_wireless::{LinkType, PcapReader, PcapWriter, RxInfo};

const AP: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
const STA: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB];
const RSN_CCMP_PSK: &[u8] = &[
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00,
    0x00, 0x0f, 0xac, 0x02, 0x00, 0x00,
];

fn at(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
}

fn header(fc0: u8, fc1: u8, a1: [u8; 6], a2: [u8; 6], a3: [u8; 6], seq: u16) -> Vec<u8> {
    let mut f = vec![fc0, fc1, 0x00, 0x00];
    f.extend_from_slice(&a1);
    f.extend_from_slice(&a2);
    f.extend_from_slice(&a3);
    f.extend_from_slice(&(seq << 4).to_le_bytes());
    f
}

fn beacon(name: &str) -> Vec<u8> {
    let mut f = header(0x80, 0x00, [0xFF; 6], AP, AP, 1);
    f.extend_from_slice(&[0; 8]);
    f.extend_from_slice(&[0x64, 0x00, 0x11, 0x00]);
    f.extend_from_slice(&[0x00, name.len() as u8]);
    f.extend_from_slice(name.as_bytes());
    f.extend_from_slice(&[0x03, 0x01, 0x06]);
    f.extend_from_slice(RSN_CCMP_PSK);
    f
}

fn eapol(key_info: u16, nonce: [u8; 32], mic: [u8; 16]) -> Vec<u8> {
    let mut body = vec![0u8; 99];
    body[0] = 0x02;
    body[1] = 0x03;
    body[2..4].copy_from_slice(&95u16.to_be_bytes());
    body[4] = 0x02;
    body[5..7].copy_from_slice(&key_info.to_be_bytes());
    body[17..49].copy_from_slice(&nonce);
    body[81..97].copy_from_slice(&mic);

    let mut payload = vec![0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E];
    payload.extend_from_slice(&body);
    payload
}

fn message_one(seq: u16) -> Vec<u8> {
    let mut f = header(0x08, 0x02, STA, AP, AP, seq);
    f.extend_from_slice(&eapol(0x008A, [0x11; 32], [0; 16]));
    f
}

fn message_two(seq: u16) -> Vec<u8> {
    let mut f = header(0x08, 0x01, AP, STA, [0xFF; 6], seq);
    f.extend_from_slice(&eapol(0x010A, [0x22; 32], [0x33; 16]));
    f
}

fn write_capture(path: &Path, link: LinkType, frames: &[(u64, Vec<u8>)]) {
    let file = fs::File::create(path).expect("create capture");
    let mut writer = PcapWriter::new(file, link).expect("pcap header");
    for (ms, frame) in frames {
        let rx = RxInfo::new(at(*ms)).with_power(-40).with_channel(6).with_rate(54_000_000);
        writer.write_frame(frame, &rx).expect("write frame");
    }
}

#[test]
fn replay_writes_every_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.pcap");
    write_capture(
        &input,
        LinkType::Radiotap,
        &[
            (0, beacon("lab")),
            (100, beacon("lab")),
            (200, message_one(5)),
            (210, message_two(6)),
        ],
    );

    let prefix = dir.path().join("out");
    let args = ReplayArgs {
        input: input.clone(),
        write: Some(prefix.clone()),
        min_packets: Some(1),
        ..ReplayArgs::default()
    };
    let output = handle_replay(&EnvConfig::default(), args).expect("replay");

    assert_eq!(output.data["report"]["records"], 4);
    assert_eq!(output.data["exports"]["handshakes"], 1);
    assert!(output.message.contains("1 handshakes"), "{}", output.message);
    let table = output.table.expect("table");
    assert!(table.contains("00:11:22:33:44:55"));
    assert!(table.contains("lab"));

    let hashcat = fs::read_to_string(dir.path().join("out.22000")).expect("hashcat file");
    assert_eq!(hashcat.lines().count(), 1);
    assert!(hashcat.starts_with("WPA*02*33333333333333333333333333333333*001122334455*66778899aabb*6c6162*"));

    let raw = fs::File::open(dir.path().join("out.pcap")).expect("raw capture");
    let reader = PcapReader::new(raw).expect("raw header");
    assert_eq!(reader.link_type(), LinkType::Radiotap);
    assert_eq!(reader.count(), 4);

    let summary: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("out.json")).expect("summary")).expect("summary json");
    assert_eq!(summary["snapshot"]["access_points"][0]["essid"], "lab");
    assert!(!dir.path().join("out.ivs").exists());
}

#[test]
fn encryption_filter_from_flags_limits_raw_capture() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.pcap");
    write_capture(&input, LinkType::Ieee80211, &[(0, beacon("lab")), (50, beacon("lab"))]);

    let args = ReplayArgs {
        input,
        write: Some(dir.path().join("wep")),
        encryption: vec!["wep".into()],
        raw_link: Some(rustydump::cli::RawLink::Ieee80211),
        ..ReplayArgs::default()
    };
    let output = handle_replay(&EnvConfig::default(), args).expect("replay");
    assert_eq!(output.data["exports"]["raw_frames"], 0);
    assert_eq!(output.data["report"]["stats"]["frames"], 2);
}

#[test]
fn bad_filter_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.pcap");
    write_capture(&input, LinkType::Ieee80211, &[(0, beacon("lab"))]);

    let args = ReplayArgs {
        input,
        essid_regex: Some("(".into()),
        ..ReplayArgs::default()
    };
    let err = handle_replay(&EnvConfig::default(), args).expect_err("regex must fail");
    assert!(format!("{:#}", err).contains("invalid filter options"));
}

#[test]
fn missing_input_names_the_file() {
    let args = ReplayArgs {
        input: "/nonexistent/capture.pcap".into(),
        ..ReplayArgs::default()
    };
    let err = handle_replay(&EnvConfig::default(), args).expect_err("missing file");
    assert!(format!("{:#}", err).contains("/nonexistent/capture.pcap"));
}

#[test]
fn probe_requests_replay_as_unassociated_stations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let probes = dir.path().join("probes.pcap");
    let output = dispatch_command(
        None,
        Commands::Probe(ProbeArgs {
            output: probes.clone(),
            count: 3,
            seed: Some(7),
        }),
    )
    .expect("probe");
    let sources = output.data["sources"].as_array().expect("sources").clone();
    assert_eq!(sources.len(), 3);

    let args = ReplayArgs {
        input: probes.clone(),
        ..ReplayArgs::default()
    };
    let output = handle_replay(&EnvConfig::default(), args).expect("replay");
    let stations = output.data["snapshot"]["stations"].as_array().expect("stations");
    assert!(!stations.is_empty());
    assert!(output.data["snapshot"]["access_points"].as_array().expect("aps").is_empty());

    let args = ReplayArgs {
        input: probes,
        active_scan: true,
        ..ReplayArgs::default()
    };
    let output = handle_replay(&EnvConfig::default(), args).expect("replay");
    assert_eq!(output.data["report"]["stats"]["scan_skipped"], 3);
}

#[test]
fn log_maintenance_needs_a_root() {
    assert!(dispatch_command(None, Commands::Logs(LogsCommand::Prune)).is_err());

    let root = tempfile::tempdir().expect("tempdir");
    let output = dispatch_command(Some(root.path()), Commands::Logs(LogsCommand::Prune)).expect("prune");
    assert_eq!(output.data["expired"], 0);
    let output = dispatch_command(Some(root.path()), Commands::Logs(LogsCommand::Show)).expect("show");
    assert_eq!(output.data["level"], "info");
}
