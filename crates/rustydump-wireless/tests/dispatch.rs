mod common;

use std::time::Duration;

use common::*;
use rustydump_wireless::{AnalyzerConfig, MacAddress, NotableEvent, Security};

#[test]
fn minimal_beacon_creates_open_ap() {
    let mut analyzer = analyzer(AnalyzerConfig::default());
    let frame = beacon(AP, 0x01, &[&essid("test"), &[0x03, 0x01, 0x06]]);
    analyzer.process_frame(&frame, &rx(0));

    let aps = analyzer.directory().access_points();
    assert_eq!(aps.len(), 1);
    let ap = aps.get(&MacAddress(AP)).expect("ap created");
    assert_eq!(ap.essid, b"test");
    assert_eq!(ap.channel, Some(6));
    assert_eq!(ap.security, Security::STD_OPN);
    assert_eq!(ap.beacons, 1);
    assert_eq!(ap.power.best, Some(-45));
    assert!(analyzer.directory().stations().is_empty());
    assert_eq!(analyzer.sinks().ap_logs, vec![MacAddress(AP)]);
    assert_eq!(analyzer.sinks().raw_frames.len(), 1);
}

#[test]
fn wep_evidence_then_rsn_beacon_ends_as_wpa2() {
    let data = data_to_ds(AP, STA, true, 1, &wep_payload([1, 2, 3], 60));
    let rsn = beacon(AP, 0x11, &[&essid("corp"), RSN_CCMP_PSK]);

    let mut first = analyzer(AnalyzerConfig::default());
    first.process_frame(&data, &rx(0));
    let security = first.directory().ap(&MacAddress(AP)).expect("ap").security;
    assert!(security.contains(Security::STD_WEP | Security::ENC_WEP));
    first.process_frame(&rsn, &rx(10));

    let mut second = analyzer(AnalyzerConfig::default());
    second.process_frame(&rsn, &rx(0));
    second.process_frame(&data, &rx(10));

    for analyzer in [&first, &second] {
        let security = analyzer.directory().ap(&MacAddress(AP)).expect("ap").security;
        assert!(!security.intersects(Security::STD_WEP | Security::ENC_WEP), "{:?}", security);
        assert!(security.contains(Security::STD_WPA2 | Security::ENC_CCMP | Security::AUTH_PSK));
    }
}

#[test]
fn unique_ivs_are_exported_once() {
    let config = AnalyzerConfig {
        record_ivs: true,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = analyzer(config);
    let frame = data_to_ds(AP, STA, true, 1, &wep_payload([9, 8, 7], 60));
    analyzer.process_frame(&frame, &rx(0));
    analyzer.process_frame(&frame, &rx(5));

    let ap = analyzer.directory().ap(&MacAddress(AP)).expect("ap");
    assert_eq!(ap.ivs.as_ref().map(|ivs| ivs.len()), Some(1));
    assert_eq!(ap.data_frames, 1);
    assert_eq!(analyzer.sinks().ivs.len(), 1);
    assert_eq!(analyzer.sinks().ivs[0].iv, [9, 8, 7, 0]);
    assert!(analyzer.sinks().ivs[0].keystream.is_ptw());

    let other = data_to_ds(AP, STA, true, 2, &wep_payload([9, 8, 6], 60));
    analyzer.process_frame(&other, &rx(10));
    assert_eq!(analyzer.sinks().ivs.len(), 2);
    assert_eq!(analyzer.directory().ap(&MacAddress(AP)).expect("ap").data_frames, 2);
}

#[test]
fn wep_cloaking_is_flagged() {
    let config = AnalyzerConfig {
        detect_anomaly: true,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = analyzer(config);
    let honest = data_to_ds(AP, STA, true, 1, &wep_payload([4, 4, 4], 60));
    let mut forged = honest.clone();
    forged[28] ^= 0xFF;

    analyzer.process_frame(&honest, &rx(0));
    analyzer.process_frame(&honest, &rx(1));
    assert!(analyzer.sinks().events.is_empty());
    analyzer.process_frame(&forged, &rx(2));
    assert_eq!(analyzer.sinks().events, vec![NotableEvent::WepCloaking(MacAddress(AP))]);
}

#[test]
fn decloak_detects_padded_retransmission() {
    let config = AnalyzerConfig {
        decloak: true,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = analyzer(config);
    let payload: Vec<u8> = (1..=64).collect();
    let original = data_from_ds(AP, STA, 1, &payload);
    let mut padded = original.clone();
    padded.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    analyzer.process_frame(&original, &rx(0));
    assert!(analyzer.sinks().events.is_empty());
    analyzer.process_frame(&padded, &rx(100));

    let ap = analyzer.directory().ap(&MacAddress(AP)).expect("ap");
    assert!(ap.decloak.detected);
    assert!(!ap.decloak.armed);
    assert!(ap.decloak.ring.is_empty());
    assert_eq!(analyzer.last_message(), Some(&NotableEvent::Decloak(MacAddress(AP))));
    assert_eq!(analyzer.last_message().map(|m| m.to_string()).as_deref(), Some("Decloak: 00:11:22:33:44:55"));
}

#[test]
fn control_frames_create_unidentified_nodes() {
    let mut analyzer = analyzer(AnalyzerConfig::default());
    analyzer.process_frame(&data_to_ds(AP, STA, false, 1, &[0xAB; 40]), &rx(0));

    // RTS from a known station to an unknown receiver
    analyzer.process_frame(&control(0xB4, OTHER, Some(STA)), &rx(1));
    analyzer.process_frame(&control(0xD4, OTHER, None), &rx(2));
    analyzer.process_frame(&control(0xC4, [0xFF; 6], None), &rx(3));

    let nodes = analyzer.directory().unidentified();
    assert_eq!(nodes.len(), 1);
    let node = nodes.get(&MacAddress(OTHER)).expect("node");
    assert_eq!(node.counters.rts_received, 1);
    assert_eq!(node.counters.ack, 1);
    assert_eq!(node.power, Some(-45));
    assert!(analyzer.directory().node(&MacAddress(STA)).is_none());
    assert_eq!(analyzer.stats().control_frames, 3);

    // the node later talks to the AP and becomes a station
    analyzer.process_frame(&data_to_ds(AP, OTHER, false, 2, &[0xAB; 40]), &rx(4));
    assert!(analyzer.directory().node(&MacAddress(OTHER)).is_none());
    assert!(analyzer.directory().station(&MacAddress(OTHER)).is_some());
    assert!(analyzer.directory().is_disjoint());
}

#[test]
fn station_mac_seen_as_bssid_is_promoted() {
    let mut analyzer = analyzer(AnalyzerConfig::default());
    analyzer.process_frame(&data_to_ds(AP, STA, false, 1, &[0xAB; 40]), &rx(0));
    assert!(analyzer.directory().station(&MacAddress(STA)).is_some());

    analyzer.process_frame(&beacon(STA, 0x01, &[&essid("mesh")]), &rx(10));
    assert!(analyzer.directory().station(&MacAddress(STA)).is_none());
    assert!(analyzer.directory().ap(&MacAddress(STA)).is_some());
    assert!(analyzer.directory().is_disjoint());
}

#[test]
fn probe_request_keeps_station_unassociated() {
    let mut analyzer = analyzer(AnalyzerConfig::default());
    let mut probe = vec![0x40, 0x00, 0x00, 0x00];
    probe.extend_from_slice(&[0xFF; 6]);
    probe.extend_from_slice(&STA);
    probe.extend_from_slice(&[0xFF; 6]);
    probe.extend_from_slice(&[0x10, 0x00]);
    probe.extend_from_slice(&essid("home"));

    analyzer.process_frame(&probe, &rx(0));
    assert!(analyzer.directory().access_points().is_empty());
    let station = analyzer.directory().station(&MacAddress(STA)).expect("station");
    assert_eq!(station.ap, Some(MacAddress::BROADCAST));
    assert!(!station.is_associated());
    assert!(station.probes.contains(b"home"));

    analyzer.process_frame(&data_to_ds(AP, STA, false, 2, &[0xAB; 40]), &rx(5));
    let station = analyzer.directory().station(&MacAddress(STA)).expect("station");
    assert_eq!(station.ap, Some(MacAddress(AP)));

    // broadcast never overrides a real association
    analyzer.process_frame(&probe, &rx(6));
    let station = analyzer.directory().station(&MacAddress(STA)).expect("station");
    assert_eq!(station.ap, Some(MacAddress(AP)));
}

#[test]
fn filters_suppress_raw_frames() {
    let config = AnalyzerConfig {
        encryption: Some("wpa2".into()),
        ..AnalyzerConfig::default()
    };
    let mut strict = analyzer(config);
    strict.process_frame(&beacon(AP, 0x01, &[&essid("open")]), &rx(0));
    strict.process_frame(&beacon(OTHER, 0x11, &[&essid("secure"), RSN_CCMP_PSK]), &rx(1));
    assert_eq!(strict.directory().access_points().len(), 2);
    assert_eq!(strict.sinks().raw_frames.len(), 1);

    let config = AnalyzerConfig {
        one_beacon: true,
        essids: vec!["secure".into()],
        ..AnalyzerConfig::default()
    };
    let mut single = analyzer(config);
    let frame = beacon(OTHER, 0x11, &[&essid("secure"), RSN_CCMP_PSK]);
    single.process_frame(&frame, &rx(0));
    single.process_frame(&frame, &rx(100));
    single.process_frame(&beacon(AP, 0x01, &[&essid("open")]), &rx(200));
    assert_eq!(single.sinks().raw_frames.len(), 1);
    assert_eq!(single.directory().access_points().len(), 2);
}

#[test]
fn aging_removes_ap_and_its_stations() {
    let max_age = Duration::from_secs(60);
    let config = AnalyzerConfig {
        max_age,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = analyzer(config);
    analyzer.process_frame(&beacon(AP, 0x01, &[&essid("old")]), &rx(0));
    analyzer.process_frame(&data_to_ds(AP, STA, false, 1, &[0xAB; 40]), &rx(0));

    let now = at(120_000);
    let directory = analyzer.directory_mut();
    directory.ap_mut(&MacAddress(AP)).expect("ap").last_seen = now - max_age - Duration::from_secs(1);
    directory.station_mut(&MacAddress(STA)).expect("station").last_seen = now;

    let report = directory.purge_older_than(now, max_age);
    assert_eq!(report.access_points, vec![MacAddress(AP)]);
    assert_eq!(report.stations, vec![MacAddress(STA)]);
    assert!(directory.ap(&MacAddress(AP)).is_none());
    assert!(directory.station(&MacAddress(STA)).is_none());
}

#[test]
fn lan_address_from_arp() {
    let mut payload = vec![0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x08, 0x06];
    payload.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    payload.extend_from_slice(&STA);
    payload.extend_from_slice(&[10, 1, 2, 3]);
    payload.extend_from_slice(&[0; 10]);

    let mut analyzer = analyzer(AnalyzerConfig::default());
    analyzer.process_frame(&data_from_ds(AP, STA, 1, &payload), &rx(0));
    let ap = analyzer.directory().ap(&MacAddress(AP)).expect("ap");
    assert_eq!(ap.lan_ip, Some(std::net::Ipv4Addr::new(10, 1, 2, 3)));
}
