mod common;

use common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustydump_wireless::{AnalyzerConfig, MacAddress};

const HT_CAPABILITIES: &[u8] = &[
    0x2d, 0x1a, 0x6f, 0x00, 0x17, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const HT_OPERATION: &[u8] = &[0x3d, 0x16, 0x24, 0x05, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
const VHT_CAPABILITIES: &[u8] = &[0xbf, 0x0c, 0x32, 0x00, 0x80, 0x03, 0xfa, 0xff, 0xfa, 0xff, 0x00, 0x00, 0x00, 0x00];
const VHT_OPERATION: &[u8] = &[0xc0, 0x05, 0x01, 0x2a, 0x00, 0x00, 0x00];
const WPS: &[u8] = &[
    0xdd, 0x0e, 0x00, 0x50, 0xf2, 0x04, 0x10, 0x4a, 0x00, 0x01, 0x10, 0x10, 0x44, 0x00, 0x01, 0x02,
];
const WPA_TKIP: &[u8] = &[
    0xdd, 0x16, 0x00, 0x50, 0xf2, 0x01, 0x01, 0x00, 0x00, 0x50, 0xf2, 0x02, 0x01, 0x00, 0x00, 0x50,
    0xf2, 0x02, 0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
];

fn corpus() -> Vec<Vec<u8>> {
    let mut frames = vec![
        beacon(
            AP,
            0x31,
            &[
                &essid("robust"),
                &[0x01, 0x08, 0x82, 0x84, 0x8b, 0x96, 0x0c, 0x12, 0x18, 0x24],
                &[0x03, 0x01, 0x24],
                HT_CAPABILITIES,
                HT_OPERATION,
                VHT_CAPABILITIES,
                VHT_OPERATION,
                RSN_CCMP_PSK,
                WPA_TKIP,
                WPS,
            ],
        ),
        data_to_ds(AP, STA, true, 3, &wep_payload([1, 2, 3], 60)),
        data_to_ds(AP, STA, true, 4, &wep_payload([1, 2, 4], 28)),
        data_from_ds(AP, STA, 5, &eapol_payload(&eapol_m1_with_pmkid([0x11; 32], [0x22; 16]))),
        data_to_ds(AP, STA, false, 6, &eapol_payload(&eapol_key(0x010A, [0x33; 32], [0x44; 16]))),
        data_from_ds(AP, STA, 7, &eapol_payload(&eapol_key(0x13CA, [0x11; 32], [0x55; 16]))),
        control(0xB4, OTHER, Some(STA)),
        control(0xD4, OTHER, None),
    ];

    // QoS data
    let mut qos = data_to_ds(AP, STA, false, 8, &[0x00, 0x00]);
    qos[0] = 0x88;
    qos.extend_from_slice(&eapol_payload(&eapol_key(0x010A, [0x33; 32], [0x44; 16])));
    frames.push(qos);

    // four-address frame
    let mut wds = vec![0x08, 0x03, 0x00, 0x00];
    wds.extend_from_slice(&OTHER);
    wds.extend_from_slice(&AP);
    wds.extend_from_slice(&STA);
    wds.extend_from_slice(&[0x20, 0x00]);
    wds.extend_from_slice(&OTHER);
    wds.extend_from_slice(&[0xAA; 40]);
    frames.push(wds);

    // association request and shared-key authentication response
    let mut assoc = vec![0x00, 0x00, 0x00, 0x00];
    assoc.extend_from_slice(&AP);
    assoc.extend_from_slice(&STA);
    assoc.extend_from_slice(&AP);
    assoc.extend_from_slice(&[0x30, 0x00, 0x31, 0x04, 0x0a, 0x00]);
    assoc.extend_from_slice(&essid("robust"));
    frames.push(assoc);

    let mut auth = vec![0xb0, 0x00, 0x00, 0x00];
    auth.extend_from_slice(&STA);
    auth.extend_from_slice(&AP);
    auth.extend_from_slice(&AP);
    auth.extend_from_slice(&[0x40, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00]);
    auth.extend_from_slice(&[0x10, 0x80]);
    auth.extend_from_slice(&[0x5A; 128]);
    frames.push(auth);

    let mut probe = vec![0x40, 0x00, 0x00, 0x00];
    probe.extend_from_slice(&[0xFF; 6]);
    probe.extend_from_slice(&STA);
    probe.extend_from_slice(&[0xFF; 6]);
    probe.extend_from_slice(&[0x50, 0x00]);
    probe.extend_from_slice(&essid("robust"));
    probe.extend_from_slice(&[0x01, 0x04, 0x02, 0x04, 0x0b, 0x16]);
    frames.push(probe);

    frames
}

#[test]
fn every_truncation_is_handled() {
    let config = AnalyzerConfig {
        record_ivs: true,
        decloak: true,
        ..AnalyzerConfig::default()
    };
    let mut shared = analyzer(config.clone());
    let mut tick = 0u64;

    for frame in corpus() {
        for cut in 0..=frame.len() {
            let truncated = &frame[..cut];
            let mut fresh = analyzer(config.clone());
            fresh.process_frame(truncated, &rx(tick));
            assert!(fresh.directory().is_disjoint());

            shared.process_frame(truncated, &rx(tick));
            shared.tick(at(tick));
            tick += 7;
        }
        assert!(shared.directory().is_disjoint());
    }

    // the complete beacon was eventually parsed in full
    let ap = shared.directory().ap(&MacAddress(AP)).expect("ap");
    assert_eq!(ap.essid, b"robust");
}

#[test]
fn detection_without_iv_recording() {
    let config = AnalyzerConfig {
        detect_anomaly: true,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = analyzer(config);
    for frame in corpus() {
        for cut in (0..=frame.len()).rev() {
            analyzer.process_frame(&frame[..cut], &rx(cut as u64));
        }
    }
    assert!(analyzer.directory().is_disjoint());
}

#[test]
fn random_traffic_keeps_collections_disjoint() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let pool: Vec<[u8; 6]> = (0..8u8).map(|i| [0x02, 0x00, 0x00, 0x00, 0x00, i]).collect();
    let mut analyzer = analyzer(AnalyzerConfig::default());

    for step in 0..2_000u64 {
        let a = pool[rng.gen_range(0..pool.len())];
        let b = pool[rng.gen_range(0..pool.len())];
        let frame = match rng.gen_range(0..6) {
            0 => beacon(a, 0x01, &[&essid("x")]),
            1 => data_to_ds(a, b, false, step as u16, &[0xAB; 32]),
            2 => data_from_ds(a, b, step as u16, &[0xAB; 32]),
            3 => control(0xB4, a, Some(b)),
            4 => control(0xD4, a, None),
            _ => {
                let mut f = vec![0x40, 0x00, 0x00, 0x00];
                f.extend_from_slice(&[0xFF; 6]);
                f.extend_from_slice(&a);
                f.extend_from_slice(&[0xFF; 6]);
                f.extend_from_slice(&[0x00, 0x00]);
                f
            }
        };
        analyzer.process_frame(&frame, &rx(step));
        assert!(analyzer.directory().is_disjoint(), "overlap after step {}", step);
    }
}
