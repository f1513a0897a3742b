#![allow(dead_code)]

use std::time::{Duration, SystemTime};

use rustydump_wireless::{Analyzer, AnalyzerConfig, MemorySink, RxInfo};

pub const AP: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const STA: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB];
pub const OTHER: [u8; 6] = [0x00, 0xC0, 0xFF, 0xEE, 0x00, 0x01];

pub const RSN_CCMP_PSK: &[u8] = &[
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00,
    0x00, 0x0f, 0xac, 0x02, 0x00, 0x00,
];

pub fn at(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
}

pub fn rx(ms: u64) -> RxInfo {
    RxInfo::new(at(ms)).with_power(-45).with_channel(6).with_rate(24_000_000)
}

pub fn analyzer(config: AnalyzerConfig) -> Analyzer<MemorySink> {
    Analyzer::new(config, MemorySink::new()).expect("valid config")
}

fn header(fc0: u8, fc1: u8, a1: [u8; 6], a2: [u8; 6], a3: [u8; 6], seq: u16) -> Vec<u8> {
    let mut f = vec![fc0, fc1, 0x00, 0x00];
    f.extend_from_slice(&a1);
    f.extend_from_slice(&a2);
    f.extend_from_slice(&a3);
    f.extend_from_slice(&(seq << 4).to_le_bytes());
    f
}

/// Beacon from `bssid` with the given capability byte and elements.
pub fn beacon(bssid: [u8; 6], capability: u8, elements: &[&[u8]]) -> Vec<u8> {
    let mut f = header(0x80, 0x00, [0xFF; 6], bssid, bssid, 1);
    f.extend_from_slice(&5_000_000u64.to_le_bytes());
    f.extend_from_slice(&[0x64, 0x00, capability, 0x00]);
    for element in elements {
        f.extend_from_slice(element);
    }
    f
}

pub fn essid(name: &str) -> Vec<u8> {
    let mut element = vec![0x00, name.len() as u8];
    element.extend_from_slice(name.as_bytes());
    element
}

/// Station to AP data frame.
pub fn data_to_ds(bssid: [u8; 6], station: [u8; 6], protected: bool, seq: u16, payload: &[u8]) -> Vec<u8> {
    let fc1 = if protected { 0x41 } else { 0x01 };
    let mut f = header(0x08, fc1, bssid, station, [0xFF; 6], seq);
    f.extend_from_slice(payload);
    f
}

/// AP to station data frame.
pub fn data_from_ds(bssid: [u8; 6], station: [u8; 6], seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut f = header(0x08, 0x02, station, bssid, bssid, seq);
    f.extend_from_slice(payload);
    f
}

/// EAPOL-Key body (from the EAPOL header), 99 bytes, no key data.
pub fn eapol_key(key_info: u16, nonce: [u8; 32], mic: [u8; 16]) -> Vec<u8> {
    let mut f = vec![0u8; 99];
    f[0] = 0x02;
    f[1] = 0x03;
    f[2..4].copy_from_slice(&95u16.to_be_bytes());
    f[4] = 0x02;
    f[5..7].copy_from_slice(&key_info.to_be_bytes());
    f[17..49].copy_from_slice(&nonce);
    f[81..97].copy_from_slice(&mic);
    f
}

/// Message 1 carrying a PMKID KDE.
pub fn eapol_m1_with_pmkid(nonce: [u8; 32], pmkid: [u8; 16]) -> Vec<u8> {
    let mut f = eapol_key(0x008A, nonce, [0; 16]);
    f[2..4].copy_from_slice(&117u16.to_be_bytes());
    f[97..99].copy_from_slice(&22u16.to_be_bytes());
    f.extend_from_slice(&[0xdd, 0x14, 0x00, 0x0f, 0xac, 0x04]);
    f.extend_from_slice(&pmkid);
    f
}

/// LLC/SNAP + EAPOL payload.
pub fn eapol_payload(eapol: &[u8]) -> Vec<u8> {
    let mut payload = vec![0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E];
    payload.extend_from_slice(eapol);
    payload
}

/// WEP payload: IV, key index 0, then `body_len` bytes of ciphertext.
pub fn wep_payload(iv: [u8; 3], body_len: usize) -> Vec<u8> {
    let mut payload = vec![iv[0], iv[1], iv[2], 0x00];
    payload.extend((0..body_len).map(|i| (i as u8).wrapping_mul(13).wrapping_add(iv[2])));
    payload
}

/// Control frame of the given first byte with one or two addresses.
pub fn control(fc0: u8, ra: [u8; 6], ta: Option<[u8; 6]>) -> Vec<u8> {
    let mut f = vec![fc0, 0x00, 0x00, 0x00];
    f.extend_from_slice(&ra);
    if let Some(ta) = ta {
        f.extend_from_slice(&ta);
    }
    f
}
