//! WEP IV uniqueness, cloaking anomaly detection and known-cleartext
//! keystream recovery

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::frames::{self, DsMode, MacAddress};

/// Longest payload considered for keystream recovery
pub const MAX_CLEAR_LEN: usize = 2048;

const LLC_SNAP_ARP: [u8; 8] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x08, 0x06];
const LLC_SNAP_IP: [u8; 8] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00];
const ARP_FIXED: [u8; 6] = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04];

/// Every IV+key-index field seen for one access point.
#[derive(Debug, Clone, Default)]
pub struct IvSet {
    seen: HashSet<[u8; 4]>,
}

impl IvSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, iv: &[u8; 4]) -> bool {
        self.seen.contains(iv)
    }

    /// Insert an IV. Returns true the first time it is seen.
    pub fn insert(&mut self, iv: [u8; 4]) -> bool {
        self.seen.insert(iv)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Outcome of comparing a WEP frame against earlier frames with the same IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloakCheck {
    FirstSeen,
    Consistent,
    /// Same IV, different ciphertext for the constant LLC header
    Cloaking,
}

/// First two ciphertext bytes per IV. The plaintext there is always the
/// LLC `AA AA`, so an honest AP produces the same bytes for the same IV.
#[derive(Debug, Clone, Default)]
pub struct CloakTracker {
    first_bytes: HashMap<[u8; 3], [u8; 2]>,
}

impl CloakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, iv: [u8; 3], ciphertext: [u8; 2]) -> CloakCheck {
        match self.first_bytes.get(&iv) {
            None => {
                self.first_bytes.insert(iv, ciphertext);
                CloakCheck::FirstSeen
            }
            Some(stored) if *stored == ciphertext => CloakCheck::Consistent,
            Some(_) => CloakCheck::Cloaking,
        }
    }

    pub fn len(&self) -> usize {
        self.first_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_bytes.is_empty()
    }
}

/// Keystream recovered from a guessed plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Keystream {
    /// One candidate (ARP)
    Xor(Vec<u8>),
    /// Several weighted candidates of `clen` bytes each (IPv4)
    Ptw {
        clen: u8,
        streams: Vec<[u8; 32]>,
        weights: [i32; 16],
    },
}

impl Keystream {
    /// Export record body.
    ///
    /// PTW layout: candidate count, candidate length, 32 bytes per
    /// candidate, then 16 little-endian i32 weights.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Xor(bytes) => bytes.clone(),
            Self::Ptw {
                clen,
                streams,
                weights,
            } => {
                let mut out = Vec::with_capacity(2 + 32 * streams.len() + 64);
                out.push(streams.len() as u8);
                out.push(*clen);
                for stream in streams {
                    out.extend_from_slice(stream);
                }
                for weight in weights {
                    out.extend_from_slice(&weight.to_le_bytes());
                }
                out
            }
        }
    }

    pub fn is_ptw(&self) -> bool {
        matches!(self, Self::Ptw { .. })
    }
}

/// IV sink record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IvRecord {
    pub bssid: MacAddress,
    pub iv: [u8; 4],
    pub keystream: Keystream,
}

/// Recover keystream bytes from a WEP data frame using the predictable
/// start of ARP or IPv4 payloads. `z` is the offset of the IV.
pub fn known_clear(frame: &[u8], ds: DsMode, z: usize) -> Option<Keystream> {
    // payload length without IV and ICV
    let dlen = frame.len().checked_sub(z + 8)?.min(MAX_CLEAR_LEN);
    let cipher = frame.get(z + 4..z + 4 + dlen)?;

    if dlen == 36 || dlen == 54 {
        let dest = frames::destination(frame, ds)?;
        let src = frames::source(frame, ds)?;

        let mut clear = Vec::with_capacity(22);
        clear.extend_from_slice(&LLC_SNAP_ARP);
        clear.extend_from_slice(&ARP_FIXED);
        // requests go to broadcast
        let opcode: [u8; 2] = if dest.is_broadcast() { [0x00, 0x01] } else { [0x00, 0x02] };
        clear.extend_from_slice(&opcode);
        clear.extend_from_slice(src.as_bytes());

        let stream = xor(&clear, cipher)?;
        return Some(Keystream::Xor(stream));
    }

    let ip_len = u16::try_from(dlen.checked_sub(8)?).ok()?.to_be_bytes();
    let mut first = Vec::with_capacity(16);
    first.extend_from_slice(&LLC_SNAP_IP);
    first.extend_from_slice(&[0x45, 0x00, ip_len[0], ip_len[1]]);
    // the IP identification is unknown and stays zero
    first.extend_from_slice(&[0x00, 0x00]);
    // don't fragment is the common case
    first.extend_from_slice(&[0x40, 0x00]);

    let mut second = first.clone();
    second[14] = 0x00;

    let clen = first.len();
    let mut streams = Vec::with_capacity(2);
    for clear in [&first, &second] {
        let mut stream = [0u8; 32];
        stream[..clen].copy_from_slice(&xor(clear, cipher)?);
        streams.push(stream);
    }
    let mut weights = [0i32; 16];
    weights[0] = 220;
    weights[1] = 36;

    Some(Keystream::Ptw {
        clen: clen as u8,
        streams,
        weights,
    })
}

fn xor(clear: &[u8], cipher: &[u8]) -> Option<Vec<u8>> {
    let cipher = cipher.get(..clear.len())?;
    Some(clear.iter().zip(cipher).map(|(p, c)| p ^ c).collect())
}
