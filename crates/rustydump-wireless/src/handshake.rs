//! WPA/WPA2 4-way handshake tracking and PMKID extraction
//!
//! Each station carries a [`WpaHandshake`] that accumulates nonces, the MIC
//! and the EAPOL body as messages are observed. Offsets are relative to the
//! start of the EAPOL header (version byte).

use serde::Serialize;

use crate::frames::MacAddress;
use rustydump_wpa::{HandshakeExport, MessagePair, PmkidExport};

/// EAPOL Ethertype (0x888E)
pub const EAPOL_ETHER_TYPE: [u8; 2] = [0x88, 0x8E];

/// Capacity of the stored EAPOL body.
pub const EAPOL_MAX_LEN: usize = 256;

const NONCE_OFFSET: usize = 17;
const MIC_OFFSET: usize = 81;
const KEY_DATA_OFFSET: usize = 99;
const MIN_BODY_LEN: usize = MIC_OFFSET + 16;

/// WPA Key Information flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    raw: u16,
}

impl KeyInfo {
    /// Parse from raw u16
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }

    /// Key information field of an EAPOL-Key frame (bytes 5-6, big endian)
    pub fn from_eapol(eapol: &[u8]) -> Option<Self> {
        let bytes = eapol.get(5..7)?;
        Some(Self::new(u16::from_be_bytes([bytes[0], bytes[1]])))
    }

    /// Key descriptor version (1=WPA, 2=WPA2)
    pub fn descriptor_version(&self) -> u8 {
        (self.raw & 0x0007) as u8
    }

    /// Pairwise key (true) or Group key (false)
    pub fn is_pairwise(&self) -> bool {
        (self.raw & 0x0008) != 0
    }

    /// Install flag
    pub fn install(&self) -> bool {
        (self.raw & 0x0040) != 0
    }

    /// ACK flag (set by AP in messages 1 and 3)
    pub fn ack(&self) -> bool {
        (self.raw & 0x0080) != 0
    }

    /// MIC flag (set when MIC is present)
    pub fn mic(&self) -> bool {
        (self.raw & 0x0100) != 0
    }
}

/// The three legal pairwise message shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EapolMessage {
    /// Pairwise, Ack: AP to station, carries the ANonce
    One,
    /// Pairwise, MIC: station to AP, carries the SNonce (zero in message 4)
    TwoOrFour,
    /// Pairwise, Install, Ack, MIC: AP to station
    Three,
}

impl EapolMessage {
    /// Classify by the (Pairwise, Install, Ack, MIC) tuple.
    pub fn classify(info: KeyInfo) -> Option<Self> {
        match (info.is_pairwise(), info.install(), info.ack(), info.mic()) {
            (true, false, true, false) => Some(Self::One),
            (true, false, false, true) => Some(Self::TwoOrFour),
            (true, true, true, true) => Some(Self::Three),
            _ => None,
        }
    }
}

/// Accumulated handshake material, as a 3-bit mask.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HandshakeProgress(u8);

impl HandshakeProgress {
    pub const EMPTY: HandshakeProgress = HandshakeProgress(0);
    pub const ANONCE: HandshakeProgress = HandshakeProgress(1);
    pub const SNONCE: HandshakeProgress = HandshakeProgress(2);
    pub const MIC_CAPTURED: HandshakeProgress = HandshakeProgress(4);
    pub const COMPLETE: HandshakeProgress = HandshakeProgress(7);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: HandshakeProgress) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: HandshakeProgress) {
        self.0 |= other.0;
    }

    pub fn is_complete(&self) -> bool {
        *self == Self::COMPLETE
    }
}

impl std::ops::BitOr for HandshakeProgress {
    type Output = HandshakeProgress;

    fn bitor(self, rhs: HandshakeProgress) -> HandshakeProgress {
        HandshakeProgress(self.0 | rhs.0)
    }
}

impl std::fmt::Debug for HandshakeProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandshakeProgress({:03b})", self.0)
    }
}

/// Something worth reporting after an EAPOL frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    PmkidFound,
    Completed,
}

/// Per-station handshake capture record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WpaHandshake {
    pub progress: HandshakeProgress,
    #[serde(skip)]
    pub anonce: [u8; 32],
    #[serde(skip)]
    pub snonce: [u8; 32],
    #[serde(skip)]
    pub keymic: [u8; 16],
    /// EAPOL body with the MIC field zeroed
    #[serde(skip)]
    pub eapol: Vec<u8>,
    pub key_version: u8,
    #[serde(skip)]
    pub pmkid: Option<[u8; 16]>,
    anonce_from: Option<EapolMessage>,
    eapol_from: Option<EapolMessage>,
    #[serde(skip)]
    reported: bool,
}

impl WpaHandshake {
    /// Forget the current exchange (e.g. on a new association).
    pub fn reset(&mut self) {
        self.progress = HandshakeProgress::EMPTY;
        self.reported = false;
    }

    /// Apply one EAPOL frame. `eapol` starts at the EAPOL header and ends at
    /// the capture length.
    pub fn process(&mut self, eapol: &[u8]) -> Option<HandshakeEvent> {
        let info = KeyInfo::from_eapol(eapol)?;
        let message = EapolMessage::classify(info);

        if message == Some(EapolMessage::One) {
            let nonce: [u8; 32] = read_array(eapol, NONCE_OFFSET)?;
            if !self.progress.contains(HandshakeProgress::ANONCE) || nonce != self.anonce {
                self.progress = HandshakeProgress::EMPTY;
                self.reported = false;
            }
            self.anonce = nonce;
            self.anonce_from = Some(EapolMessage::One);
            self.progress.insert(HandshakeProgress::ANONCE);

            if let Some(pmkid) = find_pmkid(eapol) {
                self.key_version = info.descriptor_version();
                if self.pmkid == Some(pmkid) {
                    return None;
                }
                self.pmkid = Some(pmkid);
                return Some(HandshakeEvent::PmkidFound);
            }
        }

        if eapol.len() < NONCE_OFFSET + 32 {
            return None;
        }
        let nonce: [u8; 32] = read_array(eapol, NONCE_OFFSET)?;

        match message {
            Some(EapolMessage::TwoOrFour) => {
                if nonce != [0u8; 32] {
                    self.snonce = nonce;
                    self.progress.insert(HandshakeProgress::SNONCE);
                }
                if !self.progress.contains(HandshakeProgress::MIC_CAPTURED) {
                    self.capture_body(eapol, info, EapolMessage::TwoOrFour)?;
                }
            }
            Some(EapolMessage::Three) => {
                if nonce != [0u8; 32] {
                    self.anonce = nonce;
                    self.anonce_from = Some(EapolMessage::Three);
                    self.progress.insert(HandshakeProgress::ANONCE);
                }
                if !self.progress.contains(HandshakeProgress::MIC_CAPTURED) {
                    self.capture_body(eapol, info, EapolMessage::Three)?;
                }
            }
            _ => {}
        }

        if self.progress.is_complete() && !self.reported {
            self.reported = true;
            return Some(HandshakeEvent::Completed);
        }
        None
    }

    fn capture_body(&mut self, eapol: &[u8], info: KeyInfo, from: EapolMessage) -> Option<()> {
        let declared = ((*eapol.get(2)? as usize) << 8) + *eapol.get(3)? as usize + 4;
        let limit = match from {
            EapolMessage::Three => EAPOL_MAX_LEN - 16 - 1,
            _ => EAPOL_MAX_LEN,
        };
        if declared > eapol.len() || eapol.len() < MIN_BODY_LEN || declared > limit {
            tracing::debug!(target: "crypto", declared, captured = eapol.len(), "eapol_length_rejected");
            return None;
        }

        self.keymic = read_array(eapol, MIC_OFFSET)?;
        let mut body = eapol[..declared].to_vec();
        let mic_end = (MIC_OFFSET + 16).min(body.len());
        if MIC_OFFSET < mic_end {
            body[MIC_OFFSET..mic_end].fill(0);
        }
        self.eapol = body;
        self.key_version = info.descriptor_version();
        self.eapol_from = Some(from);
        self.progress.insert(HandshakeProgress::MIC_CAPTURED);
        Some(())
    }

    /// Export record for a completed exchange.
    pub fn export(&self, bssid: MacAddress, station: MacAddress, essid: &[u8]) -> Option<HandshakeExport> {
        if !self.progress.is_complete() {
            return None;
        }
        let (nonce, message_pair) = match self.eapol_from? {
            EapolMessage::Three => (self.snonce, MessagePair::M2M3),
            _ if self.anonce_from == Some(EapolMessage::Three) => {
                (self.anonce, MessagePair::M2M3Authorized)
            }
            _ => (self.anonce, MessagePair::M1M2),
        };
        Some(HandshakeExport {
            bssid: bssid.0,
            client_mac: station.0,
            essid: essid.to_vec(),
            nonce,
            mic: self.keymic,
            eapol_data: self.eapol.clone(),
            key_version: self.key_version,
            message_pair,
        })
    }

    pub fn pmkid_export(&self, bssid: MacAddress, station: MacAddress, essid: &[u8]) -> Option<PmkidExport> {
        Some(PmkidExport {
            bssid: bssid.0,
            client_mac: station.0,
            essid: essid.to_vec(),
            pmkid: self.pmkid?,
            key_version: self.key_version,
        })
    }
}

/// PMKID KDE in the key data of message 1: dd <len> 00-0f-ac 04 <pmkid>.
fn find_pmkid(eapol: &[u8]) -> Option<[u8; 16]> {
    let kde = eapol.get(KEY_DATA_OFFSET..KEY_DATA_OFFSET + 6)?;
    if kde[0] != 0xdd || kde[2..5] != [0x00, 0x0f, 0xac] || kde[5] != 0x04 {
        return None;
    }
    read_array(eapol, KEY_DATA_OFFSET + 6)
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    buf.get(offset..offset + N)?.try_into().ok()
}
