//! Radiotap header handling and per-frame radio metadata
//!
//! Radiotap is the de-facto standard header prepended to 802.11 frames
//! captured in monitor mode. [`decode`] turns a radiotap-prefixed capture
//! record into an [`RxInfo`] and the bare 802.11 frame.

use std::time::SystemTime;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::rates::ht_rate;

/// Radio metadata delivered with every frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RxInfo {
    /// Capture time
    pub timestamp: SystemTime,
    /// Signal strength in dBm
    pub power: Option<i32>,
    /// Noise in dBm
    pub noise: Option<i32>,
    /// Channel number (derived from frequency)
    pub channel: Option<u8>,
    /// Channel frequency in MHz
    pub frequency: Option<u16>,
    /// PHY rate in bits per second, 0 if unknown
    pub rate: u32,
    /// Antenna index
    pub antenna: Option<u8>,
    /// Radio timestamp in microseconds
    pub tsft: Option<u64>,
    /// Index of the capturing interface
    pub card: usize,
}

impl RxInfo {
    pub fn new(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            power: None,
            noise: None,
            channel: None,
            frequency: None,
            rate: 0,
            antenna: None,
            tsft: None,
            card: 0,
        }
    }

    pub fn with_power(mut self, dbm: i32) -> Self {
        self.power = Some(dbm);
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self.frequency = channel_to_frequency(channel);
        self
    }

    pub fn with_rate(mut self, bps: u32) -> Self {
        self.rate = bps;
        self
    }
}

/// Radiotap present flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RadiotapField {
    /// TSFT (timestamp)
    Tsft = 0,
    /// Flags
    Flags = 1,
    /// Data rate
    Rate = 2,
    /// Channel frequency and flags
    Channel = 3,
    /// FHSS hop set and pattern
    Fhss = 4,
    /// dBm antenna signal
    AntennaSignal = 5,
    /// dBm antenna noise
    AntennaNoise = 6,
    /// Lock quality
    LockQuality = 7,
    /// TX attenuation
    TxAttenuation = 8,
    /// TX attenuation (dB)
    TxAttenuationDb = 9,
    /// TX power (dBm)
    TxPower = 10,
    /// Antenna index
    Antenna = 11,
    /// dB antenna signal
    AntennaSignalDb = 12,
    /// dB antenna noise
    AntennaNoiseDb = 13,
    /// RX flags
    RxFlags = 14,
    /// TX flags
    TxFlags = 15,
    /// RTS retries
    RtsRetries = 16,
    /// Data retries
    DataRetries = 17,
    /// Extended channel
    XChannel = 18,
    /// MCS (802.11n)
    Mcs = 19,
    /// A-MPDU status
    Ampdu = 20,
    /// VHT (802.11ac)
    Vht = 21,
}

impl RadiotapField {
    const ALL: [RadiotapField; 22] = [
        Self::Tsft,
        Self::Flags,
        Self::Rate,
        Self::Channel,
        Self::Fhss,
        Self::AntennaSignal,
        Self::AntennaNoise,
        Self::LockQuality,
        Self::TxAttenuation,
        Self::TxAttenuationDb,
        Self::TxPower,
        Self::Antenna,
        Self::AntennaSignalDb,
        Self::AntennaNoiseDb,
        Self::RxFlags,
        Self::TxFlags,
        Self::RtsRetries,
        Self::DataRetries,
        Self::XChannel,
        Self::Mcs,
        Self::Ampdu,
        Self::Vht,
    ];

    fn bit(self) -> u32 {
        1 << self as u32
    }

    /// (alignment, size) of the field
    fn layout(self) -> (usize, usize) {
        match self {
            Self::Tsft => (8, 8),
            Self::Flags | Self::Rate => (1, 1),
            Self::Channel => (2, 4),
            Self::Fhss => (1, 2),
            Self::AntennaSignal | Self::AntennaNoise => (1, 1),
            Self::LockQuality | Self::TxAttenuation | Self::TxAttenuationDb => (2, 2),
            Self::TxPower | Self::Antenna | Self::AntennaSignalDb | Self::AntennaNoiseDb => (1, 1),
            Self::RxFlags | Self::TxFlags => (2, 2),
            Self::RtsRetries | Self::DataRetries => (1, 1),
            Self::XChannel => (4, 8),
            Self::Mcs => (1, 3),
            Self::Ampdu => (4, 8),
            Self::Vht => (2, 12),
        }
    }
}

/// Flags field: frame includes FCS
const FLAG_FCS_AT_END: u8 = 0x10;
/// Flags field: frame failed FCS check
const FLAG_BAD_FCS: u8 = 0x40;
/// Present word continues in the next word
const PRESENT_EXT: u32 = 1 << 31;

/// Outcome of decoding a radiotap record.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<'a> {
    pub rx: RxInfo,
    pub frame: &'a [u8],
    /// The driver flagged a bad FCS
    pub bad_fcs: bool,
}

/// Decode a radiotap-prefixed capture record.
///
/// Returns `None` if the header is malformed or longer than the record.
pub fn decode(record: &[u8], timestamp: SystemTime) -> Option<Decoded<'_>> {
    if record.len() < 8 || record[0] != 0 {
        return None;
    }
    let header_len = usize::from(LittleEndian::read_u16(&record[2..4]));
    if header_len < 8 || header_len > record.len() {
        return None;
    }
    let header = &record[..header_len];
    let present = LittleEndian::read_u32(&header[4..8]);

    // skip any extended present words
    let mut offset = 8usize;
    let mut word = present;
    while word & PRESENT_EXT != 0 {
        word = LittleEndian::read_u32(header.get(offset..offset + 4)?);
        offset += 4;
    }

    let mut rx = RxInfo::new(timestamp);
    let mut flags = 0u8;
    let mut mcs: Option<[u8; 3]> = None;

    for field in RadiotapField::ALL {
        if present & field.bit() == 0 {
            continue;
        }
        let (align, size) = field.layout();
        offset = offset.checked_add(align - 1)? & !(align - 1);
        let Some(data) = header.get(offset..offset + size) else {
            break;
        };
        offset += size;

        match field {
            RadiotapField::Tsft => rx.tsft = Some(LittleEndian::read_u64(data)),
            RadiotapField::Flags => flags = data[0],
            RadiotapField::Rate => rx.rate = u32::from(data[0]) * 500_000,
            RadiotapField::Channel => {
                let freq = LittleEndian::read_u16(data);
                rx.frequency = Some(freq);
                rx.channel = frequency_to_channel(freq);
            }
            RadiotapField::AntennaSignal => rx.power = Some(i32::from(data[0] as i8)),
            RadiotapField::AntennaNoise => rx.noise = Some(i32::from(data[0] as i8)),
            RadiotapField::Antenna => rx.antenna = Some(data[0]),
            RadiotapField::Mcs => mcs = Some([data[0], data[1], data[2]]),
            _ => {}
        }
    }

    if rx.rate == 0 {
        if let Some([known, mcs_flags, index]) = mcs {
            rx.rate = mcs_rate(known, mcs_flags, index).unwrap_or(0);
        }
    }

    let mut frame = &record[header_len..];
    if flags & FLAG_FCS_AT_END != 0 {
        frame = &frame[..frame.len().saturating_sub(4)];
    }

    Some(Decoded {
        rx,
        frame,
        bad_fcs: flags & FLAG_BAD_FCS != 0,
    })
}

/// HT rate in bps from the radiotap MCS field.
fn mcs_rate(known: u8, flags: u8, index: u8) -> Option<u32> {
    if known & 0x02 == 0 {
        return None;
    }
    let width = if known & 0x01 != 0 && flags & 0x03 == 1 { 40 } else { 20 };
    let short_gi = known & 0x04 != 0 && flags & 0x04 != 0;
    ht_rate(width, short_gi, index).map(|mbps| (mbps * 1_000_000.0) as u32)
}

/// Radiotap header written in front of frames in capture files.
#[derive(Debug, Clone)]
pub struct RadiotapHeader {
    data: Vec<u8>,
}

impl RadiotapHeader {
    /// Rate, channel and antenna signal from the frame metadata (15 bytes).
    pub fn for_rx(rx: &RxInfo) -> Self {
        let freq = rx.frequency.unwrap_or(0);
        let rate = (rx.rate / 500_000).min(u32::from(u8::MAX)) as u8;
        let signal = rx.power.unwrap_or(0).clamp(-128, 127) as i8;
        let present = RadiotapField::Rate.bit()
            | RadiotapField::Channel.bit()
            | RadiotapField::AntennaSignal.bit();

        let mut data = vec![0x00, 0x00, 0x0F, 0x00];
        data.extend_from_slice(&present.to_le_bytes());
        data.push(rate);
        data.push(0x00); // align channel to 2 bytes
        data.extend_from_slice(&freq.to_le_bytes());
        let channel_flags: u16 = if freq >= 5000 { 0x0140 } else { 0x00A0 };
        data.extend_from_slice(&channel_flags.to_le_bytes());
        data.push(signal as u8);
        Self { data }
    }

    /// Get header length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Convert WiFi channel number to frequency in MHz
pub fn channel_to_frequency(channel: u8) -> Option<u16> {
    let channel = u16::from(channel);
    match channel {
        1..=13 => Some(2407 + channel * 5),
        14 => Some(2484),
        32..=177 => Some(5000 + channel * 5),
        _ => None,
    }
}

/// Convert frequency in MHz to WiFi channel number
pub fn frequency_to_channel(freq: u16) -> Option<u8> {
    let channel = match freq {
        2412..=2472 => (freq - 2407) / 5,
        2484 => 14,
        5160..=5885 => (freq - 5000) / 5,
        5955..=7115 => (freq - 5950) / 5,
        _ => return None,
    };
    u8::try_from(channel).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(header: &[u8], frame: &[u8]) -> Vec<u8> {
        let mut out = header.to_vec();
        out.extend_from_slice(frame);
        out
    }

    #[test]
    fn test_channel_frequency() {
        assert_eq!(channel_to_frequency(1), Some(2412));
        assert_eq!(channel_to_frequency(6), Some(2437));
        assert_eq!(channel_to_frequency(11), Some(2462));
        assert_eq!(channel_to_frequency(36), Some(5180));
        assert_eq!(channel_to_frequency(0), None);
    }

    #[test]
    fn test_frequency_channel() {
        assert_eq!(frequency_to_channel(2412), Some(1));
        assert_eq!(frequency_to_channel(2437), Some(6));
        assert_eq!(frequency_to_channel(5180), Some(36));
        assert_eq!(frequency_to_channel(1000), None);
    }

    #[test]
    fn test_decode_aligned_fields() {
        // TSFT, flags, rate, channel, signal, antenna
        let present: u32 = 0x0000_082F;
        let mut header = vec![0x00, 0x00, 0x00, 0x00];
        header.extend_from_slice(&present.to_le_bytes());
        header.extend_from_slice(&42u64.to_le_bytes()); // TSFT at 8
        header.push(FLAG_FCS_AT_END); // flags at 16
        header.push(0x0C); // rate at 17: 6 Mbit/s
        header.extend_from_slice(&2437u16.to_le_bytes()); // channel at 18
        header.extend_from_slice(&0x00A0u16.to_le_bytes());
        header.push((-42i8) as u8); // signal at 22
        header.push(1); // antenna at 23
        let len = header.len() as u16;
        header[2..4].copy_from_slice(&len.to_le_bytes());

        let rec = record(&header, &[0x80, 0x00, 0xAA, 0xBB, 1, 2, 3, 4]);
        let decoded = decode(&rec, SystemTime::UNIX_EPOCH).expect("valid radiotap");
        assert_eq!(decoded.rx.tsft, Some(42));
        assert_eq!(decoded.rx.rate, 6_000_000);
        assert_eq!(decoded.rx.channel, Some(6));
        assert_eq!(decoded.rx.power, Some(-42));
        assert_eq!(decoded.rx.antenna, Some(1));
        assert_eq!(decoded.frame, &[0x80, 0x00, 0xAA, 0xBB], "FCS stripped");
    }

    #[test]
    fn test_decode_mcs_rate() {
        let present = RadiotapField::Mcs.bit();
        let mut header = vec![0x00, 0x00, 11, 0x00];
        header.extend_from_slice(&present.to_le_bytes());
        header.extend_from_slice(&[0x07, 0x00, 7]);
        let decoded = decode(&header, SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(decoded.rx.rate, 65_000_000);
        assert!(decoded.frame.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        assert!(decode(&[0x00, 0x00, 0x20, 0x00, 0, 0, 0, 0], SystemTime::UNIX_EPOCH).is_none());
        assert!(decode(&[0x01, 0x00, 0x08, 0x00, 0, 0, 0, 0], SystemTime::UNIX_EPOCH).is_none());
    }

    #[test]
    fn test_header_round_trips_metadata() {
        let rx = RxInfo::new(SystemTime::UNIX_EPOCH)
            .with_channel(11)
            .with_power(-55)
            .with_rate(54_000_000);
        let header = RadiotapHeader::for_rx(&rx);
        assert_eq!(header.len(), 15);
        let decoded = decode(header.as_bytes(), SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(decoded.rx.channel, Some(11));
        assert_eq!(decoded.rx.power, Some(-55));
        assert_eq!(decoded.rx.rate, 54_000_000);
    }
}
