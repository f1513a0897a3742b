//! 802.11 frame header structures and the header locator
//!
//! This module provides Rust representations of the IEEE 802.11 frame
//! control field and the fixed address layout, and works out which address
//! slots hold the BSSID and the station for each to-DS/from-DS combination.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, WirelessError};

/// Length of the basic management/data header, sequence control included.
pub const HEADER_LEN: usize = 24;
/// Length of a four-address (WDS) data header.
pub const WDS_HEADER_LEN: usize = 30;

/// MAC address (6 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast address (FF:FF:FF:FF:FF:FF)
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Zero/null address
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    /// Create from bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create from slice (must be 6 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 6] = slice.try_into().map_err(|_| {
            WirelessError::InvalidMac(format!("Expected 6 bytes, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Read the address stored at `offset`, if the buffer is long enough.
    pub fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let end = offset.checked_add(6)?;
        let bytes: [u8; 6] = buf.get(offset..end)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is a broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Check if this is a group address (bit 0 of first octet set)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Check if all octets are zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }

    /// Check if this is a locally administered address (bit 1 of first octet set)
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Bitwise AND with a netmask
    pub fn masked(&self, mask: &MacAddress) -> MacAddress {
        let mut out = [0u8; 6];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] & mask.0[i];
        }
        MacAddress(out)
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = WirelessError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(WirelessError::InvalidMac(format!(
                "Expected 6 octets separated by ':', got '{}'",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(WirelessError::InvalidMac(format!(
                    "Invalid hex octet: '{}'",
                    part
                )));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| WirelessError::InvalidMac(format!("Invalid hex octet: '{}'", part)))?;
        }

        Ok(Self(bytes))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 802.11 Frame Type (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Management frames (beacons, probes, auth, deauth, etc.)
    Management = 0,
    /// Control frames (ACK, RTS, CTS, etc.)
    Control = 1,
    /// Data frames (actual payload)
    Data = 2,
    /// Extension (802.11ad)
    Extension = 3,
}

/// 802.11 Frame Subtype (4 bits) - Management frames only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameSubtype {
    AssociationRequest = 0,
    AssociationResponse = 1,
    ReassociationRequest = 2,
    ReassociationResponse = 3,
    ProbeRequest = 4,
    ProbeResponse = 5,
    TimingAdvertisement = 6,
    Beacon = 8,
    Atim = 9,
    Disassociation = 10,
    Authentication = 11,
    Deauthentication = 12,
    Action = 13,
    ActionNoAck = 14,
    Unknown = 255,
}

impl FrameSubtype {
    fn from_bits(subtype: u8) -> Self {
        match subtype {
            0 => Self::AssociationRequest,
            1 => Self::AssociationResponse,
            2 => Self::ReassociationRequest,
            3 => Self::ReassociationResponse,
            4 => Self::ProbeRequest,
            5 => Self::ProbeResponse,
            6 => Self::TimingAdvertisement,
            8 => Self::Beacon,
            9 => Self::Atim,
            10 => Self::Disassociation,
            11 => Self::Authentication,
            12 => Self::Deauthentication,
            13 => Self::Action,
            14 => Self::ActionNoAck,
            _ => Self::Unknown,
        }
    }
}

/// Control frame subtypes that carry sender or receiver addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSubtype {
    BlockAckRequest,
    BlockAck,
    PsPoll,
    Rts,
    Cts,
    Ack,
    CfEnd,
    CfEndAck,
    Other(u8),
}

impl ControlSubtype {
    fn from_bits(subtype: u8) -> Self {
        match subtype {
            8 => Self::BlockAckRequest,
            9 => Self::BlockAck,
            10 => Self::PsPoll,
            11 => Self::Rts,
            12 => Self::Cts,
            13 => Self::Ack,
            14 => Self::CfEnd,
            15 => Self::CfEndAck,
            other => Self::Other(other),
        }
    }
}

/// Distribution-system bit pair (to-DS / from-DS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DsMode {
    /// Management frames and ad-hoc data
    NoDs,
    /// Station to AP
    ToDs,
    /// AP to station
    FromDs,
    /// Four-address bridge frames
    Wds,
}

/// 802.11 Frame Control field (2 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    raw: u16,
}

impl FrameControl {
    /// Read the field from the first two bytes of a frame
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let bytes = frame.get(0..2)?;
        Some(Self {
            raw: LittleEndian::read_u16(bytes),
        })
    }

    /// First byte: protocol version, type and subtype
    pub fn fc0(&self) -> u8 {
        (self.raw & 0xFF) as u8
    }

    /// Second byte: flags
    pub fn fc1(&self) -> u8 {
        (self.raw >> 8) as u8
    }

    /// Get frame type
    pub fn frame_type(&self) -> FrameType {
        match (self.fc0() >> 2) & 0x03 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }

    /// Raw four subtype bits
    pub fn subtype_bits(&self) -> u8 {
        self.fc0() >> 4
    }

    /// Management subtype. Only meaningful for management frames and
    /// only for protocol version 0.
    pub fn management_subtype(&self) -> Option<FrameSubtype> {
        if self.frame_type() != FrameType::Management || self.fc0() & 0x03 != 0 {
            return None;
        }
        Some(FrameSubtype::from_bits(self.subtype_bits()))
    }

    /// Control subtype, for control frames
    pub fn control_subtype(&self) -> Option<ControlSubtype> {
        if self.frame_type() != FrameType::Control {
            return None;
        }
        Some(ControlSubtype::from_bits(self.subtype_bits()))
    }

    /// True for the given management subtype
    pub fn is_management(&self, subtype: FrameSubtype) -> bool {
        self.management_subtype() == Some(subtype)
    }

    /// DS bit pair
    pub fn ds(&self) -> DsMode {
        match self.fc1() & 0x03 {
            0 => DsMode::NoDs,
            1 => DsMode::ToDs,
            2 => DsMode::FromDs,
            3 => DsMode::Wds,
            _ => unreachable!("DS field is masked to two bits"),
        }
    }

    /// Protected frame bit
    pub fn is_protected(&self) -> bool {
        self.fc1() & 0x40 != 0
    }

    /// QoS data subtype bit
    pub fn is_qos(&self) -> bool {
        self.fc0() & 0x80 != 0
    }

    /// Get raw value
    pub fn raw(&self) -> u16 {
        self.raw
    }
}

/// Addresses derived from a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    pub fc: FrameControl,
    pub bssid: MacAddress,
    /// Station the frame belongs to, when one can be attributed.
    pub station: Option<MacAddress>,
}

impl HeaderLocation {
    pub fn ds(&self) -> DsMode {
        self.fc.ds()
    }
}

/// Locate the BSSID and station address of a frame.
///
/// Returns `None` for frames shorter than the basic header. Group
/// addresses are never reported as stations.
pub fn locate(frame: &[u8]) -> Option<HeaderLocation> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    let fc = FrameControl::parse(frame)?;
    let addr1 = MacAddress::read(frame, 4)?;
    let addr2 = MacAddress::read(frame, 10)?;
    let addr3 = MacAddress::read(frame, 16)?;

    let (bssid, station) = match fc.ds() {
        DsMode::NoDs => (addr3, (addr2 != addr3).then_some(addr2)),
        DsMode::ToDs => (addr1, Some(addr2)),
        DsMode::FromDs => (addr2, Some(addr1)),
        DsMode::Wds => (addr2, None),
    };

    Some(HeaderLocation {
        fc,
        bssid,
        station: station.filter(|mac| !mac.is_multicast()),
    })
}

/// Sequence number from the sequence control field (12 bits).
pub fn sequence_number(frame: &[u8]) -> Option<u16> {
    let lo = *frame.get(22)? as u16;
    let hi = *frame.get(23)? as u16;
    Some((lo >> 4) + (hi << 4))
}

/// Destination address for the frame's DS layout.
pub fn destination(frame: &[u8], ds: DsMode) -> Option<MacAddress> {
    match ds {
        DsMode::ToDs => MacAddress::read(frame, 16),
        _ => MacAddress::read(frame, 4),
    }
}

/// Source address for the frame's DS layout.
pub fn source(frame: &[u8], ds: DsMode) -> Option<MacAddress> {
    match ds {
        DsMode::FromDs => MacAddress::read(frame, 16),
        DsMode::Wds => MacAddress::read(frame, 24),
        _ => MacAddress::read(frame, 10),
    }
}
