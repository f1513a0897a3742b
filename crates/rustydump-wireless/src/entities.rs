//! Tracked radio entities: access points, stations and unidentified
//! transmitters.

use std::net::Ipv4Addr;
use std::time::SystemTime;

use serde::Serialize;

use crate::decloak::DecloakRing;
use crate::frames::MacAddress;
use crate::handshake::WpaHandshake;
use crate::rates::{ChannelWidth, PhyCapabilities, SecondaryChannel, Standard};
use crate::security::Security;
use crate::traffic::{MissedFrames, PowerStats, RateWindow, RxQuality};
use crate::wep::{CloakTracker, IvSet};

/// Probed ESSIDs kept per station
pub const NB_PRB: usize = 10;

/// Longest ESSID stored
pub const ESSID_LENGTH: usize = 32;

/// Highest channel number accepted from radio metadata
pub const HIGHEST_CHANNEL: u8 = 220;

/// Replace control characters with `.`.
pub fn make_printable(essid: &mut [u8]) {
    for byte in essid.iter_mut().filter(|b| **b < b' ') {
        *byte = b'.';
    }
}

/// Control characters other than NUL
pub fn has_control_chars(essid: &[u8]) -> bool {
    essid.iter().any(|&b| b > 0 && b < b' ')
}

/// Channel from radio metadata, if plausible.
pub fn valid_channel(channel: Option<u8>) -> Option<u8> {
    channel.filter(|&c| c > 0 && c <= HIGHEST_CHANNEL)
}

/// WPS attributes of an access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WpsInfo {
    /// Wi-Fi Simple Configuration state; `None` until advertised
    pub state: Option<u8>,
    pub version: u8,
    pub setup_locked: bool,
    pub config_methods: u16,
}

impl Default for WpsInfo {
    fn default() -> Self {
        Self {
            state: None,
            version: 0,
            setup_locked: false,
            config_methods: 0,
        }
    }
}

impl WpsInfo {
    pub fn reset_state(&mut self) {
        self.state = None;
        self.setup_locked = false;
    }
}

/// Decloak detection state of an access point.
#[derive(Debug, Clone, Default)]
pub struct DecloakState {
    pub armed: bool,
    pub detected: bool,
    pub ring: DecloakRing,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessPoint {
    pub bssid: MacAddress,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub power: PowerStats,
    pub channel: Option<u8>,
    pub channel_width: ChannelWidth,
    pub secondary_channel: SecondaryChannel,
    pub standard: Option<Standard>,
    pub phy: PhyCapabilities,
    /// Mbit/s
    pub max_speed: Option<u32>,
    pub security: Security,
    #[serde(serialize_with = "serialize_essid")]
    pub essid: Vec<u8>,
    pub preamble: bool,
    /// Beacon timestamp (AP uptime in microseconds)
    pub timestamp: u64,
    pub wps: WpsInfo,
    pub lan_ip: Option<Ipv4Addr>,
    pub beacons: u64,
    pub packets: u64,
    /// Data frames, unique IVs only for WEP
    pub data_frames: u64,
    pub data_rate: RateWindow,
    pub quality: RxQuality,
    pub eap_detected: bool,
    #[serde(skip)]
    pub ivs: Option<IvSet>,
    #[serde(skip)]
    pub cloak_check: Option<CloakTracker>,
    #[serde(skip)]
    pub decloak: DecloakState,
    #[serde(skip)]
    pub beacon_logged: bool,
}

impl AccessPoint {
    pub fn new(bssid: MacAddress, now: SystemTime, record_ivs: bool, decloak: bool) -> Self {
        Self {
            bssid,
            first_seen: now,
            last_seen: now,
            power: PowerStats::default(),
            channel: None,
            channel_width: ChannelWidth::default(),
            secondary_channel: SecondaryChannel::default(),
            standard: None,
            phy: PhyCapabilities::default(),
            max_speed: None,
            security: Security::NONE,
            essid: Vec::new(),
            preamble: false,
            timestamp: 0,
            wps: WpsInfo::default(),
            lan_ip: None,
            beacons: 0,
            packets: 0,
            data_frames: 0,
            data_rate: RateWindow::new(now),
            quality: RxQuality::new(now),
            eap_detected: false,
            ivs: record_ivs.then(IvSet::new),
            cloak_check: None,
            decloak: DecloakState {
                armed: decloak,
                ..DecloakState::default()
            },
            beacon_logged: false,
        }
    }

    /// ESSID as text, lossy
    pub fn essid_str(&self) -> String {
        String::from_utf8_lossy(&self.essid).into_owned()
    }

    /// Hidden or not yet learned
    pub fn is_hidden(&self) -> bool {
        self.essid.is_empty()
    }

    /// Store a broadcast ESSID, clipped and made printable.
    pub fn set_essid(&mut self, raw: &[u8]) {
        let mut essid = raw[..raw.len().min(ESSID_LENGTH)].to_vec();
        if std::str::from_utf8(&essid).is_err() || has_control_chars(&essid) {
            make_printable(&mut essid);
        }
        self.essid = essid;
    }

    /// Largest max_speed so far from the supported rates elements.
    pub fn raise_max_speed(&mut self, mbps: u32) {
        if self.max_speed.map_or(true, |current| current < mbps) {
            self.max_speed = Some(mbps);
        }
    }
}

fn serialize_essid<S: serde::Serializer>(essid: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(essid))
}

/// Fixed-size ring of probed ESSIDs, newest overwriting oldest.
#[derive(Debug, Clone, Default)]
pub struct ProbeRing {
    slots: [Option<Vec<u8>>; NB_PRB],
    index: usize,
}

impl ProbeRing {
    /// Record a probed ESSID unless it is already present. Returns true if
    /// it was added.
    pub fn record(&mut self, essid: &[u8]) -> bool {
        let essid = &essid[..essid.len().min(ESSID_LENGTH)];
        if self.slots.iter().flatten().any(|probe| probe.as_slice() == essid) {
            return false;
        }
        self.index = (self.index + 1) % NB_PRB;
        let mut stored = essid.to_vec();
        if std::str::from_utf8(&stored).is_err() {
            make_printable(&mut stored);
        }
        self.slots[self.index] = Some(stored);
        true
    }

    pub fn contains(&self, essid: &[u8]) -> bool {
        self.slots.iter().flatten().any(|probe| probe.as_slice() == essid)
    }

    /// Stored ESSIDs, newest first
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..NB_PRB)
            .map(move |step| (self.index + NB_PRB - step) % NB_PRB)
            .filter_map(move |slot| self.slots[slot].as_deref())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for ProbeRing {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.iter().map(String::from_utf8_lossy))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Station {
    pub mac: MacAddress,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    /// `None` until first attributed; broadcast means unassociated
    pub ap: Option<MacAddress>,
    pub power: Option<i32>,
    pub best_power: Option<i32>,
    /// Rate of the last AP-to-station frame, bps
    pub rate_to: Option<u32>,
    /// Rate of the last station-to-AP frame, bps
    pub rate_from: Option<u32>,
    pub channel: Option<u8>,
    pub missed: MissedFrames,
    pub probes: ProbeRing,
    pub qos_to_ds: bool,
    pub qos_from_ds: bool,
    pub packets: u64,
    pub handshake: WpaHandshake,
}

impl Station {
    pub fn new(mac: MacAddress, now: SystemTime) -> Self {
        Self {
            mac,
            first_seen: now,
            last_seen: now,
            ap: None,
            power: None,
            best_power: None,
            rate_to: None,
            rate_from: None,
            channel: None,
            missed: MissedFrames::new(now),
            probes: ProbeRing::default(),
            qos_to_ds: false,
            qos_from_ds: false,
            packets: 0,
            handshake: WpaHandshake::default(),
        }
    }

    pub fn is_associated(&self) -> bool {
        self.ap.map_or(false, |ap| !ap.is_broadcast())
    }

    /// Last non-broadcast AP wins; broadcast only fills an unknown slot.
    pub fn attach(&mut self, bssid: MacAddress) {
        if self.ap.is_none() || !bssid.is_broadcast() {
            self.ap = Some(bssid);
        }
    }
}

/// Per-subtype control frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlCounters {
    /// RTS frames received (MAC in the receiver slot)
    pub rts_received: u64,
    /// RTS frames transmitted (MAC in the transmitter slot)
    pub rts_transmitted: u64,
    pub cts: u64,
    pub ack: u64,
    pub other: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnidentifiedNode {
    pub mac: MacAddress,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub power: Option<i32>,
    pub channel: Option<u8>,
    pub counters: ControlCounters,
    pub ack_rate: RateWindow,
}

impl UnidentifiedNode {
    pub fn new(mac: MacAddress, now: SystemTime) -> Self {
        Self {
            mac,
            first_seen: now,
            last_seen: now,
            power: None,
            channel: None,
            counters: ControlCounters::default(),
            ack_rate: RateWindow::new(now),
        }
    }
}
