//! Output side channels of the analyzer.
//!
//! Delivery is push and fire-and-forget: sink methods return nothing and
//! the analyzer never waits on them. Every method has an empty default so
//! a sink only implements what it consumes.

use std::fmt;

use rustydump_wpa::{HandshakeExport, PmkidExport};
use serde::Serialize;

use crate::entities::{AccessPoint, Station};
use crate::frames::MacAddress;
use crate::radiotap::RxInfo;
use crate::wep::IvRecord;

/// Short human-readable notice. The last one is kept by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotableEvent {
    Decloak(MacAddress),
    Handshake(MacAddress),
    Pmkid(MacAddress),
    WepCloaking(MacAddress),
}

impl NotableEvent {
    pub fn bssid(&self) -> MacAddress {
        match self {
            Self::Decloak(bssid) | Self::Handshake(bssid) | Self::Pmkid(bssid) | Self::WepCloaking(bssid) => *bssid,
        }
    }
}

impl fmt::Display for NotableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decloak(bssid) => write!(f, "Decloak: {}", bssid),
            Self::Handshake(bssid) => write!(f, "WPA handshake: {}", bssid),
            Self::Pmkid(bssid) => write!(f, "PMKID found: {}", bssid),
            Self::WepCloaking(bssid) => write!(f, "WEP Cloaking: {}", bssid),
        }
    }
}

/// Key material handed to the handshake sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CapturedKey {
    Handshake(HandshakeExport),
    Pmkid(PmkidExport),
}

impl CapturedKey {
    /// hashcat 22000 line
    pub fn to_hashcat_22000(&self) -> String {
        match self {
            Self::Handshake(export) => export.to_hashcat_22000(),
            Self::Pmkid(export) => export.to_hashcat_22000(),
        }
    }
}

pub trait Sinks {
    /// First sighting of a WEP IV, with its known-cleartext keystream.
    fn on_iv(&mut self, _record: &IvRecord) {}

    /// Completed 4-way exchange or PMKID.
    fn on_key(&mut self, _bssid: MacAddress, _station: MacAddress, _key: &CapturedKey) {}

    fn on_event(&mut self, _event: &NotableEvent) {}

    /// Frame that survived the record filters, verbatim.
    fn on_raw_frame(&mut self, _frame: &[u8], _rx: &RxInfo) {}

    /// Frame sent by an AP, after its counters were updated.
    fn on_ap_log(&mut self, _ap: &AccessPoint, _rx: &RxInfo) {}

    /// Frame sent by a station, after its counters were updated.
    fn on_station_log(&mut self, _bssid: MacAddress, _station: &Station, _rx: &RxInfo) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sinks for NullSink {}

impl<S: Sinks + ?Sized> Sinks for &mut S {
    fn on_iv(&mut self, record: &IvRecord) {
        (**self).on_iv(record)
    }

    fn on_key(&mut self, bssid: MacAddress, station: MacAddress, key: &CapturedKey) {
        (**self).on_key(bssid, station, key)
    }

    fn on_event(&mut self, event: &NotableEvent) {
        (**self).on_event(event)
    }

    fn on_raw_frame(&mut self, frame: &[u8], rx: &RxInfo) {
        (**self).on_raw_frame(frame, rx)
    }

    fn on_ap_log(&mut self, ap: &AccessPoint, rx: &RxInfo) {
        (**self).on_ap_log(ap, rx)
    }

    fn on_station_log(&mut self, bssid: MacAddress, station: &Station, rx: &RxInfo) {
        (**self).on_station_log(bssid, station, rx)
    }
}

impl<S: Sinks + ?Sized> Sinks for Box<S> {
    fn on_iv(&mut self, record: &IvRecord) {
        (**self).on_iv(record)
    }

    fn on_key(&mut self, bssid: MacAddress, station: MacAddress, key: &CapturedKey) {
        (**self).on_key(bssid, station, key)
    }

    fn on_event(&mut self, event: &NotableEvent) {
        (**self).on_event(event)
    }

    fn on_raw_frame(&mut self, frame: &[u8], rx: &RxInfo) {
        (**self).on_raw_frame(frame, rx)
    }

    fn on_ap_log(&mut self, ap: &AccessPoint, rx: &RxInfo) {
        (**self).on_ap_log(ap, rx)
    }

    fn on_station_log(&mut self, bssid: MacAddress, station: &Station, rx: &RxInfo) {
        (**self).on_station_log(bssid, station, rx)
    }
}

/// Records every delivery in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub ivs: Vec<IvRecord>,
    pub keys: Vec<(MacAddress, MacAddress, CapturedKey)>,
    pub events: Vec<NotableEvent>,
    pub raw_frames: Vec<Vec<u8>>,
    /// BSSID per AP log call
    pub ap_logs: Vec<MacAddress>,
    /// (BSSID, station) per station log call
    pub station_logs: Vec<(MacAddress, MacAddress)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handshakes(&self) -> impl Iterator<Item = &HandshakeExport> + '_ {
        self.keys.iter().filter_map(|(_, _, key)| match key {
            CapturedKey::Handshake(export) => Some(export),
            CapturedKey::Pmkid(_) => None,
        })
    }

    pub fn pmkids(&self) -> impl Iterator<Item = &PmkidExport> + '_ {
        self.keys.iter().filter_map(|(_, _, key)| match key {
            CapturedKey::Pmkid(export) => Some(export),
            CapturedKey::Handshake(_) => None,
        })
    }
}

impl Sinks for MemorySink {
    fn on_iv(&mut self, record: &IvRecord) {
        self.ivs.push(record.clone());
    }

    fn on_key(&mut self, bssid: MacAddress, station: MacAddress, key: &CapturedKey) {
        self.keys.push((bssid, station, key.clone()));
    }

    fn on_event(&mut self, event: &NotableEvent) {
        self.events.push(*event);
    }

    fn on_raw_frame(&mut self, frame: &[u8], _rx: &RxInfo) {
        self.raw_frames.push(frame.to_vec());
    }

    fn on_ap_log(&mut self, ap: &AccessPoint, _rx: &RxInfo) {
        self.ap_logs.push(ap.bssid);
    }

    fn on_station_log(&mut self, bssid: MacAddress, station: &Station, _rx: &RxInfo) {
        self.station_logs.push((bssid, station.mac));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_messages() {
        let bssid: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(NotableEvent::Decloak(bssid).to_string(), "Decloak: 00:11:22:33:44:55");
        assert_eq!(NotableEvent::Handshake(bssid).to_string(), "WPA handshake: 00:11:22:33:44:55");
        assert_eq!(NotableEvent::Pmkid(bssid).to_string(), "PMKID found: 00:11:22:33:44:55");
        assert_eq!(NotableEvent::WepCloaking(bssid).to_string(), "WEP Cloaking: 00:11:22:33:44:55");
        assert_eq!(NotableEvent::Pmkid(bssid).bssid(), bssid);
    }
}
