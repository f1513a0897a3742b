//! Frame dispatcher
//!
//! [`Analyzer`] owns the entity directory, the compiled filters and the
//! output sinks. Each call to [`Analyzer::process_frame`] classifies one
//! frame, applies it to the directory and pushes anything notable to the
//! sinks before returning. [`Analyzer::tick`] runs the timer-gated quality
//! and refresh passes between frames.

use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::config::{AnalyzerConfig, Filters};
use crate::decloak::DECLOAK_WINDOW;
use crate::directory::{Directory, DirectoryOptions, PurgeReport};
use crate::elements;
use crate::entities::{valid_channel, AccessPoint, Station, UnidentifiedNode};
use crate::error::Result;
use crate::frames::{
    locate, sequence_number, ControlSubtype, DsMode, FrameControl, FrameSubtype, FrameType,
    HeaderLocation, MacAddress, HEADER_LEN, WDS_HEADER_LEN,
};
use crate::handshake::{HandshakeEvent, EAPOL_ETHER_TYPE};
use crate::radiotap::RxInfo;
use crate::security::{ap_has_required_security, Security};
use crate::sinks::{CapturedKey, NotableEvent, NullSink, Sinks};
use crate::traffic::elapsed;
use crate::wep::{known_clear, CloakCheck, CloakTracker, IvRecord};

/// Quality recompute period
pub const QUALITY_INTERVAL: Duration = Duration::from_millis(500);

/// Purge / rate refresh period
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Frames with this LLC prefix carry no payload worth attributing.
const LLC_NULL: [u8; 4] = [0, 0, 0, 0];

/// Largest control frame parsed for unidentified transmitters
const CONTROL_FRAME_MAX: usize = HEADER_LEN;

/// Per-analyzer frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyzerStats {
    pub frames: u64,
    /// Shorter than the basic header; only forwarded to the raw sink
    pub short_frames: u64,
    pub control_frames: u64,
    pub llc_null: u64,
    pub bssid_filtered: u64,
    /// Skipped because active scan keeps only probe responses
    pub scan_skipped: u64,
    /// Forwarded to the raw-frame sink
    pub recorded: u64,
}

/// Display view of one access point.
#[derive(Debug, Serialize)]
pub struct AccessPointView<'a> {
    #[serde(flatten)]
    pub ap: &'a AccessPoint,
    pub visible: bool,
    /// Stations currently attached
    pub stations: usize,
}

/// Serializable view of the directory.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub taken_at: SystemTime,
    pub access_points: Vec<AccessPointView<'a>>,
    pub stations: Vec<&'a Station>,
    pub unidentified: Vec<&'a UnidentifiedNode>,
    pub last_message: Option<String>,
    pub stats: AnalyzerStats,
}

pub struct Analyzer<S: Sinks = NullSink> {
    config: AnalyzerConfig,
    filters: Filters,
    directory: Directory,
    sinks: S,
    last_message: Option<NotableEvent>,
    last_quality: Option<SystemTime>,
    last_refresh: Option<SystemTime>,
    stats: AnalyzerStats,
}

impl Analyzer<NullSink> {
    /// Analyzer discarding all output.
    pub fn without_sinks(config: AnalyzerConfig) -> Result<Self> {
        Self::new(config, NullSink)
    }
}

impl<S: Sinks> Analyzer<S> {
    pub fn new(config: AnalyzerConfig, sinks: S) -> Result<Self> {
        let filters = config.filters()?;
        let directory = Directory::new(DirectoryOptions {
            record_ivs: config.record_ivs,
            decloak: config.decloak,
        });
        Ok(Self {
            config,
            filters,
            directory,
            sinks,
            last_message: None,
            last_quality: None,
            last_refresh: None,
            stats: AnalyzerStats::default(),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    pub fn sinks(&self) -> &S {
        &self.sinks
    }

    pub fn sinks_mut(&mut self) -> &mut S {
        &mut self.sinks
    }

    pub fn into_sinks(self) -> S {
        self.sinks
    }

    pub fn stats(&self) -> AnalyzerStats {
        self.stats
    }

    /// Most recent notable event
    pub fn last_message(&self) -> Option<&NotableEvent> {
        self.last_message.as_ref()
    }

    /// Classify one captured frame and apply it. `frame` is the bare 802.11
    /// frame, FCS already stripped.
    pub fn process_frame(&mut self, frame: &[u8], rx: &RxInfo) {
        self.stats.frames += 1;
        let fc = FrameControl::parse(frame);

        if self.config.active_scan && !fc.map_or(false, |fc| fc.is_management(FrameSubtype::ProbeResponse)) {
            self.stats.scan_skipped += 1;
            return;
        }

        let mut attributed = None;
        match (fc, locate(frame)) {
            (Some(fc), _) if fc.frame_type() == FrameType::Control => {
                self.stats.control_frames += 1;
            }
            (Some(fc), Some(location)) => {
                if fc.frame_type() == FrameType::Data
                    && frame.len() > HEADER_LEN + LLC_NULL.len()
                    && frame[HEADER_LEN..HEADER_LEN + LLC_NULL.len()] == LLC_NULL
                {
                    self.stats.llc_null += 1;
                    return;
                }
                if self.filters.bssid.is_filtered(&location.bssid) {
                    self.stats.bssid_filtered += 1;
                    return;
                }
                attributed = self.attribute(frame, &location, rx);
            }
            _ => self.stats.short_frames += 1,
        }

        self.record(frame, fc, attributed, rx);
    }

    /// AP/station bookkeeping and the per-subtype parsers. Returns the BSSID
    /// when an AP entry exists for the frame.
    fn attribute(&mut self, frame: &[u8], location: &HeaderLocation, rx: &RxInfo) -> Option<MacAddress> {
        let now = rx.timestamp;
        let bssid = location.bssid;
        let fc = location.fc;
        let seq = sequence_number(frame).unwrap_or(0);

        let has_ap = match self.directory.ap_entry(bssid, now) {
            Some((ap, _)) => {
                update_access_point(ap, frame, fc, rx, seq, &mut self.sinks);
                true
            }
            None => false,
        };

        let mut station_mac = None;
        if let Some(mac) = location.station {
            if let Some((station, _)) = self.directory.station_entry(mac, now) {
                update_station(station, bssid, frame, fc, rx, seq, self.config.fixed_channel, &mut self.sinks);
                station_mac = Some(mac);
            }
        }

        let (ap, station) = self.directory.pair_mut(&bssid, station_mac.as_ref());
        match fc.management_subtype() {
            Some(FrameSubtype::ProbeRequest) => {
                if let Some(station) = station {
                    elements::parse_probe_request(station, frame);
                }
            }
            Some(FrameSubtype::Beacon | FrameSubtype::ProbeResponse) => {
                if let Some(ap) = ap {
                    elements::parse_beacon(ap, frame);
                    elements::parse_beacon_security(ap, frame);
                }
            }
            Some(FrameSubtype::Authentication) => {
                if let Some(ap) = ap {
                    elements::parse_authentication_response(ap, frame);
                }
            }
            Some(FrameSubtype::AssociationRequest) => {
                elements::parse_association_request(ap, station, frame);
            }
            _ if fc.frame_type() == FrameType::Data => {
                if let Some(ap) = ap {
                    let mut out = Output {
                        sinks: &mut self.sinks,
                        last_message: &mut self.last_message,
                    };
                    parse_data(ap, station, frame, fc, rx, &self.config, &self.filters, &mut out);
                }
            }
            _ => {}
        }

        has_ap.then_some(bssid)
    }

    /// Record filters, control-frame transmitters and the raw-frame sink.
    fn record(&mut self, frame: &[u8], fc: Option<FrameControl>, bssid: Option<MacAddress>, rx: &RxInfo) {
        if let Some(ap) = bssid.and_then(|bssid| self.directory.ap_mut(&bssid)) {
            if self.config.one_beacon && fc.map_or(false, |fc| fc.is_management(FrameSubtype::Beacon)) {
                if ap.beacon_logged {
                    return;
                }
                ap.beacon_logged = true;
            }
            if !ap_has_required_security(ap.security, self.filters.encryption) {
                return;
            }
            if self.filters.essid.is_filtered(&ap.essid) {
                return;
            }
        }

        if let Some(fc) = fc {
            if frame.len() >= 10 && frame.len() < CONTROL_FRAME_MAX && frame[0] != 0 {
                self.parse_control_frame(frame, fc, rx);
            }
        }

        self.stats.recorded += 1;
        self.sinks.on_raw_frame(frame, rx);
    }

    /// Short control frames: transmitters and receivers not known as AP or
    /// station become unidentified nodes.
    fn parse_control_frame(&mut self, frame: &[u8], fc: FrameControl, rx: &RxInfo) {
        let Some(subtype) = fc.control_subtype() else {
            return;
        };
        for offset in [4usize, 10, 16] {
            let Some(mac) = MacAddress::read(frame, offset) else {
                break;
            };
            if mac.is_zero() || mac.is_broadcast() {
                continue;
            }
            let Some((node, created)) = self.directory.node_entry(mac, rx.timestamp) else {
                continue;
            };
            if created {
                tracing::debug!(target: "wifi", mac = %mac, "unidentified_node_created");
            }
            node.last_seen = rx.timestamp;
            node.power = rx.power.or(node.power);
            node.channel = rx.channel.or(node.channel);

            let counters = &mut node.counters;
            match subtype {
                ControlSubtype::Rts if offset == 4 => counters.rts_received += 1,
                ControlSubtype::Rts if offset == 10 => counters.rts_transmitted += 1,
                ControlSubtype::Cts => counters.cts += 1,
                ControlSubtype::Ack => counters.ack += 1,
                _ => counters.other += 1,
            }
        }
    }

    /// Run the quality pass every [`QUALITY_INTERVAL`] and the refresh pass
    /// (purge, decloak aging, per-second rates) every [`REFRESH_INTERVAL`].
    /// Driven by capture time, so replays behave like live captures.
    pub fn tick(&mut self, now: SystemTime) -> PurgeReport {
        let due = |last: Option<SystemTime>, period: Duration| last.map_or(true, |last| elapsed(now, last) >= period);

        if due(self.last_quality, QUALITY_INTERVAL) {
            for ap in self.directory.access_points_mut() {
                ap.quality.recompute(now);
            }
            for station in self.directory.stations_mut() {
                station.missed.expire(now);
            }
            self.last_quality = Some(now);
        }

        if !due(self.last_refresh, REFRESH_INTERVAL) {
            return PurgeReport::default();
        }
        self.last_refresh = Some(now);

        let report = self.directory.purge_older_than(now, self.config.max_age);
        for ap in self.directory.access_points_mut() {
            ap.decloak.ring.purge_older_than(now, DECLOAK_WINDOW);
            ap.data_rate.update(ap.data_frames, now);
        }
        for node in self.directory.unidentified_mut() {
            node.ack_rate.update(node.counters.ack, now);
        }
        report
    }

    /// Display rule: enough frames, heard within the Berlin window and not
    /// filtered out.
    pub fn is_visible(&self, ap: &AccessPoint, now: SystemTime) -> bool {
        ap.packets >= self.config.min_pkts
            && elapsed(now, ap.last_seen) <= self.config.berlin
            && !ap.bssid.is_broadcast()
            && ap_has_required_security(ap.security, self.filters.encryption)
            && !self.filters.essid.is_filtered(&ap.essid)
    }

    pub fn visible_access_points(&self, now: SystemTime) -> impl Iterator<Item = &AccessPoint> + '_ {
        self.directory
            .access_points()
            .iter()
            .filter(move |ap| self.is_visible(ap, now))
    }

    pub fn snapshot(&self, now: SystemTime) -> Snapshot<'_> {
        let stations = self.directory.stations();
        let access_points = self
            .directory
            .access_points()
            .iter()
            .map(|ap| AccessPointView {
                ap,
                visible: self.is_visible(ap, now),
                stations: stations.iter().filter(|sta| sta.ap == Some(ap.bssid)).count(),
            })
            .collect();
        Snapshot {
            taken_at: now,
            access_points,
            stations: stations.iter().collect(),
            unidentified: self.directory.unidentified().iter().collect(),
            last_message: self.last_message.map(|event| event.to_string()),
            stats: self.stats,
        }
    }
}

struct Output<'a, S> {
    sinks: &'a mut S,
    last_message: &'a mut Option<NotableEvent>,
}

impl<S: Sinks> Output<'_, S> {
    fn event(&mut self, event: NotableEvent) {
        tracing::info!(target: "wifi", bssid = %event.bssid(), message = %event, "notable_event");
        self.sinks.on_event(&event);
        *self.last_message = Some(event);
    }
}

fn update_access_point<S: Sinks>(
    ap: &mut AccessPoint,
    frame: &[u8],
    fc: FrameControl,
    rx: &RxInfo,
    seq: u16,
    sinks: &mut S,
) {
    let now = rx.timestamp;
    ap.last_seen = now;

    let sent_by_ap = match fc.ds() {
        DsMode::NoDs => MacAddress::read(frame, 10) == Some(ap.bssid),
        DsMode::FromDs => true,
        _ => false,
    };
    if sent_by_ap {
        if let Some(power) = rx.power {
            ap.power.record(power);
        }
        ap.quality.record_frame(seq, now);
        sinks.on_ap_log(ap, rx);
    }

    match fc.management_subtype() {
        Some(FrameSubtype::Beacon) => ap.beacons += 1,
        Some(FrameSubtype::ProbeResponse) => ap.wps.reset_state(),
        _ => {}
    }
    ap.packets += 1;
}

#[allow(clippy::too_many_arguments)]
fn update_station<S: Sinks>(
    station: &mut Station,
    bssid: MacAddress,
    frame: &[u8],
    fc: FrameControl,
    rx: &RxInfo,
    seq: u16,
    fixed_channel: Option<u8>,
    sinks: &mut S,
) {
    station.last_seen = rx.timestamp;
    station.attach(bssid);

    let ds = fc.ds();
    if ds == DsMode::FromDs {
        station.rate_to = Some(rx.rate);
    }

    let sent_by_station = match ds {
        DsMode::NoDs => MacAddress::read(frame, 10) != Some(bssid),
        DsMode::ToDs => true,
        _ => false,
    };
    if sent_by_station {
        if let Some(power) = rx.power {
            station.power = Some(power);
            if station.best_power.map_or(true, |best| power > best) {
                station.best_power = Some(power);
            }
        }
        station.rate_from = Some(rx.rate);
        station.channel = valid_channel(rx.channel).or(fixed_channel).or(station.channel);
        station.missed.record(seq);
        sinks.on_station_log(bssid, station, rx);
    }
    station.packets += 1;
}

/// Data frame analysis: LAN address, encryption class, WEP IVs, decloak
/// and EAPOL.
#[allow(clippy::too_many_arguments)]
fn parse_data<S: Sinks>(
    ap: &mut AccessPoint,
    mut station: Option<&mut Station>,
    frame: &[u8],
    fc: FrameControl,
    rx: &RxInfo,
    config: &AnalyzerConfig,
    filters: &Filters,
    out: &mut Output<'_, S>,
) {
    let now = rx.timestamp;
    let ds = fc.ds();
    let len = frame.len();

    if ap.channel.is_none() {
        ap.channel = valid_channel(rx.channel).or(config.fixed_channel);
    }

    let mut header = if ds == DsMode::Wds { WDS_HEADER_LEN } else { HEADER_LEN };
    if fc.is_qos() {
        header += 2;
    }
    if let Some(station) = station.as_deref_mut() {
        let qos = fc.is_qos();
        match ds {
            DsMode::ToDs => station.qos_to_ds = qos,
            _ => station.qos_from_ds = qos,
        }
    }
    let z = header;

    if z == HEADER_LEN && ap.decloak.armed {
        if ap.decloak.ring.matches(frame) {
            ap.decloak.detected = true;
            ap.decloak.armed = false;
            ap.decloak.ring.clear();
            out.event(NotableEvent::Decloak(ap.bssid));
        } else {
            ap.decloak.ring.push(frame, now);
        }
    }

    if z + 26 > len {
        return;
    }

    if frame[z] == frame[z + 1] && frame[z + 2] == 0x03 {
        let ether_type = [frame[z + 6], frame[z + 7]];
        let address = match ether_type {
            [0x08, 0x00] if ds == DsMode::ToDs => Some(z + 20),
            [0x08, 0x06] => Some(z + 22),
            _ => None,
        };
        if let Some(at) = address {
            ap.lan_ip = Some(Ipv4Addr::new(frame[at], frame[at + 1], frame[at + 2], frame[at + 3]));
        }
    }

    if ap.security.is_empty() || ap.security.contains(Security::STD_WEP) {
        if !fc.is_protected() {
            ap.security |= Security::STD_OPN;
        } else if frame[z + 3] & 0x20 != 0 {
            ap.security |= Security::STD_WPA;
        } else {
            ap.security |= Security::STD_WEP;
            if frame[z + 3] & 0xC0 != 0 {
                ap.security |= Security::ENC_WEP40;
            } else {
                ap.security.remove(Security::ENC_WEP40);
                ap.security |= Security::ENC_WEP;
            }
        }
    }

    if z + 10 > len {
        return;
    }

    if ap.security.contains(Security::STD_WEP) {
        let iv = [frame[z], frame[z + 1], frame[z + 2], frame[z + 3]];
        let unseen = match ap.ivs.as_mut() {
            Some(set) => set.insert(iv),
            None => true,
        };
        if unseen {
            if ap.ivs.is_some() {
                if let Some(keystream) = known_clear(frame, ds, z) {
                    tracing::trace!(target: "crypto", bssid = %ap.bssid, iv = ?iv, "iv_recorded");
                    out.sinks.on_iv(&IvRecord {
                        bssid: ap.bssid,
                        iv,
                        keystream,
                    });
                }
            }
            ap.data_frames += 1;
        }

        if !config.record_ivs && config.detect_anomaly {
            let tracker = ap.cloak_check.get_or_insert_with(CloakTracker::new);
            let check = tracker.check([iv[0], iv[1], iv[2]], [frame[z + 4], frame[z + 5]]);
            if check == CloakCheck::Cloaking && !ap.eap_detected {
                out.event(NotableEvent::WepCloaking(ap.bssid));
            }
        }
    } else {
        ap.data_frames += 1;
    }

    // past the LLC/SNAP header
    let mut z = header + 6;

    if frame[z..z + 2] != EAPOL_ETHER_TYPE || fc.is_protected() {
        return;
    }
    ap.eap_detected = true;
    z += 2;

    let Some(station) = station else {
        return;
    };
    match station.handshake.process(&frame[z..]) {
        Some(HandshakeEvent::PmkidFound) => {
            out.event(NotableEvent::Pmkid(ap.bssid));
            if let Some(export) = station.handshake.pmkid_export(ap.bssid, station.mac, &ap.essid) {
                tracing::info!(target: "crypto", bssid = %ap.bssid, station = %station.mac, "pmkid_captured");
                out.sinks.on_key(ap.bssid, station.mac, &CapturedKey::Pmkid(export));
            }
        }
        Some(HandshakeEvent::Completed) => {
            if filters.essid.is_filtered(&ap.essid) {
                return;
            }
            if let Some(export) = station.handshake.export(ap.bssid, station.mac, &ap.essid) {
                tracing::info!(
                    target: "crypto",
                    bssid = %ap.bssid,
                    station = %station.mac,
                    message_pair = ?export.message_pair,
                    "handshake_captured"
                );
                out.sinks.on_key(ap.bssid, station.mac, &CapturedKey::Handshake(export));
            }
            out.event(NotableEvent::Handshake(ap.bssid));
        }
        None => {}
    }
}
