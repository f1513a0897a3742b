//! Capability and security element parsing for management frames
//!
//! Beacons and probe responses are parsed in two passes over the same
//! element list: the first extracts identity and PHY capabilities, the
//! second the WPA/RSN/WPS security attributes. Each pass stops at the first
//! element whose declared length overruns the frame, keeping whatever it
//! already applied.

use crate::cursor::{
    elements, ByteCursor, Element, TAG_DS_PARAMS, TAG_EXTENDED_RATES, TAG_HT_CAPABILITIES,
    TAG_HT_OPERATION, TAG_RATES, TAG_RSN, TAG_SSID, TAG_VENDOR, TAG_VHT_CAPABILITIES,
    TAG_VHT_OPERATION,
};
use crate::entities::{has_control_chars, AccessPoint, Station, WpsInfo, ESSID_LENGTH};
use crate::frames::HEADER_LEN;
use crate::rates::{ChannelWidth, SecondaryChannel, Standard};
use crate::security::Security;

/// Start of the element list in beacons and probe responses (header,
/// timestamp, beacon interval, capability information).
pub const BEACON_ELEMENTS_OFFSET: usize = 36;
const CAPABILITY_OFFSET: usize = 34;

/// Start of the element list in association requests (header, capability
/// information, listen interval).
pub const ASSOC_REQUEST_ELEMENTS_OFFSET: usize = 28;

const WPA_OUI_TYPE: [u8; 6] = [0x00, 0x50, 0xF2, 0x01, 0x01, 0x00];
const WMM_OUI_TYPE: [u8; 6] = [0x00, 0x50, 0xF2, 0x02, 0x01, 0x01];
const WPS_OUI_TYPE: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];
const WFA_OUI: [u8; 3] = [0x00, 0x37, 0x2A];

const WPS_VERSION: u16 = 0x104a;
const WPS_STATE: u16 = 0x1044;
const WPS_VENDOR_EXTENSION: u16 = 0x1049;
const WPS_AP_SETUP_LOCKED: u16 = 0x1057;
const WPS_CONFIG_METHODS: u16 = 0x1008;
const WPS_SELECTED_REGISTRAR_CONFIG_METHODS: u16 = 0x1053;

/// A non-hidden ESSID: non-empty, not starting with NUL, not a single space.
pub fn is_broadcast_essid(data: &[u8]) -> bool {
    match data {
        [] | [0, ..] => false,
        _ => !data.iter().all(|&b| b == b' '),
    }
}

/// First pass over a beacon or probe response: capability bits, ESSID,
/// channel and PHY rate.
pub fn parse_beacon(ap: &mut AccessPoint, frame: &[u8]) {
    if frame.len() < BEACON_ELEMENTS_OFFSET {
        return;
    }
    let capability = frame[CAPABILITY_OFFSET];

    if !ap.security.has_standard() {
        if capability & 0x10 != 0 {
            ap.security.insert(Security::STD_WEP | Security::ENC_WEP);
        } else {
            ap.security.insert(Security::STD_OPN);
        }
    }
    ap.preamble = capability & 0x20 != 0;

    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&frame[HEADER_LEN..HEADER_LEN + 8]);
    ap.timestamp = u64::from_le_bytes(timestamp);

    for element in elements(frame, BEACON_ELEMENTS_OFFSET) {
        apply_capability_element(ap, element);
    }

    if let Some(standard) = ap.standard {
        if let Some(rate) = ap.phy.max_rate(standard, ap.channel_width) {
            ap.max_speed = Some(rate);
        }
    }
}

fn apply_capability_element(ap: &mut AccessPoint, element: Element<'_>) {
    let value = element.data;
    match element.tag {
        TAG_SSID if is_broadcast_essid(value) => ap.set_essid(value),
        TAG_RATES | TAG_EXTENDED_RATES => {
            if let Some(&highest) = value.last() {
                ap.raise_max_speed(u32::from(highest & 0x7F) / 2);
            }
        }
        TAG_DS_PARAMS => {
            if let Some(&channel) = value.first() {
                ap.channel = Some(channel);
            }
        }
        TAG_HT_OPERATION => {
            ap.standard.get_or_insert(Standard::N);
            if let Some(&primary) = value.first() {
                ap.channel = Some(primary);
            }
            if let Some(&info) = value.get(1) {
                apply_ht_operation_info(ap, info);
            }
        }
        TAG_HT_CAPABILITIES if value.len() > 18 => {
            ap.standard.get_or_insert(Standard::N);
            let capability = value[0];
            ap.phy.short_gi_20 = capability & 0x20 != 0;
            ap.phy.short_gi_40 = capability & 0x40 != 0;

            if ap.phy.ht_mcs_index.is_none() {
                let rx_mcs = u32::from_le_bytes([value[3], value[4], value[5], value[6]]);
                if rx_mcs != 0 {
                    ap.phy.ht_mcs_index = Some((31 - rx_mcs.leading_zeros()) as u8);
                }
            }
        }
        TAG_VHT_CAPABILITIES if value.len() >= 12 => {
            ap.standard = Some(Standard::Ac);
            let capability = value[0];
            ap.phy.split_channel = (capability >> 2) & 0x03;
            ap.phy.short_gi_80 = capability & 0x20 != 0;
            ap.phy.short_gi_160 = capability & 0x40 != 0;

            // two bits per spatial stream, 3 = unsupported
            let mut tx_mcs = u16::from_le_bytes([value[8], value[9]]);
            for slot in ap.phy.vht_mcs.iter_mut() {
                let support = (tx_mcs & 0x03) as u8;
                if support == 3 {
                    break;
                }
                *slot = 7 + support;
                tx_mcs >>= 2;
            }
        }
        TAG_VHT_OPERATION if value.len() >= 3 => {
            ap.standard = Some(Standard::Ac);
            match value[0] {
                0 => ap.channel_width = ChannelWidth::Mhz20Or40,
                1 => ap.channel_width = ChannelWidth::Mhz80,
                2 => ap.channel_width = ChannelWidth::Mhz160,
                3 => {
                    ap.channel_width = ChannelWidth::Mhz80Plus80;
                    ap.phy.split_channel = 1;
                }
                _ => {}
            }
            ap.phy.center_segments = [value[1], value[2]];
        }
        _ => {}
    }
}

fn apply_ht_operation_info(ap: &mut AccessPoint, info: u8) {
    let widen = |width: ChannelWidth| match width {
        ChannelWidth::Unknown | ChannelWidth::Mhz20 | ChannelWidth::Mhz20Or40 => ChannelWidth::Mhz40,
        wider => wider,
    };
    match info & 0x03 {
        0 => ap.channel_width = ChannelWidth::Mhz20,
        1 => {
            ap.secondary_channel = SecondaryChannel::Above;
            ap.channel_width = widen(ap.channel_width);
        }
        3 => {
            ap.secondary_channel = SecondaryChannel::Below;
            ap.channel_width = widen(ap.channel_width);
        }
        _ => {}
    }
    ap.phy.any_channel_width = (info >> 2) & 0x01 != 0;
}

/// Second pass over a beacon or probe response: WPA/RSN cipher and AKM
/// suites, QoS support and WPS.
pub fn parse_beacon_security(ap: &mut AccessPoint, frame: &[u8]) {
    if frame.len() <= BEACON_ELEMENTS_OFFSET + 2 {
        return;
    }

    for element in elements(frame, BEACON_ELEMENTS_OFFSET) {
        let is_wpa = element.len() >= 8 && element.is_vendor(&WPA_OUI_TYPE);
        if element.tag == TAG_RSN || is_wpa {
            if apply_cipher_suites(&mut ap.security, element, is_wpa).is_none() {
                tracing::debug!(target: "wifi", bssid = %ap.bssid, tag = element.tag, "suite_list_truncated");
                break;
            }
        } else if element.len() >= 8 && element.is_vendor(&WMM_OUI_TYPE) {
            ap.security.insert(Security::STD_QOS);
        } else if element.len() >= 4 && element.is_vendor(&WPS_OUI_TYPE) {
            parse_wps(&mut ap.wps, &element.data[WPS_OUI_TYPE.len()..]);
        }
    }
}

/// Apply one RSN or WPA element. `None` means a suite count ran past the
/// element and the walk should stop.
fn apply_cipher_suites(security: &mut Security, element: Element<'_>, is_wpa: bool) -> Option<()> {
    security.remove(Security::STD_WEP | Security::ENC_WEP | Security::STD_WPA);
    // the vendor form carries OUI and type before the version
    let offset = if is_wpa {
        security.insert(Security::STD_WPA);
        4
    } else {
        security.insert(Security::STD_WPA2);
        0
    };
    if element.len() < 18 + offset {
        return Some(());
    }

    // version and group cipher precede the pairwise count
    let mut cursor = ByteCursor::at(element.data, 6 + offset);
    let pairwise_count = usize::from(cursor.u16_le()?);
    let pairwise = cursor.take(pairwise_count.checked_mul(4)?)?;
    let akm_count = usize::from(cursor.u16_le()?);
    // RSN capabilities may follow; they are optional
    let akms = cursor.take(akm_count.checked_mul(4)?)?;

    for suite in pairwise.chunks_exact(4) {
        match suite[3] {
            0x01 => security.insert(Security::ENC_WEP),
            0x02 => {
                security.insert(Security::ENC_TKIP);
                security.remove(Security::STD_WPA2);
            }
            0x03 => security.insert(Security::ENC_WRAP),
            0x04 | 0x0A => security.insert(Security::ENC_CCMP | Security::STD_WPA2),
            0x05 => security.insert(Security::ENC_WEP104),
            0x08 | 0x09 => security.insert(Security::ENC_GCMP | Security::STD_WPA2),
            0x0B | 0x0C => security.insert(Security::ENC_GMAC | Security::STD_WPA2),
            _ => {}
        }
    }

    for suite in akms.chunks_exact(4) {
        match suite[3] {
            0x01 => security.insert(Security::AUTH_MGT),
            0x02 => security.insert(Security::AUTH_PSK),
            0x06 | 0x0d => security.insert(Security::AUTH_CMAC),
            0x08 => security.insert(Security::AUTH_SAE),
            0x12 => security.insert(Security::AUTH_OWE),
            _ => {}
        }
    }
    Some(())
}

/// Walk the big-endian type/length attributes of a WPS element body.
pub fn parse_wps(wps: &mut WpsInfo, body: &[u8]) {
    let mut cursor = ByteCursor::new(body);
    while cursor.remaining() >= 4 {
        let (Some(kind), Some(len)) = (cursor.u16_be(), cursor.u16_be()) else {
            break;
        };
        let Some(data) = cursor.take(usize::from(len)) else {
            break;
        };
        match kind {
            WPS_VERSION => {
                if let Some(&version) = data.first() {
                    wps.version = version;
                }
            }
            WPS_STATE => wps.state = data.first().copied().or(wps.state),
            WPS_AP_SETUP_LOCKED => {
                if let Some(&locked) = data.first() {
                    wps.setup_locked = locked != 0;
                }
            }
            WPS_CONFIG_METHODS | WPS_SELECTED_REGISTRAR_CONFIG_METHODS => {
                if let [hi, lo, ..] = *data {
                    wps.config_methods = u16::from_be_bytes([hi, lo]);
                }
            }
            WPS_VENDOR_EXTENSION if data.starts_with(&WFA_OUI) => {
                if let Some(version2) = wfa_version2(&data[WFA_OUI.len()..]) {
                    wps.version = version2;
                }
            }
            _ => {}
        }
    }
}

/// WFA sub-element 0 (Version2) inside a WPS vendor extension.
fn wfa_version2(data: &[u8]) -> Option<u8> {
    let mut cursor = ByteCursor::new(data);
    while !cursor.is_empty() {
        let element = cursor.next_element()?;
        if element.tag == 0 {
            return element.data.first().copied();
        }
    }
    None
}

/// Record ESSIDs from a probe request in the station's probe ring.
pub fn parse_probe_request(station: &mut Station, frame: &[u8]) {
    for element in elements(frame, HEADER_LEN) {
        if element.tag != TAG_SSID || !is_broadcast_essid(element.data) {
            continue;
        }
        let essid = &element.data[..element.len().min(ESSID_LENGTH)];
        if has_control_chars(essid) {
            return;
        }
        if station.probes.record(essid) {
            tracing::trace!(target: "wifi", station = %station.mac, essid = %String::from_utf8_lossy(essid), "probe_recorded");
        }
    }
}

/// Association request: learn the ESSID and restart the handshake capture.
pub fn parse_association_request(ap: Option<&mut AccessPoint>, station: Option<&mut Station>, frame: &[u8]) {
    if frame.len() <= ASSOC_REQUEST_ELEMENTS_OFFSET {
        return;
    }
    if let Some(ap) = ap {
        let essid = elements(frame, ASSOC_REQUEST_ELEMENTS_OFFSET)
            .filter(|element| element.tag == TAG_SSID && is_broadcast_essid(element.data))
            .last();
        if let Some(element) = essid {
            ap.set_essid(element.data);
        }
    }
    if let Some(station) = station {
        station.handshake.reset();
    }
}

/// Successful authentication response from a WEP AP reveals open or shared
/// key authentication.
pub fn parse_authentication_response(ap: &mut AccessPoint, frame: &[u8]) {
    if frame.len() < 30 || !ap.security.contains(Security::STD_WEP) {
        return;
    }
    let algorithm = frame[24];
    let transaction = frame[26];
    let status = [frame[28], frame[29]];
    if status != [0, 0] || !matches!(transaction, 2 | 4) {
        return;
    }
    ap.security
        .remove(Security::AUTH_OPN | Security::AUTH_PSK | Security::AUTH_MGT);
    match algorithm {
        0 => ap.security.insert(Security::AUTH_OPN),
        1 => ap.security.insert(Security::AUTH_PSK),
        _ => {}
    }
}
