//! Active scan probe requests

use rand::Rng;

use crate::frames::MacAddress;

/// Supported (1, 2, 5.5, 11) and extended (6 to 54 Mbit/s) rates
const RATES: [u8; 16] = [
    0x01, 0x04, 0x02, 0x04, 0x0B, 0x16, 0x32, 0x08, 0x0C, 0x12, 0x18, 0x24, 0x30, 0x48, 0x60, 0x6C,
];

/// Source MAC used for a probe: first byte zero, the rest random.
pub fn random_source<R: Rng>(rng: &mut R) -> MacAddress {
    let mut mac = [0u8; 6];
    rng.fill(&mut mac[1..]);
    MacAddress(mac)
}

/// Broadcast probe request with a wildcard SSID.
pub fn build_probe_request<R: Rng>(rng: &mut R) -> Vec<u8> {
    let source = random_source(rng);

    let mut frame = Vec::with_capacity(24 + 2 + RATES.len());
    frame.extend_from_slice(&[0x40, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(MacAddress::BROADCAST.as_bytes());
    frame.extend_from_slice(source.as_bytes());
    frame.extend_from_slice(MacAddress::BROADCAST.as_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    // SSID, zero length
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&RATES);

    tracing::trace!(target: "wifi", source = %source, "probe_request_built");
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{locate, FrameControl, FrameSubtype};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_probe_request_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = build_probe_request(&mut rng);
        assert_eq!(frame.len(), 42);

        let fc = FrameControl::parse(&frame).unwrap();
        assert!(fc.is_management(FrameSubtype::ProbeRequest));
        let location = locate(&frame).unwrap();
        assert!(location.bssid.is_broadcast());
        let source = location.station.unwrap();
        assert_eq!(source.0[0], 0x00);
        assert_eq!(&frame[24..26], &[0x00, 0x00]);
        assert_eq!(frame[26], 0x01);
    }

    #[test]
    fn test_sources_differ() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_source(&mut rng);
        let b = random_source(&mut rng);
        assert_ne!(a, b);
    }
}
