//! WPA handshake export types.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WpaError};
use crate::hex;

/// Which pair of 4-way messages the nonce and the EAPOL body came from.
///
/// Values follow the hashcat 22000 `MESSAGEPAIR` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessagePair {
    /// ANonce from message 1, EAPOL from message 2.
    M1M2 = 0x00,
    /// ANonce from message 3, EAPOL from message 2.
    M2M3Authorized = 0x02,
    /// SNonce from message 2, EAPOL from message 3.
    M2M3 = 0x03,
}

impl MessagePair {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::M1M2),
            0x02 => Some(Self::M2M3Authorized),
            0x03 => Some(Self::M2M3),
            _ => None,
        }
    }
}

/// Exported handshake data for cracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeExport {
    /// Access Point BSSID.
    pub bssid: [u8; 6],
    /// Client MAC address.
    pub client_mac: [u8; 6],
    /// Network name, raw bytes.
    pub essid: Vec<u8>,
    /// Nonce of the side that did not send the EAPOL body.
    pub nonce: [u8; 32],
    /// MIC taken from the EAPOL body before it was zeroed.
    pub mic: [u8; 16],
    /// Raw EAPOL frame with the MIC field zeroed.
    pub eapol_data: Vec<u8>,
    /// Key descriptor version (1 = HMAC-MD5/RC4, 2 = HMAC-SHA1/AES, 3 = AES-CMAC).
    pub key_version: u8,
    pub message_pair: MessagePair,
}

impl HandshakeExport {
    /// Convert to hashcat format (22000).
    pub fn to_hashcat_22000(&self) -> String {
        format!(
            "WPA*02*{}*{}*{}*{}*{}*{}*{:02x}",
            hex::encode(&self.mic),
            hex::encode(&self.bssid),
            hex::encode(&self.client_mac),
            hex::encode(&self.essid),
            hex::encode(&self.nonce),
            hex::encode(&self.eapol_data),
            self.message_pair as u8
        )
    }

    /// Parse a `WPA*02*` line produced by [`HandshakeExport::to_hashcat_22000`].
    ///
    /// The key descriptor version is recovered from the key information
    /// field of the stored EAPOL body.
    pub fn from_hashcat_22000(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split('*').collect();
        if fields.len() != 9 || fields[0] != "WPA" || fields[1] != "02" {
            return Err(WpaError::MalformedLine(line.to_string()));
        }
        let eapol_data = hex::decode("eapol", fields[7])?;
        let pair = hex::decode_fixed::<1>("message_pair", fields[8])?;
        let message_pair = MessagePair::from_u8(pair[0])
            .ok_or_else(|| WpaError::MalformedLine(line.to_string()))?;
        let key_version = eapol_data.get(6).map(|b| b & 0x07).unwrap_or(0);

        Ok(Self {
            mic: hex::decode_fixed("mic", fields[2])?,
            bssid: hex::decode_fixed("bssid", fields[3])?,
            client_mac: hex::decode_fixed("client", fields[4])?,
            essid: hex::decode("essid", fields[5])?,
            nonce: hex::decode_fixed("nonce", fields[6])?,
            eapol_data,
            key_version,
            message_pair,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HandshakeExport {
        let mut eapol = vec![0u8; 99];
        eapol[0] = 0x01;
        eapol[1] = 0x03;
        eapol[5] = 0x01;
        eapol[6] = 0x0a;
        HandshakeExport {
            bssid: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            client_mac: [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb],
            essid: b"home".to_vec(),
            nonce: [0xab; 32],
            mic: [0xcd; 16],
            eapol_data: eapol,
            key_version: 2,
            message_pair: MessagePair::M1M2,
        }
    }

    #[test]
    fn test_hashcat_line_layout() {
        let line = sample().to_hashcat_22000();
        let fields: Vec<&str> = line.split('*').collect();
        assert_eq!(fields[0], "WPA");
        assert_eq!(fields[1], "02");
        assert_eq!(fields[2], "cd".repeat(16));
        assert_eq!(fields[3], "001122334455");
        assert_eq!(fields[4], "66778899aabb");
        assert_eq!(fields[5], "686f6d65");
        assert_eq!(fields[8], "00");
    }

    #[test]
    fn test_parse_line_back() {
        let export = sample();
        let parsed = HandshakeExport::from_hashcat_22000(&export.to_hashcat_22000()).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn test_reject_pmkid_line() {
        assert!(HandshakeExport::from_hashcat_22000("WPA*01*00*11*22*33***").is_err());
    }
}
