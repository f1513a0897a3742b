//! PMKID export records.
//!
//! The PMKID travels in the key data of EAPOL message 1, so a single frame
//! from the AP is enough to attempt offline recovery.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WpaError};
use crate::hex;

/// PMKID observed in an EAPOL message 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmkidExport {
    pub bssid: [u8; 6],
    pub client_mac: [u8; 6],
    pub essid: Vec<u8>,
    pub pmkid: [u8; 16],
    pub key_version: u8,
}

impl PmkidExport {
    /// Format: `WPA*01*PMKID*BSSID*CLIENT*ESSID_HEX***`
    pub fn to_hashcat_22000(&self) -> String {
        format!(
            "WPA*01*{}*{}*{}*{}***",
            hex::encode(&self.pmkid),
            hex::encode(&self.bssid),
            hex::encode(&self.client_mac),
            hex::encode(&self.essid)
        )
    }

    pub fn from_hashcat_22000(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split('*').collect();
        if fields.len() < 6 || fields[0] != "WPA" || fields[1] != "01" {
            return Err(WpaError::MalformedLine(line.to_string()));
        }
        Ok(Self {
            pmkid: hex::decode_fixed("pmkid", fields[2])?,
            bssid: hex::decode_fixed("bssid", fields[3])?,
            client_mac: hex::decode_fixed("client", fields[4])?,
            essid: hex::decode("essid", fields[5])?,
            key_version: 0,
        })
    }
}
