//! Accumulated security posture of an access point.
//!
//! Evidence from beacons, data frames and authentication responses is
//! OR-ed into one bitmask. Specific observations clear provisional guesses
//! (an RSN element drops the WEP flags set from a privacy bit).

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Serialize, Serializer};

use crate::error::{Result, WirelessError};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Security(u32);

impl Security {
    pub const NONE: Security = Security(0);

    pub const STD_OPN: Security = Security(0x0001);
    pub const STD_WEP: Security = Security(0x0002);
    pub const STD_WPA: Security = Security(0x0004);
    pub const STD_WPA2: Security = Security(0x0008);
    pub const STD_FIELD: Security = Security(0x000F);

    pub const ENC_WEP: Security = Security(0x0010);
    pub const ENC_TKIP: Security = Security(0x0020);
    pub const ENC_WRAP: Security = Security(0x0040);
    pub const ENC_CCMP: Security = Security(0x0080);
    pub const ENC_WEP104: Security = Security(0x0100);
    pub const ENC_WEP40: Security = Security(0x1000);
    pub const ENC_GCMP: Security = Security(0x4000);
    pub const ENC_GMAC: Security = Security(0x8000);

    pub const AUTH_OPN: Security = Security(0x0200);
    pub const AUTH_PSK: Security = Security(0x0400);
    pub const AUTH_MGT: Security = Security(0x0800);
    pub const AUTH_CMAC: Security = Security(0x1_0000);
    pub const AUTH_SAE: Security = Security(0x2_0000);
    pub const AUTH_OWE: Security = Security(0x4_0000);

    pub const STD_QOS: Security = Security(0x2000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Any of the bits in `other` set
    pub const fn intersects(&self, other: Security) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(&self, other: Security) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Security) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Security) {
        self.0 &= !other.0;
    }

    /// Has any protocol-standard bit been established yet
    pub fn has_standard(&self) -> bool {
        self.intersects(Self::STD_FIELD)
    }

    /// Names of the set bits, in display order.
    pub fn labels(&self) -> Vec<&'static str> {
        LABELS
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }
}

const LABELS: [(Security, &str); 19] = [
    (Security::STD_OPN, "OPN"),
    (Security::STD_WEP, "WEP"),
    (Security::STD_WPA, "WPA"),
    (Security::STD_WPA2, "WPA2"),
    (Security::ENC_WEP, "WEP"),
    (Security::ENC_WEP40, "WEP40"),
    (Security::ENC_WEP104, "WEP104"),
    (Security::ENC_TKIP, "TKIP"),
    (Security::ENC_WRAP, "WRAP"),
    (Security::ENC_CCMP, "CCMP"),
    (Security::ENC_GCMP, "GCMP"),
    (Security::ENC_GMAC, "GMAC"),
    (Security::AUTH_OPN, "OPN"),
    (Security::AUTH_PSK, "PSK"),
    (Security::AUTH_MGT, "MGT"),
    (Security::AUTH_CMAC, "CMAC"),
    (Security::AUTH_SAE, "SAE"),
    (Security::AUTH_OWE, "OWE"),
    (Security::STD_QOS, "QOS"),
];

impl BitOr for Security {
    type Output = Security;

    fn bitor(self, rhs: Security) -> Security {
        Security(self.0 | rhs.0)
    }
}

impl BitOrAssign for Security {
    fn bitor_assign(&mut self, rhs: Security) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Security {
    type Output = Security;

    fn bitand(self, rhs: Security) -> Security {
        Security(self.0 & rhs.0)
    }
}

impl Not for Security {
    type Output = Security;

    fn not(self) -> Security {
        Security(!self.0)
    }
}

impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Security({:#x} {:?})", self.0, self.labels())
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join(" "))
    }
}

impl Serialize for Security {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a comma separated encryption filter such as `wpa2,owe`.
pub fn parse_encryption_filter(spec: &str) -> Result<Security> {
    let mut filter = Security::NONE;
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        filter |= match token.to_ascii_lowercase().as_str() {
            "opn" => Security::STD_OPN,
            "wep" => Security::STD_WEP,
            "wpa" => Security::STD_WPA | Security::STD_WPA2 | Security::AUTH_SAE,
            "wpa1" => Security::STD_WPA,
            "wpa2" => Security::STD_WPA2,
            "wpa3" => Security::AUTH_SAE,
            "owe" => Security::AUTH_OWE,
            other => {
                return Err(WirelessError::filter(format!(
                    "unknown encryption '{}'",
                    other
                )))
            }
        };
    }
    Ok(filter)
}

/// An empty filter, or an AP with nothing known yet, always passes.
pub fn ap_has_required_security(ap_security: Security, required: Security) -> bool {
    ap_security.is_empty() || required.is_empty() || ap_security.intersects(required)
}
