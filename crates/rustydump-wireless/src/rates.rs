//! 802.11n/ac PHY rate computation.
//!
//! Rates are derived from the OFDM parameters rather than stored tables:
//! data subcarriers x coded bits per subcarrier x streams / symbol time.

use serde::Serialize;

/// PHY generation advertised by an AP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standard {
    /// HT (802.11n)
    N,
    /// VHT (802.11ac)
    Ac,
}

impl Standard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N => "n",
            Self::Ac => "ac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ChannelWidth {
    #[default]
    Unknown,
    Mhz20,
    /// VHT operation width 0: 20 or 40 MHz depending on the HT element
    Mhz20Or40,
    Mhz40,
    Mhz80,
    Mhz80Plus80,
    Mhz160,
}

impl ChannelWidth {
    /// Width used to look up rates, in MHz
    pub fn rate_width(&self) -> Option<u16> {
        match self {
            Self::Mhz20 => Some(20),
            Self::Mhz20Or40 | Self::Mhz40 => Some(40),
            Self::Mhz80 => Some(80),
            Self::Mhz80Plus80 | Self::Mhz160 => Some(160),
            Self::Unknown => None,
        }
    }
}

/// Position of the HT secondary channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SecondaryChannel {
    #[default]
    None,
    Above,
    Below,
}

// Coded bits per subcarrier for MCS 0-9, scaled by 6 to stay integral.
const BITS_PER_SUBCARRIER_X6: [u32; 10] = [3, 6, 9, 12, 18, 24, 27, 30, 36, 40];

fn data_subcarriers(width: u16) -> Option<u32> {
    match width {
        20 => Some(52),
        40 => Some(108),
        80 => Some(234),
        160 => Some(468),
        _ => None,
    }
}

fn ofdm_rate(width: u16, short_gi: bool, modulation: usize, streams: u8) -> Option<f32> {
    let subcarriers = data_subcarriers(width)?;
    let bits_x6 = *BITS_PER_SUBCARRIER_X6.get(modulation)?;
    // symbol time in tenths of a microsecond
    let symbol = if short_gi { 36 } else { 40 };
    let numerator = subcarriers * bits_x6 * u32::from(streams) * 10;
    Some(numerator as f32 / (6 * symbol) as f32)
}

/// HT rate in Mbit/s for MCS 0-31 at 20 or 40 MHz.
pub fn ht_rate(width: u16, short_gi: bool, mcs: u8) -> Option<f32> {
    if mcs > 31 || !matches!(width, 20 | 40) {
        return None;
    }
    ofdm_rate(width, short_gi, (mcs % 8) as usize, mcs / 8 + 1)
}

/// VHT rate in Mbit/s for MCS 0-9 and 1-8 spatial streams.
///
/// Combinations the standard leaves undefined return `None`.
pub fn vht_rate(width: u16, short_gi: bool, mcs: u8, streams: u8) -> Option<f32> {
    if mcs > 9 || !(1..=8).contains(&streams) {
        return None;
    }
    let invalid = match (width, mcs) {
        (20, 9) => !matches!(streams, 3 | 6),
        (80, 6) => matches!(streams, 3 | 7),
        (80, 9) => streams == 6,
        (160, 9) => streams == 3,
        _ => false,
    };
    if invalid {
        return None;
    }
    ofdm_rate(width, short_gi, mcs as usize, streams)
}

/// Short guard interval flags and per-stream MCS support gathered from
/// HT/VHT elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhyCapabilities {
    pub short_gi_20: bool,
    pub short_gi_40: bool,
    pub short_gi_80: bool,
    pub short_gi_160: bool,
    /// Highest HT MCS index (from the RX MCS bitmask)
    pub ht_mcs_index: Option<u8>,
    /// Highest VHT MCS per spatial stream; 0 = stream unsupported
    pub vht_mcs: [u8; 8],
    pub any_channel_width: bool,
    pub split_channel: u8,
    pub center_segments: [u8; 2],
}

impl PhyCapabilities {
    pub fn vht_streams(&self) -> u8 {
        self.vht_mcs.iter().take_while(|&&mcs| mcs != 0).count() as u8
    }

    /// Maximum PHY rate for the standard and width, truncated to Mbit/s.
    pub fn max_rate(&self, standard: Standard, width: ChannelWidth) -> Option<u32> {
        let w = width.rate_width()?;
        let sgi = match w {
            20 => self.short_gi_20,
            40 => self.short_gi_40,
            80 => self.short_gi_80,
            _ => self.short_gi_160,
        };
        let rate = match standard {
            Standard::N => ht_rate(w, sgi, self.ht_mcs_index?)?,
            Standard::Ac => {
                let streams = self.vht_streams();
                let mcs = *self.vht_mcs.get(usize::from(streams).checked_sub(1)?)?;
                vht_rate(w, sgi, mcs, streams)?
            }
        };
        (rate > 0.0).then_some(rate as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ht_rates_match_tables() {
        assert_eq!(ht_rate(20, false, 0).map(|r| r as u32), Some(6));
        assert_eq!(ht_rate(20, false, 7).map(|r| r as u32), Some(65));
        assert_eq!(ht_rate(20, true, 7).map(|r| r as u32), Some(72));
        assert_eq!(ht_rate(40, true, 15).map(|r| r.round() as u32), Some(300));
        assert_eq!(ht_rate(40, false, 31).map(|r| r as u32), Some(540));
        assert_eq!(ht_rate(80, false, 7), None);
        assert_eq!(ht_rate(20, false, 32), None);
    }

    #[test]
    fn test_vht_rates_match_tables() {
        assert_eq!(vht_rate(80, true, 9, 1).map(|r| r as u32), Some(433));
        assert_eq!(vht_rate(80, false, 9, 2).map(|r| r as u32), Some(780));
        assert_eq!(vht_rate(160, true, 9, 8).map(|r| r.round() as u32), Some(6933));
        assert_eq!(vht_rate(20, false, 9, 1), None);
        assert!(vht_rate(20, false, 9, 3).is_some());
        assert_eq!(vht_rate(80, false, 6, 3), None);
    }

    #[test]
    fn test_max_rate_needs_width_and_mcs() {
        let mut caps = PhyCapabilities::default();
        assert_eq!(caps.max_rate(Standard::N, ChannelWidth::Mhz20), None);
        caps.ht_mcs_index = Some(15);
        assert_eq!(caps.max_rate(Standard::N, ChannelWidth::Unknown), None);
        assert_eq!(caps.max_rate(Standard::N, ChannelWidth::Mhz20), Some(130));

        caps.vht_mcs = [9, 9, 0, 0, 0, 0, 0, 0];
        caps.short_gi_80 = true;
        assert_eq!(caps.vht_streams(), 2);
        assert_eq!(caps.max_rate(Standard::Ac, ChannelWidth::Mhz80), Some(866));
    }
}
