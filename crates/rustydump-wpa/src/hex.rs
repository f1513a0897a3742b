use crate::error::{Result, WpaError};

pub(crate) fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub(crate) fn decode(field: &'static str, value: &str) -> Result<Vec<u8>> {
    let invalid = || WpaError::InvalidHex {
        field,
        value: value.to_string(),
    };
    if value.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            value
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(&invalid)
        })
        .collect()
}

pub(crate) fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let bytes = decode(field, value)?;
    bytes.try_into().map_err(|_| WpaError::InvalidHex {
        field,
        value: value.to_string(),
    })
}
