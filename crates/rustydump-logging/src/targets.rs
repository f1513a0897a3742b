//! Subsystem targets. Events logged under one of these go to their own file
//! and are kept out of the component log.

pub const T_WIFI: &str = "wifi";
pub const T_CRYPTO: &str = "crypto";
pub const T_CAPTURE: &str = "capture";

pub const SUBSYSTEMS: [(&str, &str); 3] = [
    (T_WIFI, "wifi.log"),
    (T_CRYPTO, "crypto.log"),
    (T_CAPTURE, "capture.log"),
];
