//! Numeric codecs shared by the attribute and MAPI decoders.

use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, TimeZone, Utc};

/// 100-nanosecond intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: u64 = 0x019d_b1de_d53e_8000;

/// Seconds between 1601-01-01 and 1970-01-01.
const SECONDS_1601_TO_1970: i64 = 11_644_473_600;

pub fn le_i16(bytes: &[u8]) -> i16 {
    LittleEndian::read_i16(bytes)
}

pub fn le_i32(bytes: &[u8]) -> i32 {
    LittleEndian::read_i32(bytes)
}

pub fn le_i64(bytes: &[u8]) -> i64 {
    LittleEndian::read_i64(bytes)
}

/// Decode an IEEE-754 single from its little-endian byte order.
pub fn le_f32(bytes: &[u8]) -> f32 {
    f32::from_bits(LittleEndian::read_u32(bytes))
}

/// Decode an IEEE-754 double from its little-endian byte order.
pub fn le_f64(bytes: &[u8]) -> f64 {
    f64::from_bits(LittleEndian::read_u64(bytes))
}

/// Convert a Windows FILETIME to a UTC timestamp with millisecond precision.
///
/// Values before the Unix epoch are supported; values outside chrono's
/// range yield `None`.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let millis = (filetime as i128 - FILETIME_UNIX_EPOCH as i128) / 10_000;
    let millis = i64::try_from(millis).ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Convert a count of minutes since 1601-01-01 to a UTC timestamp.
pub fn minutes_1601_to_datetime(minutes: u32) -> Option<DateTime<Utc>> {
    let secs = (minutes as i64 - SECONDS_1601_TO_1970 / 60) * 60;
    Utc.timestamp_opt(secs, 0).single()
}

/// Lowercase hex encoding without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Standard base64 with padding.
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
