//! Compressed RTF (`PR_RTF_COMPRESSED`) decoding.
//!
//! The payload starts with a 16-byte header:
//!
//! | Offset | Field     | Notes                                   |
//! |--------|-----------|-----------------------------------------|
//! | 0      | comp_size | payload length minus 4                  |
//! | 4      | raw_size  | decompressed length                     |
//! | 8      | magic     | `LZFu` (compressed) or `MELA` (stored)  |
//! | 12     | crc       | CRC32 of the bytes after the header     |
//!
//! Compressed data is an LZ77 variant whose 4096-byte window is pre-filled
//! with a fixed RTF prologue.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::error::{Result, TnefError};

/// `LZFu`
pub const COMPRESSED_MAGIC: u32 = 0x7546_5a4c;
/// `MELA`
pub const UNCOMPRESSED_MAGIC: u32 = 0x414c_454d;

const HEADER_LEN: usize = 16;
const WINDOW: usize = 4096;

/// Dictionary the decompressor window starts with.
pub const RTF_PREBUF: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArialTimes New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

static CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xedb8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// CRC32 as used by compressed RTF: reflected 0xEDB88320 polynomial,
/// zero initial value and no final inversion.
pub fn crc32(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &b| {
        CRC_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8)
    })
}

/// The fixed header in front of every compressed RTF payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtfHeader {
    pub comp_size: u32,
    pub raw_size: u32,
    pub magic: u32,
    pub crc: u32,
}

impl RtfHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            comp_size: LittleEndian::read_u32(&data[0..4]),
            raw_size: LittleEndian::read_u32(&data[4..8]),
            magic: LittleEndian::read_u32(&data[8..12]),
            crc: LittleEndian::read_u32(&data[12..16]),
        })
    }
}

/// Sniff test: does `data` carry one of the two RTF magics?
pub fn is_rtf_data(data: &[u8]) -> bool {
    RtfHeader::parse(data)
        .map(|h| h.magic == COMPRESSED_MAGIC || h.magic == UNCOMPRESSED_MAGIC)
        .unwrap_or(false)
}

/// Decode a `PR_RTF_COMPRESSED` payload to raw RTF bytes.
///
/// Returns `Ok(None)` when the magic is not recognized. Fails with
/// [`TnefError::SizeMismatch`] when the header's size field disagrees with
/// the payload length.
pub fn decompress(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let header = RtfHeader::parse(data).ok_or(TnefError::OutOfData {
        requested: HEADER_LEN,
        available: data.len(),
    })?;

    if header.comp_size as u64 + 4 != data.len() as u64 {
        warn!(
            declared = header.comp_size,
            actual = data.len(),
            "Compressed RTF size does not match payload"
        );
        return Err(TnefError::SizeMismatch {
            declared: header.comp_size,
            actual: data.len(),
        });
    }

    let body = &data[HEADER_LEN..];
    let raw_size = header.raw_size as usize;

    match header.magic {
        UNCOMPRESSED_MAGIC => Ok(Some(body[..raw_size.min(body.len())].to_vec())),
        COMPRESSED_MAGIC => {
            let crc = crc32(body);
            if crc != header.crc {
                warn!(
                    expected = header.crc,
                    computed = crc,
                    "Compressed RTF CRC mismatch"
                );
            }
            Ok(Some(lz_decompress(body, raw_size)))
        }
        other => {
            debug!(magic = other, "Unknown RTF magic");
            Ok(None)
        }
    }
}

fn lz_decompress(src: &[u8], raw_size: usize) -> Vec<u8> {
    let prebuf_len = RTF_PREBUF.len();
    let target = prebuf_len.saturating_add(raw_size);
    // raw_size comes from the stream; a 2-byte back-reference yields at most 17 bytes
    let mut out = Vec::with_capacity(prebuf_len + raw_size.min(src.len().saturating_mul(9)));
    out.extend_from_slice(RTF_PREBUF);

    let mut pos = 0usize;
    let mut flags = 0u8;
    let mut flag_count = 0usize;

    'outer: while out.len() < target {
        if flag_count % 8 == 0 {
            match src.get(pos) {
                Some(&b) => flags = b,
                None => break,
            }
            pos += 1;
        } else {
            flags >>= 1;
        }
        flag_count += 1;

        if flags & 1 == 0 {
            match src.get(pos) {
                Some(&b) => out.push(b),
                None => break,
            }
            pos += 1;
            continue;
        }

        let (hi, lo) = match (src.get(pos), src.get(pos + 1)) {
            (Some(&hi), Some(&lo)) => (hi as usize, lo as usize),
            _ => break,
        };
        pos += 2;

        let offset = (hi << 4) | (lo >> 4);
        let length = (lo & 0x0f) + 2;

        // end marker
        if offset == out.len() % WINDOW {
            break;
        }

        let mut from = (out.len() & !(WINDOW - 1)) as isize + offset as isize;
        if from >= out.len() as isize {
            from -= WINDOW as isize;
        }
        for _ in 0..length {
            if out.len() >= target {
                break 'outer;
            }
            let byte = if from < 0 { 0 } else { out[from as usize] };
            out.push(byte);
            from += 1;
        }
    }

    out.drain(..prebuf_len);
    out.truncate(raw_size);
    out
}

/// Reduce RTF to iCalendar-escaped text.
///
/// Scanning starts at the first `\pard\plain` (or the beginning) with the
/// group depth reset to zero, and keeps only characters one group deep from
/// there. Control words are dropped, `\par` and `\line` become escaped
/// newlines, and `;`, `,` and `\` are escaped.
pub fn rtf_to_escaped_text(rtf: &[u8]) -> String {
    let start = find(rtf, b"\\pard\\plain").unwrap_or(0);
    let mut depth: i32 = 0;

    let mut text = Vec::new();
    let mut i = start;
    while i < rtf.len() {
        let c = rtf[i];
        match c {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            b'\\' => {
                let next = rtf.get(i + 1).copied();
                match next {
                    Some(n) if n.is_ascii_alphabetic() => {
                        let word_start = i + 1;
                        let mut j = word_start;
                        while j < rtf.len() && rtf[j].is_ascii_alphabetic() {
                            j += 1;
                        }
                        let word = &rtf[word_start..j];
                        if j < rtf.len() && rtf[j] == b'-' {
                            j += 1;
                        }
                        while j < rtf.len() && rtf[j].is_ascii_digit() {
                            j += 1;
                        }
                        if j < rtf.len() && rtf[j] == b' ' {
                            j += 1;
                        }
                        if depth == 1 && (word == b"par" || word == b"line") {
                            text.extend_from_slice(b"\\n");
                        }
                        i = j;
                        continue;
                    }
                    Some(b'\'') => {
                        let hex = rtf.get(i + 2..i + 4).and_then(|h| {
                            std::str::from_utf8(h)
                                .ok()
                                .and_then(|s| u8::from_str_radix(s, 16).ok())
                        });
                        if let (Some(b), true) = (hex, depth == 1) {
                            text.push(b);
                        }
                        i += 4;
                        continue;
                    }
                    Some(sym @ (b'\\' | b'{' | b'}')) => {
                        if depth == 1 {
                            push_escaped(&mut text, sym);
                        }
                        i += 2;
                        continue;
                    }
                    _ => {
                        i += 2;
                        continue;
                    }
                }
            }
            b'\r' | b'\n' => {}
            _ if depth == 1 => push_escaped(&mut text, c),
            _ => {}
        }
        i += 1;
    }

    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&text);
    decoded.trim_end().to_string()
}

fn push_escaped(out: &mut Vec<u8>, c: u8) {
    match c {
        b';' | b',' | b'\\' => {
            out.push(b'\\');
            out.push(c);
        }
        _ => out.push(c),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
