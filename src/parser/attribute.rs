//! TNEF attribute records.
//!
//! Every record in the stream after the signature and key has this layout:
//!
//! | Size | Field    |
//! |------|----------|
//! | 1    | level    |
//! | 2    | name     |
//! | 2    | type     |
//! | 4    | length   |
//! | n    | payload  |
//! | 2    | checksum |

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, NaiveDate, Utc};

use super::cursor::ByteCursor;
use crate::error::{Result, TnefError};

/// Magic at the start of every TNEF stream.
pub const TNEF_SIGNATURE: u32 = 0x223e_9f78;

/// Size of level + name + type + length.
pub const ATTRIBUTE_HEADER_LEN: usize = 9;

pub const ATTR_OWNER: u16 = 0x0000;
pub const ATTR_SENTFOR: u16 = 0x0001;
pub const ATTR_DELEGATE: u16 = 0x0002;
pub const ATTR_DATE_START: u16 = 0x0006;
pub const ATTR_DATE_END: u16 = 0x0007;
pub const ATTR_APPT_ID_OWNER: u16 = 0x0008;
pub const ATTR_REQUEST_RESP: u16 = 0x0009;
pub const ATTR_FROM: u16 = 0x8000;
pub const ATTR_SUBJECT: u16 = 0x8004;
pub const ATTR_DATE_SENT: u16 = 0x8005;
pub const ATTR_DATE_RECD: u16 = 0x8006;
pub const ATTR_MESSAGE_STATUS: u16 = 0x8007;
pub const ATTR_MESSAGE_CLASS: u16 = 0x8008;
pub const ATTR_MESSAGE_ID: u16 = 0x8009;
pub const ATTR_PARENT_ID: u16 = 0x800a;
pub const ATTR_CONVERSATION_ID: u16 = 0x800b;
pub const ATTR_BODY: u16 = 0x800c;
pub const ATTR_PRIORITY: u16 = 0x800d;
pub const ATTR_ATTACH_DATA: u16 = 0x800f;
pub const ATTR_ATTACH_TITLE: u16 = 0x8010;
pub const ATTR_ATTACH_METAFILE: u16 = 0x8011;
pub const ATTR_ATTACH_CREATE_DATE: u16 = 0x8012;
pub const ATTR_ATTACH_MODIFY_DATE: u16 = 0x8013;
pub const ATTR_DATE_MODIFY: u16 = 0x8020;
pub const ATTR_ATTACH_TRANSPORT_FILENAME: u16 = 0x9001;
pub const ATTR_ATTACH_REND_DATA: u16 = 0x9002;
pub const ATTR_MAPI_PROPS: u16 = 0x9003;
pub const ATTR_RECIPTABLE: u16 = 0x9004;
pub const ATTR_ATTACHMENT: u16 = 0x9005;
pub const ATTR_TNEF_VERSION: u16 = 0x9006;
pub const ATTR_OEM_CODEPAGE: u16 = 0x9007;
pub const ATTR_ORIGINAL_MESSAGE_CLASS: u16 = 0x9008;

/// Which object an attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrLevel {
    Message,
    Attachment,
}

impl AttrLevel {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Message),
            0x02 => Some(Self::Attachment),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "MESS",
            Self::Attachment => "ATTA",
        }
    }
}

/// Attribute payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Triples,
    String,
    Text,
    Date,
    Short,
    Long,
    Byte,
    Word,
    Dword,
    Unknown(u16),
}

impl AttrType {
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => Self::Triples,
            1 => Self::String,
            2 => Self::Text,
            3 => Self::Date,
            4 => Self::Short,
            5 => Self::Long,
            6 => Self::Byte,
            7 => Self::Word,
            8 => Self::Dword,
            other => Self::Unknown(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triples => "TRIPLES",
            Self::String => "STRING",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Short => "SHORT",
            Self::Long => "LONG",
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::Dword => "DWORD",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Human-readable attribute name, for diagnostics.
pub fn attr_name_to_str(name: u16) -> &'static str {
    match name {
        ATTR_OWNER => "OWNER",
        ATTR_SENTFOR => "SENTFOR",
        ATTR_DELEGATE => "DELEGATE",
        ATTR_DATE_START => "DATE_START",
        ATTR_DATE_END => "DATE_END",
        ATTR_APPT_ID_OWNER => "APPT_ID_OWNER",
        ATTR_REQUEST_RESP => "REQUEST_RESP",
        ATTR_FROM => "FROM",
        ATTR_SUBJECT => "SUBJECT",
        ATTR_DATE_SENT => "DATE_SENT",
        ATTR_DATE_RECD => "DATE_RECD",
        ATTR_MESSAGE_STATUS => "MESSAGE_STATUS",
        ATTR_MESSAGE_CLASS => "MESSAGE_CLASS",
        ATTR_MESSAGE_ID => "MESSAGE_ID",
        ATTR_PARENT_ID => "PARENT_ID",
        ATTR_CONVERSATION_ID => "CONVERSATION_ID",
        ATTR_BODY => "BODY",
        ATTR_PRIORITY => "PRIORITY",
        ATTR_ATTACH_DATA => "ATTACH_DATA",
        ATTR_ATTACH_TITLE => "ATTACH_TITLE",
        ATTR_ATTACH_METAFILE => "ATTACH_METAFILE",
        ATTR_ATTACH_CREATE_DATE => "ATTACH_CREATE_DATE",
        ATTR_ATTACH_MODIFY_DATE => "ATTACH_MODIFY_DATE",
        ATTR_DATE_MODIFY => "DATE_MODIFY",
        ATTR_ATTACH_TRANSPORT_FILENAME => "ATTACH_TRANSPORT_FILENAME",
        ATTR_ATTACH_REND_DATA => "ATTACH_REND_DATA",
        ATTR_MAPI_PROPS => "MAPI_PROPS",
        ATTR_RECIPTABLE => "RECIPTABLE",
        ATTR_ATTACHMENT => "ATTACHMENT",
        ATTR_TNEF_VERSION => "TNEF_VERSION",
        ATTR_OEM_CODEPAGE => "OEM_CODEPAGE",
        ATTR_ORIGINAL_MESSAGE_CLASS => "ORIGINAL_MESSAGE_CLASS",
        _ => "UNKNOWN",
    }
}

/// The fixed 9-byte prefix of an attribute record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeHeader {
    pub level: AttrLevel,
    pub name: u16,
    pub attr_type: AttrType,
    pub length: u32,
}

impl AttributeHeader {
    /// Read a header from `cur`. `stream_offset` is the absolute position of
    /// the cursor start, used only for error reporting.
    ///
    /// The caller must ensure [`ATTRIBUTE_HEADER_LEN`] bytes are available.
    pub fn read(cur: &mut ByteCursor<'_>, stream_offset: u64) -> Result<Self> {
        let at = stream_offset + cur.offset() as u64;
        let level_byte = cur.read_u8()?;
        let level = AttrLevel::from_byte(level_byte).ok_or(TnefError::MalformedAttribute {
            offset: at,
            level: level_byte,
        })?;
        let name = cur.read_u16_le()?;
        let attr_type = AttrType::from_u16(cur.read_u16_le()?);
        let length = cur.read_u32_le()?;
        Ok(Self {
            level,
            name,
            attr_type,
            length,
        })
    }
}

/// An attribute being assembled from one or more input chunks.
#[derive(Debug, Clone)]
pub struct RawAttribute {
    pub header: AttributeHeader,
    pub payload: Vec<u8>,
}

impl RawAttribute {
    pub fn new(header: AttributeHeader) -> Self {
        Self {
            header,
            payload: Vec::with_capacity((header.length as usize).min(1 << 20)),
        }
    }

    pub fn level(&self) -> AttrLevel {
        self.header.level
    }

    pub fn name(&self) -> u16 {
        self.header.name
    }

    /// Bytes still missing before the payload reaches its declared length.
    pub fn remaining(&self) -> usize {
        (self.header.length as usize).saturating_sub(self.payload.len())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Append up to [`remaining`](Self::remaining) bytes from `cur`.
    pub fn fill_from(&mut self, cur: &mut ByteCursor<'_>) -> Result<()> {
        let n = self.remaining().min(cur.available());
        self.payload.extend_from_slice(cur.read_bytes(n)?);
        Ok(())
    }

    pub fn checksum(&self) -> u16 {
        checksum(&self.payload)
    }

    /// Payload as a string with trailing NULs removed.
    ///
    /// TNEF strings are 8-bit; invalid UTF-8 is read as Windows-1252.
    pub fn as_string(&self) -> String {
        decode_8bit(trim_nuls(&self.payload))
    }

    /// First little-endian u32 of the payload.
    pub fn as_u32(&self) -> Option<u32> {
        self.payload.get(..4).map(LittleEndian::read_u32)
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        parse_tnef_date(&self.payload)
    }

    /// One-line dump for diagnostic logging.
    pub fn describe(&self) -> String {
        let p = &self.payload;
        let value = match self.header.attr_type {
            AttrType::Byte => p
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            AttrType::Short | AttrType::Word => p
                .chunks_exact(2)
                .map(|c| LittleEndian::read_u16(c).to_string())
                .collect::<Vec<_>>()
                .join(" "),
            AttrType::Long | AttrType::Dword => p
                .chunks_exact(4)
                .map(|c| LittleEndian::read_u32(c).to_string())
                .collect::<Vec<_>>()
                .join(" "),
            AttrType::Date => self
                .as_date()
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "<invalid date>".to_string()),
            AttrType::String | AttrType::Text => self.as_string(),
            AttrType::Triples => format!("<{} bytes of triples>", p.len()),
            AttrType::Unknown(_) => "<unknown type>".to_string(),
        };
        format!(
            "({}){}[type: {}] [len: {}] = {}",
            self.header.level.as_str(),
            attr_name_to_str(self.header.name),
            self.header.attr_type.as_str(),
            self.header.length,
            value
        )
    }
}

/// Sum of all bytes, modulo 65536.
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Decode a TNEF DATE payload: seven u16 fields
/// (year, month, day, hour, minute, second, weekday). The weekday is ignored.
pub fn parse_tnef_date(buf: &[u8]) -> Option<DateTime<Utc>> {
    if buf.len() < 12 {
        return None;
    }
    let field = |i: usize| LittleEndian::read_u16(&buf[i * 2..i * 2 + 2]) as u32;
    NaiveDate::from_ymd_opt(field(0) as i32, field(1), field(2))?
        .and_hms_opt(field(3), field(4), field(5))
        .map(|naive| naive.and_utc())
}

pub(crate) fn trim_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &bytes[..end]
}

/// UTF-8 if valid, otherwise Windows-1252 (which accepts every byte).
pub(crate) fn decode_8bit(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(level: u8, name: u16, ty: u16, len: u32) -> Vec<u8> {
        let mut v = vec![level];
        v.extend_from_slice(&name.to_le_bytes());
        v.extend_from_slice(&ty.to_le_bytes());
        v.extend_from_slice(&len.to_le_bytes());
        v
    }

    #[test]
    fn test_read_header() {
        let bytes = header_bytes(2, ATTR_ATTACH_TITLE, 1, 11);
        let mut cur = ByteCursor::new(&bytes);
        let h = AttributeHeader::read(&mut cur, 0).unwrap();
        assert_eq!(h.level, AttrLevel::Attachment);
        assert_eq!(h.name, ATTR_ATTACH_TITLE);
        assert_eq!(h.attr_type, AttrType::String);
        assert_eq!(h.length, 11);
    }

    #[test]
    fn test_bad_level_is_malformed() {
        let bytes = header_bytes(7, ATTR_BODY, 2, 0);
        let mut cur = ByteCursor::new(&bytes);
        let err = AttributeHeader::read(&mut cur, 22).unwrap_err();
        assert!(matches!(
            err,
            TnefError::MalformedAttribute {
                offset: 22,
                level: 7
            }
        ));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[1, 2, 3]), 6);
        let big = vec![0xffu8; 300];
        assert_eq!(checksum(&big), ((0xff * 300) % 65536) as u16);
    }

    #[test]
    fn test_fill_across_chunks() {
        let header = AttributeHeader {
            level: AttrLevel::Message,
            name: ATTR_BODY,
            attr_type: AttrType::Text,
            length: 5,
        };
        let mut attr = RawAttribute::new(header);
        let mut first = ByteCursor::new(b"hel");
        attr.fill_from(&mut first).unwrap();
        assert!(!attr.is_complete());
        assert_eq!(attr.remaining(), 2);
        let mut second = ByteCursor::new(b"lo\x10\x02");
        attr.fill_from(&mut second).unwrap();
        assert!(attr.is_complete());
        assert_eq!(second.available(), 2);
        assert_eq!(attr.as_string(), "hello");
    }

    #[test]
    fn test_parse_date() {
        let mut buf = Vec::new();
        for v in [2023u16, 4, 15, 13, 45, 30, 6] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let dt = parse_tnef_date(&buf).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-04-15T13:45:30+00:00");
        assert!(parse_tnef_date(&buf[..6]).is_none());
    }

    #[test]
    fn test_string_trims_nuls() {
        let header = AttributeHeader {
            level: AttrLevel::Message,
            name: ATTR_MESSAGE_CLASS,
            attr_type: AttrType::String,
            length: 9,
        };
        let mut attr = RawAttribute::new(header);
        attr.payload = b"IPM.Note\0".to_vec();
        assert_eq!(attr.as_string(), "IPM.Note");
    }
}
