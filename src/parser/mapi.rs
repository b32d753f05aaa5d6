//! MAPI property tables embedded in `MAPI_PROPS` and `ATTACHMENT` attributes.
//!
//! Layout: a u32 property count, then per property a u16 type, a u16 id,
//! an optional GUID-qualified name (when the id has bit 0x8000 set), and
//! the value(s). Variable-length values are count-prefixed and each value
//! is padded to a 4-byte boundary.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::attribute::decode_8bit;
use super::cursor::ByteCursor;
use super::numeric::{filetime_to_datetime, le_f32, le_f64, le_i16, le_i32, le_i64};
use crate::error::Result;

pub const MULTI_VALUE_FLAG: u16 = 0x1000;
pub const GUID_EXISTS_FLAG: u16 = 0x8000;

/// MAPI property value type, with the multi-value flag stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapiType {
    Unspecified,
    Null,
    Short,
    Int,
    Float,
    Double,
    Currency,
    AppTime,
    Error,
    Boolean,
    Object,
    Int64,
    String8,
    Unicode,
    SysTime,
    Clsid,
    Binary,
    Unknown(u16),
}

impl MapiType {
    pub fn from_u16(v: u16) -> Self {
        match v {
            0x0000 => Self::Unspecified,
            0x0001 => Self::Null,
            0x0002 => Self::Short,
            0x0003 => Self::Int,
            0x0004 => Self::Float,
            0x0005 => Self::Double,
            0x0006 => Self::Currency,
            0x0007 => Self::AppTime,
            0x000A => Self::Error,
            0x000B => Self::Boolean,
            0x000D => Self::Object,
            0x0014 => Self::Int64,
            0x001E => Self::String8,
            0x001F => Self::Unicode,
            0x0040 => Self::SysTime,
            0x0048 => Self::Clsid,
            0x0102 => Self::Binary,
            other => Self::Unknown(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Null => "NULL",
            Self::Short => "SHORT",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Currency => "CURRENCY",
            Self::AppTime => "APPTIME",
            Self::Error => "ERROR",
            Self::Boolean => "BOOLEAN",
            Self::Object => "OBJECT",
            Self::Int64 => "INT8BYTE",
            Self::String8 => "STRING",
            Self::Unicode => "UNICODE_STRING",
            Self::SysTime => "SYSTIME",
            Self::Clsid => "CLSID",
            Self::Binary => "BINARY",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Encoded width of one value, or `None` for length-prefixed types.
    fn stride(self) -> Option<usize> {
        match self {
            Self::Short | Self::Boolean | Self::Int | Self::Error | Self::Float => Some(4),
            Self::Double | Self::Currency | Self::AppTime | Self::Int64 | Self::SysTime => {
                Some(8)
            }
            Self::Clsid => Some(16),
            _ => None,
        }
    }
}

/// A single decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum MapiValue {
    Short(i16),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Guid(Uuid),
    Date(DateTime<Utc>),
    /// Narrow string in the sender's code page, NUL terminator removed.
    String8(Vec<u8>),
    Unicode(String),
    Bytes(Vec<u8>),
}

impl MapiValue {
    /// Textual view of string values. Narrow strings that are not UTF-8 are
    /// read as Windows-1252.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Unicode(s) => Some(Cow::Borrowed(s.as_str())),
            Self::String8(b) => Some(Cow::Owned(decode_8bit(b))),
            _ => None,
        }
    }

    /// Raw bytes of binary, object and string values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) | Self::String8(b) => Some(b),
            Self::Unicode(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Short(v) => Some(*v as i64),
            Self::Int(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// How a property is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropId {
    /// Plain property tag id, no GUID.
    Tagged(u16),
    /// Numeric id inside a GUID property set.
    Named(u32),
}

/// One decoded MAPI property.
#[derive(Debug, Clone, PartialEq)]
pub struct MapiProperty {
    pub mapi_type: MapiType,
    pub multi_valued: bool,
    /// Tag id, or the 32-bit replacement id for GUID-qualified properties.
    pub id: u32,
    pub guid: Option<Uuid>,
    /// String names of a GUID-qualified property, when it is named by string.
    pub names: Vec<String>,
    pub values: Vec<MapiValue>,
}

impl MapiProperty {
    pub fn prop_id(&self) -> PropId {
        if self.guid.is_some() && self.names.is_empty() {
            PropId::Named(self.id)
        } else {
            PropId::Tagged(self.id as u16)
        }
    }

    pub fn first(&self) -> Option<&MapiValue> {
        self.values.first()
    }
}

/// A decoded property table with typed lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyList {
    pub props: Vec<MapiProperty>,
}

impl PropertyList {
    pub fn iter(&self) -> std::slice::Iter<'_, MapiProperty> {
        self.props.iter()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// First property with `id` that has at least one value.
    pub fn find(&self, id: PropId) -> Option<&MapiProperty> {
        self.props
            .iter()
            .find(|p| p.prop_id() == id && !p.values.is_empty())
    }

    /// First value of `id` as text, trimmed; empty strings count as absent.
    pub fn text(&self, id: PropId) -> Option<String> {
        let s = self.find(id)?.first()?.as_text()?;
        let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        (!s.is_empty()).then(|| s.to_string())
    }

    pub fn bytes(&self, id: PropId) -> Option<&[u8]> {
        self.find(id)?.first()?.as_bytes()
    }

    pub fn int(&self, id: PropId) -> Option<i64> {
        self.find(id)?.first()?.as_i64()
    }

    pub fn date(&self, id: PropId) -> Option<DateTime<Utc>> {
        self.find(id)?.first()?.as_date()
    }
}

impl<'a> IntoIterator for &'a PropertyList {
    type Item = &'a MapiProperty;
    type IntoIter = std::slice::Iter<'a, MapiProperty>;

    fn into_iter(self) -> Self::IntoIter {
        self.props.iter()
    }
}

/// Decode a MAPI property table.
///
/// Decoding stops at the first property whose type is unknown (its width
/// cannot be determined) or whose data is truncated; everything decoded up to
/// that point is returned.
pub fn decode_properties(buf: &[u8]) -> PropertyList {
    let mut cur = ByteCursor::new(buf);
    let mut list = PropertyList::default();

    let count = match cur.read_u32_le() {
        Ok(n) => n,
        Err(_) => {
            debug!(len = buf.len(), "MAPI table too short for a property count");
            return list;
        }
    };

    for index in 0..count {
        match read_property(&mut cur) {
            Ok(Some(prop)) => list.props.push(prop),
            Ok(None) => break,
            Err(e) => {
                warn!(
                    index,
                    count,
                    offset = cur.offset(),
                    error = %e,
                    "Truncated MAPI property table"
                );
                break;
            }
        }
    }

    list
}

fn read_property(cur: &mut ByteCursor<'_>) -> Result<Option<MapiProperty>> {
    let raw_type = cur.read_u16_le()?;
    let raw_id = cur.read_u16_le()?;

    let multi_valued = raw_type & MULTI_VALUE_FLAG != 0;
    let mapi_type = MapiType::from_u16(raw_type & !MULTI_VALUE_FLAG);

    let mut id = raw_id as u32;
    let mut guid = None;
    let mut names = Vec::new();

    if raw_id & GUID_EXISTS_FLAG != 0 {
        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(cur.read_bytes(16)?);
        guid = Some(Uuid::from_bytes_le(guid_bytes));

        let num_names = cur.read_u32_le()?;
        if num_names > 0 {
            for _ in 0..num_names {
                let len = cur.read_u32_le()? as usize;
                let raw = cur.read_bytes(len)?;
                names.push(utf16_bytes_to_string(raw));
                cur.align4();
            }
        } else {
            id = cur.read_u32_le()?;
        }
    }

    let values = match mapi_type {
        MapiType::Null => Vec::new(),
        MapiType::Unknown(code) => {
            debug!(
                mapi_type = code,
                id, "Unknown MAPI type, skipping rest of table"
            );
            return Ok(None);
        }
        t if t.stride().is_some() => {
            let n = if multi_valued { cur.read_u32_le()? } else { 1 };
            let mut values = Vec::with_capacity((n as usize).min(1024));
            for _ in 0..n {
                values.push(read_fixed(cur, t)?);
            }
            values
        }
        t => {
            let n = cur.read_u32_le()?;
            let mut values = Vec::with_capacity((n as usize).min(1024));
            for _ in 0..n {
                let len = cur.read_u32_le()? as usize;
                let raw = cur.read_bytes(len)?;
                values.push(variable_value(t, raw));
                cur.align4();
            }
            values
        }
    };

    Ok(Some(MapiProperty {
        mapi_type,
        multi_valued,
        id,
        guid,
        names,
        values,
    }))
}

fn read_fixed(cur: &mut ByteCursor<'_>, t: MapiType) -> Result<MapiValue> {
    let width = t.stride().unwrap_or(4);
    let raw = cur.read_bytes(width)?;
    Ok(match t {
        MapiType::Short => MapiValue::Short(le_i16(raw)),
        MapiType::Boolean => MapiValue::Bool(le_i16(raw) != 0),
        MapiType::Float => MapiValue::Float(le_f32(raw)),
        MapiType::Double | MapiType::AppTime => MapiValue::Double(le_f64(raw)),
        MapiType::Currency | MapiType::Int64 => MapiValue::Int64(le_i64(raw)),
        MapiType::SysTime => {
            let ft = le_i64(raw) as u64;
            match filetime_to_datetime(ft) {
                Some(d) => MapiValue::Date(d),
                None => MapiValue::Int64(ft as i64),
            }
        }
        MapiType::Clsid => {
            let mut b = [0u8; 16];
            b.copy_from_slice(raw);
            MapiValue::Guid(Uuid::from_bytes_le(b))
        }
        _ => MapiValue::Int(le_i32(raw)),
    })
}

fn variable_value(t: MapiType, raw: &[u8]) -> MapiValue {
    match t {
        MapiType::Unicode => MapiValue::Unicode(utf16_bytes_to_string(raw)),
        MapiType::String8 => {
            let trimmed = raw.strip_suffix(&[0]).unwrap_or(raw);
            MapiValue::String8(trimmed.to_vec())
        }
        _ => MapiValue::Bytes(raw.to_vec()),
    }
}

/// Decode UTF-16LE bytes, dropping trailing NULs.
fn utf16_bytes_to_string(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let mut s = String::from_utf16_lossy(&units);
    while s.ends_with('\0') {
        s.pop();
    }
    s
}
