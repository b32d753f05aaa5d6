//! OEM code-page handling for attachment file names.

use encoding_rs::Encoding;
use tracing::{debug, warn};

use super::attribute::decode_8bit;

/// Charset label for a Windows code page, if we know it.
pub fn codepage_to_charset(cp: u32) -> Option<&'static str> {
    match cp {
        874 => Some("windows-874"), // Thai (TIS-620 superset)
        932 => Some("shift_jis"),
        936 => Some("gbk"),
        949 => Some("euc-kr"),
        950 => Some("big5"),
        1250 => Some("windows-1250"),
        1251 => Some("windows-1251"),
        1252 => Some("windows-1252"),
        1253 => Some("windows-1253"),
        1254 => Some("windows-1254"),
        1255 => Some("windows-1255"),
        1256 => Some("windows-1256"),
        1257 => Some("windows-1257"),
        1258 => Some("windows-1258"),
        _ => None,
    }
}

/// Decode a raw file name using the stream's OEM code page.
///
/// Bytes that are already valid UTF-8 are kept as they are. Otherwise the
/// name is decoded with the mapped charset; if that produces malformed
/// output the bytes are read verbatim instead.
pub fn repair_filename(raw: &[u8], code_page: Option<u32>, disabled: bool) -> String {
    if disabled {
        return decode_8bit(raw);
    }
    let Some(label) = code_page.and_then(codepage_to_charset) else {
        return decode_8bit(raw);
    };
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        return decode_8bit(raw);
    };
    debug!(charset = label, "Converting file name from OEM code page");
    match encoding.decode_without_bom_handling_and_without_replacement(raw) {
        Some(decoded) => decoded.into_owned(),
        None => {
            warn!(
                charset = label,
                "File name is not valid in its code page, keeping raw bytes"
            );
            decode_8bit(raw)
        }
    }
}

/// Names handed out so far for one TNEF stream.
#[derive(Debug, Clone, Default)]
pub struct FileNameRegistry {
    used: Vec<String>,
}

impl FileNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.used.iter().any(|n| n == name)
    }

    /// Record `name` as emitted.
    pub fn insert(&mut self, name: String) {
        if !self.contains(&name) {
            self.used.push(name);
        }
    }

    /// First of `base`, `base1`, `base2`, ... not yet emitted.
    pub fn unique(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1u32..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Placeholder for an attachment that carries no name.
    pub fn default_name(&self) -> String {
        (0u32..)
            .map(|n| format!("tnef-part-{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| "tnef-part".to_string())
    }
}
