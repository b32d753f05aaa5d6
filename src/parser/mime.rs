//! Locate TNEF (`winmail.dat`) parts inside an RFC 5322 message.

use mail_parser::{Addr, Address, MessageParser, MimeHeaders};
use tracing::debug;

use crate::error::{Result, TnefError};
use crate::model::address::MessageHeader;

pub const TNEF_MIME_TYPE: &str = "application/ms-tnef";
pub const TNEF_FILE_NAME: &str = "winmail.dat";

/// One TNEF attachment, already transfer-decoded.
#[derive(Debug, Clone)]
pub struct TnefPart {
    /// Position among the message's attachments.
    pub index: usize,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Parse `raw_message` and return its From/To/Cc and every TNEF part.
///
/// A part qualifies by MIME type (`application/ms-tnef`, also the
/// `vnd.ms-tnef` variant) or by the attachment name `winmail.dat`.
pub fn find_tnef_parts(raw_message: &[u8]) -> Result<(MessageHeader, Vec<TnefPart>)> {
    let message_bytes = skip_from_line(raw_message);
    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| TnefError::InvalidMessage("Failed to parse MIME message".into()))?;

    let header = MessageHeader {
        author: address_field(msg.from()),
        recipients: address_field(msg.to()),
        cc_list: address_field(msg.cc()),
    };

    let mut parts = Vec::new();
    for (index, part) in msg.attachments().enumerate() {
        let content_type = part
            .content_type()
            .map(|ct| match ct.subtype() {
                Some(sub) => format!("{}/{}", ct.ctype(), sub),
                None => ct.ctype().to_string(),
            })
            .unwrap_or_default()
            .to_lowercase();
        let name = part.attachment_name().unwrap_or("").to_string();

        if !is_tnef(&content_type, &name) {
            continue;
        }
        debug!(index, name = %name, content_type = %content_type, "Found TNEF part");
        parts.push(TnefPart {
            index,
            name: if name.is_empty() {
                TNEF_FILE_NAME.to_string()
            } else {
                name
            },
            bytes: part.contents().to_vec(),
        });
    }
    Ok((header, parts))
}

/// Render a parsed address header back to a `"name" <addr>, ...` list.
fn address_field(address: Option<&Address<'_>>) -> String {
    let Some(address) = address else {
        return String::new();
    };
    let addrs: Vec<&Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    addrs
        .into_iter()
        .filter_map(format_addr)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_addr(addr: &Addr<'_>) -> Option<String> {
    let address = addr.address.as_deref()?;
    Some(match addr.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("\"{}\" <{address}>", name.replace('"', "")),
        _ => address.to_string(),
    })
}

fn is_tnef(content_type: &str, name: &str) -> bool {
    matches!(content_type, TNEF_MIME_TYPE | "application/vnd.ms-tnef")
        || name.eq_ignore_ascii_case(TNEF_FILE_NAME)
}

/// Skip an MBOX `From ` separator line and a UTF-8 BOM.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
