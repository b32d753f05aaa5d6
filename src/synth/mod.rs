//! Artifact synthesis from decoded attributes and MAPI properties.
//!
//! [`Package`] holds everything that lives for one TNEF stream apart from
//! the byte-level parse state: code page, message class, body-part counter,
//! emitted file names and the attachment being assembled. Each complete
//! attribute is routed through [`handler_for`] to one [`AttributeHandler`].

pub mod calendar;
pub mod contact;
pub mod recurrence;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DecoderOptions;
use crate::error::{Result, TnefError};
use crate::listener::ArtifactListener;
use crate::model::address::MessageHeader;
use crate::model::artifact::{extension_for_mime, Artifact, ArtifactKind};
use crate::model::attachment::AttachmentFile;
use crate::parser::attribute::*;
use crate::parser::codepage::{repair_filename, FileNameRegistry};
use crate::parser::mapi::{decode_properties, MapiProperty, MapiType, MapiValue, PropId, PropertyList};
use crate::parser::numeric::to_base64;
use crate::parser::{rtf, tags};

pub(crate) const CRLF: &str = "\r\n";
pub(crate) const PRODID: &str = "PRODID:-//tnefshell//TNEF Decoder//EN";

/// What to do with a complete attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeHandler {
    /// Remember the OEM code page for file names.
    CodePage,
    /// Close the current attachment and start a new one.
    AttachmentStart,
    /// Emit a plain-text body part.
    Body,
    /// Remember the message class.
    MessageClass,
    /// Decode message-level MAPI properties.
    MessageProps,
    AttachmentTitle,
    AttachmentData,
    /// Decode attachment-level MAPI properties.
    AttachmentProps,
    AttachmentModified,
    AttachmentCreated,
    /// Any other attachment attribute; opens an attachment if none is open.
    AttachmentOther,
    Ignore,
}

/// Dispatch table from (level, name) to handler.
pub fn handler_for(level: AttrLevel, name: u16) -> AttributeHandler {
    use AttrLevel::*;
    use AttributeHandler as H;
    match (level, name) {
        (_, ATTR_OEM_CODEPAGE) => H::CodePage,
        (_, ATTR_ATTACH_REND_DATA) => H::AttachmentStart,
        (Message, ATTR_BODY) => H::Body,
        (Message, ATTR_MESSAGE_CLASS) => H::MessageClass,
        (Message, ATTR_MAPI_PROPS) => H::MessageProps,
        (Attachment, ATTR_ATTACH_TITLE) => H::AttachmentTitle,
        (Attachment, ATTR_ATTACH_DATA) => H::AttachmentData,
        (Attachment, ATTR_ATTACHMENT | ATTR_MAPI_PROPS) => H::AttachmentProps,
        (Attachment, ATTR_ATTACH_MODIFY_DATE) => H::AttachmentModified,
        (Attachment, ATTR_ATTACH_CREATE_DATE) => H::AttachmentCreated,
        (Attachment, _) => H::AttachmentOther,
        (Message, _) => H::Ignore,
    }
}

/// Per-stream synthesis state.
#[derive(Debug, Default)]
pub struct Package {
    pub code_page: Option<u32>,
    pub message_class: Option<String>,
    pub header: Option<MessageHeader>,
    body_parts: u32,
    files: FileNameRegistry,
    current: Option<AttachmentFile>,
}

impl Package {
    pub fn new(header: Option<MessageHeader>) -> Self {
        Self {
            header,
            ..Default::default()
        }
    }

    /// Route one complete attribute.
    pub fn dispatch(
        &mut self,
        attr: &RawAttribute,
        options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        match handler_for(attr.level(), attr.name()) {
            AttributeHandler::CodePage => {
                self.code_page = attr.as_u32();
                info!(code_page = ?self.code_page, "OEM code page");
            }
            AttributeHandler::AttachmentStart => {
                self.flush_attachment(listener)?;
                self.current = Some(AttachmentFile::new());
            }
            AttributeHandler::Body => {
                let text = trim_nuls(&attr.payload).to_vec();
                self.emit_body(ArtifactKind::Body, text, "text/plain", options, listener)?;
            }
            AttributeHandler::MessageClass => {
                let class = attr.as_string();
                debug!(message_class = %class, "Message class");
                self.message_class = Some(class);
            }
            AttributeHandler::MessageProps => {
                let props = decode_properties(&attr.payload);
                self.handle_message_props(&props, options, listener)?;
            }
            AttributeHandler::AttachmentTitle => {
                let name = self.file_name(trim_nuls(&attr.payload), options);
                self.attachment().name = name;
            }
            AttributeHandler::AttachmentData => {
                self.attachment().data = Some(attr.payload.clone());
            }
            AttributeHandler::AttachmentProps => {
                let props = decode_properties(&attr.payload);
                if options.attach_raw_mapi {
                    self.emit_raw_mapi(&props, options, listener)?;
                }
                self.apply_attachment_props(&props, options);
            }
            AttributeHandler::AttachmentModified => {
                let date = attr.as_date();
                self.attachment().modified = date;
            }
            AttributeHandler::AttachmentCreated => {
                let date = attr.as_date();
                self.attachment().created = date;
            }
            AttributeHandler::AttachmentOther => {
                self.attachment();
            }
            AttributeHandler::Ignore => {}
        }
        Ok(())
    }

    /// Emit the open attachment, if it has a name or data.
    pub fn flush_attachment(&mut self, listener: &mut dyn ArtifactListener) -> Result<()> {
        let Some(file) = self.current.take() else {
            return Ok(());
        };
        if !file.has_content() {
            return Ok(());
        }
        let files = &self.files;
        let artifact = file.into_artifact(|| files.default_name());
        self.files.insert(artifact.name.clone());
        debug!(name = %artifact.name, len = artifact.length, "Attachment complete");
        listener.on_artifact(artifact)
    }

    fn attachment(&mut self) -> &mut AttachmentFile {
        self.current.get_or_insert_with(AttachmentFile::new)
    }

    /// Repair and de-duplicate a file name. Empty names are ignored.
    fn file_name(&self, raw: &[u8], options: &DecoderOptions) -> Option<String> {
        let name = repair_filename(raw, self.code_page, options.disable_filename_character_set);
        let name = name.trim();
        (!name.is_empty()).then(|| self.files.unique(name))
    }

    fn apply_attachment_props(&mut self, props: &PropertyList, options: &DecoderOptions) {
        for prop in props {
            let Some(value) = prop.first() else {
                continue;
            };
            match prop.prop_id() {
                tags::ATTACH_LONG_FILENAME => {
                    let name = match value {
                        MapiValue::String8(raw) => self.file_name(raw, options),
                        other => other
                            .as_text()
                            .and_then(|s| self.file_name(s.as_bytes(), options)),
                    };
                    if name.is_some() {
                        self.attachment().name = name;
                    }
                }
                tags::ATTACH_DATA_OBJ => {
                    if let Some(bytes) = value.as_bytes() {
                        self.attachment().data = Some(bytes.to_vec());
                    }
                }
                tags::ATTACH_MIME_TAG => {
                    if let Some(mime) = value.as_text() {
                        self.attachment().mime_type = Some(mime.trim().to_string());
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_message_props(
        &mut self,
        props: &PropertyList,
        options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        if options.attach_raw_mapi {
            self.emit_raw_mapi(props, options, listener)?;
        }

        let mut has_contact_data = false;
        for prop in props {
            match prop.prop_id() {
                tags::BODY_HTML => {
                    for value in &prop.values {
                        if let Some(bytes) = value.as_bytes() {
                            self.emit_body(
                                ArtifactKind::Body,
                                bytes.to_vec(),
                                "text/html",
                                options,
                                listener,
                            )?;
                        }
                    }
                }
                tags::RTF_COMPRESSED => {
                    for value in &prop.values {
                        let Some(data) = value.as_bytes().filter(|d| rtf::is_rtf_data(d)) else {
                            continue;
                        };
                        match rtf::decompress(data) {
                            Ok(Some(rtf_bytes)) => self.emit_body(
                                ArtifactKind::Body,
                                rtf_bytes,
                                "application/rtf",
                                options,
                                listener,
                            )?,
                            Ok(None) => {}
                            Err(e @ TnefError::SizeMismatch { .. }) => {
                                warn!(error = %e, "Dropping RTF body");
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                id if tags::is_contact_prop(id) => has_contact_data = true,
                _ => {}
            }
        }

        let class = self.message_class.clone().unwrap_or_default();
        if calendar::is_calendar_class(&class) {
            if options.calendar_enabled() {
                let ics =
                    calendar::CalendarBuilder::new(props, &class, self.header.as_ref()).build();
                self.emit_body(
                    ArtifactKind::Calendar,
                    ics.into_bytes(),
                    "text/calendar",
                    options,
                    listener,
                )?;
            } else {
                debug!(message_class = %class, "Calendar synthesis disabled");
            }
        }

        if has_contact_data {
            match contact::build_vcard(props) {
                Some(card) => self.emit_body(
                    ArtifactKind::Contact,
                    card.into_bytes(),
                    "text/x-vcard",
                    options,
                    listener,
                )?,
                None => debug!("Contact properties present but empty, skipping vCard"),
            }
        }
        Ok(())
    }

    fn emit_raw_mapi(
        &mut self,
        props: &PropertyList,
        options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        let dump = dump_properties(props);
        self.emit_body(
            ArtifactKind::Body,
            dump.into_bytes(),
            "text/plain",
            options,
            listener,
        )
    }

    /// Emit a numbered body part (`<prefix><n><ext>`).
    fn emit_body(
        &mut self,
        kind: ArtifactKind,
        bytes: Vec<u8>,
        mime_type: &str,
        options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        let name = format!(
            "{}{}{}",
            options.body_part_prefix,
            self.body_parts,
            extension_for_mime(mime_type)
        );
        self.body_parts += 1;
        debug!(name = %name, kind = %kind, len = bytes.len(), "Body part");
        listener.on_artifact(Artifact::new(kind, name, mime_type, bytes))
    }
}

/// Escape text for an iCalendar or vCard property value.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// iCalendar UTC date-time (`YYYYMMDDTHHMMSSZ`).
pub fn ical_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// One line per property: `NAME: type=TYPE; value=...`.
pub fn dump_properties(props: &PropertyList) -> String {
    let mut out = String::new();
    for prop in props {
        out.push_str(&dump_line(prop));
        out.push('\n');
    }
    out
}

fn dump_line(prop: &MapiProperty) -> String {
    let id = prop.prop_id();
    let name = match (tags::prop_name(id), prop.names.first()) {
        (Some(known), _) => known.to_string(),
        (None, Some(named)) => named.clone(),
        (None, None) => match id {
            PropId::Tagged(t) => format!("0x{t:04X}"),
            PropId::Named(n) => format!("{{{}}}:0x{n:04X}", prop.guid.unwrap_or_default()),
        },
    };
    let mut line = format!("{name}: type={};", prop.mapi_type.as_str());

    let count = prop.values.len();
    let Some(first) = prop.first() else {
        line.push_str(if prop.mapi_type == MapiType::Null {
            " value=null"
        } else {
            " void"
        });
        return line;
    };

    match (prop.mapi_type, first) {
        (MapiType::Clsid, MapiValue::Guid(g)) => line.push_str(&format!(" value={g}")),
        (MapiType::Int64, MapiValue::Int64(v)) => line.push_str(&format!(" value={v:016x}")),
        (MapiType::Binary, _) => {
            if count > 1 {
                line.push_str(&format!(" num-values={count};"));
            }
            let data = first.as_bytes().unwrap_or_default();
            line.push_str(&format!(" data=base64,{}", to_base64(data)));
        }
        _ => {
            if count > 1 {
                line.push_str(&format!(" num-values={count};"));
            }
            line.push_str(&format!(" value='{}'", display_value(first)));
        }
    }
    line
}

fn display_value(value: &MapiValue) -> String {
    match value {
        MapiValue::Short(v) => v.to_string(),
        MapiValue::Int(v) => v.to_string(),
        MapiValue::Int64(v) => v.to_string(),
        MapiValue::Float(v) => v.to_string(),
        MapiValue::Double(v) => v.to_string(),
        MapiValue::Bool(v) => v.to_string(),
        MapiValue::Guid(g) => g.to_string(),
        MapiValue::Date(d) => d.to_rfc3339(),
        MapiValue::String8(_) | MapiValue::Unicode(_) => {
            value.as_text().map(|s| s.into_owned()).unwrap_or_default()
        }
        MapiValue::Bytes(b) => to_base64(b),
    }
}
