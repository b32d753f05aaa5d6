//! Decoded output units.

use chrono::{DateTime, Utc};

/// What an artifact was reconstructed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// An attached file.
    File,
    /// A message body (plain text, HTML, RTF, or a raw MAPI dump).
    Body,
    /// An iCalendar meeting.
    Calendar,
    /// A vCard contact.
    Contact,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Body => "body",
            Self::Calendar => "calendar",
            Self::Contact => "contact",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled output unit, owned by the caller once emitted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub mime_type: String,
    /// Declared length. Equals `bytes.len()` for everything the decoder emits.
    pub length: u32,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            mime_type: mime_type.into(),
            length: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            created_at: None,
            bytes,
        }
    }

    pub fn with_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.created_at = date;
        self
    }

    /// Content as UTF-8 text, lossy.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// File extension used for body parts of a given MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "text/plain" => ".txt",
        "text/html" => ".html",
        "application/rtf" => ".rtf",
        "text/calendar" => ".ics",
        "text/x-vcard" => ".vcf",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_length() {
        let a = Artifact::new(ArtifactKind::File, "a.bin", "application/octet-stream", vec![1, 2, 3]);
        assert_eq!(a.length, 3);
        assert!(a.created_at.is_none());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(extension_for_mime("text/calendar"), ".ics");
        assert_eq!(extension_for_mime("text/x-vcard"), ".vcf");
        assert_eq!(extension_for_mime("image/png"), "");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ArtifactKind::Calendar).unwrap();
        assert_eq!(json, "\"calendar\"");
    }
}
