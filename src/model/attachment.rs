//! The attachment currently being assembled from attachment-level attributes.

use chrono::{DateTime, Utc};

use super::artifact::{Artifact, ArtifactKind};

/// MIME type for attachments that carry no tag of their own.
pub const DEFAULT_ATTACHMENT_MIME: &str = "application/octet-stream";

/// State collected between two `ATTACH_REND_DATA` markers.
///
/// Nothing here is visible to listeners until [`into_artifact`](Self::into_artifact)
/// runs at the next marker or at end of stream.
#[derive(Debug, Clone, Default)]
pub struct AttachmentFile {
    /// De-duplicated file name.
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub data: Option<Vec<u8>>,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

impl AttachmentFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether there is anything worth emitting.
    pub fn has_content(&self) -> bool {
        self.name.is_some() || self.data.is_some()
    }

    /// Modification date, falling back to the creation date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.modified.or(self.created)
    }

    /// Finish the attachment. `name` is used when the attachment never got
    /// one of its own.
    pub fn into_artifact(self, fallback_name: impl FnOnce() -> String) -> Artifact {
        let date = self.date();
        let name = self.name.unwrap_or_else(fallback_name);
        let mime_type = self
            .mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_MIME.to_string());
        Artifact::new(
            ArtifactKind::File,
            name,
            mime_type,
            self.data.unwrap_or_default(),
        )
        .with_date(date)
    }
}
