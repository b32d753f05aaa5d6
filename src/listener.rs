//! The callback contract the decoder emits artifacts through.
//!
//! The decoder never writes files itself. Each synthesized [`Artifact`] is
//! handed to an [`ArtifactListener`] as one `start`, one or more `data`, and
//! one `end` call, only after the artifact is completely assembled.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::artifact::{Artifact, ArtifactKind};

/// Receiver of decoded artifacts.
///
/// Returning an error from any callback aborts decoding of the current
/// stream and is propagated to the caller of `feed`/`finish`.
pub trait ArtifactListener {
    fn on_artifact_start(
        &mut self,
        kind: ArtifactKind,
        name: &str,
        mime_type: &str,
        length: u32,
        date: Option<DateTime<Utc>>,
    ) -> Result<()>;

    fn on_artifact_data(&mut self, offset: u64, chunk: &[u8]) -> Result<()>;

    fn on_artifact_end(&mut self) -> Result<()>;

    /// Deliver a whole artifact. The default splits it into the three
    /// callbacks above with a single data chunk.
    fn on_artifact(&mut self, artifact: Artifact) -> Result<()> {
        self.on_artifact_start(
            artifact.kind,
            &artifact.name,
            &artifact.mime_type,
            artifact.length,
            artifact.created_at,
        )?;
        if !artifact.bytes.is_empty() {
            self.on_artifact_data(0, &artifact.bytes)?;
        }
        self.on_artifact_end()
    }
}

/// Keeps every artifact in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingListener {
    pub artifacts: Vec<Artifact>,
    pending: Option<Artifact>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl ArtifactListener for CollectingListener {
    fn on_artifact_start(
        &mut self,
        kind: ArtifactKind,
        name: &str,
        mime_type: &str,
        length: u32,
        date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut artifact = Artifact::new(kind, name, mime_type, Vec::new()).with_date(date);
        artifact.length = length;
        self.pending = Some(artifact);
        Ok(())
    }

    fn on_artifact_data(&mut self, _offset: u64, chunk: &[u8]) -> Result<()> {
        if let Some(artifact) = self.pending.as_mut() {
            artifact.bytes.extend_from_slice(chunk);
        }
        Ok(())
    }

    fn on_artifact_end(&mut self) -> Result<()> {
        if let Some(artifact) = self.pending.take() {
            self.artifacts.push(artifact);
        }
        Ok(())
    }

    fn on_artifact(&mut self, artifact: Artifact) -> Result<()> {
        self.artifacts.push(artifact);
        Ok(())
    }
}
