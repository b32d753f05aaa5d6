//! Write decoded artifacts into a directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, TnefError};
use crate::listener::ArtifactListener;
use crate::model::artifact::ArtifactKind;

/// Maximum length of a file name written to disk.
const MAX_NAME_LEN: usize = 150;

/// One artifact that has been written.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenArtifact {
    pub kind: ArtifactKind,
    /// Name as decoded from the stream.
    pub name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub length: u64,
    pub date: Option<DateTime<Utc>>,
}

struct OpenFile {
    writer: BufWriter<File>,
    entry: WrittenArtifact,
}

/// [`ArtifactListener`] that streams each artifact into its own file.
///
/// Names are sanitized and never overwrite an existing file: a clash gets a
/// `_1`, `_2`, ... suffix before the extension.
pub struct DirectorySink {
    dir: PathBuf,
    open: Option<OpenFile>,
    written: Vec<WrittenArtifact>,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(TnefError::InvalidPath(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        std::fs::create_dir_all(&dir).map_err(|e| TnefError::io(&dir, e))?;
        Ok(Self {
            dir,
            open: None,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifacts written so far, in order.
    pub fn written(&self) -> &[WrittenArtifact] {
        &self.written
    }

    pub fn into_written(self) -> Vec<WrittenArtifact> {
        self.written
    }
}

impl ArtifactListener for DirectorySink {
    fn on_artifact_start(
        &mut self,
        kind: ArtifactKind,
        name: &str,
        mime_type: &str,
        _length: u32,
        date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if self.open.is_some() {
            return Err(TnefError::ExportError(format!(
                "artifact '{name}' started before the previous one ended"
            )));
        }
        let path = unique_path(&self.dir.join(sanitize_filename_part(name, MAX_NAME_LEN)));
        let file = File::create(&path).map_err(|e| TnefError::io(&path, e))?;
        debug!(path = %path.display(), "Writing artifact");
        self.open = Some(OpenFile {
            writer: BufWriter::new(file),
            entry: WrittenArtifact {
                kind,
                name: name.to_string(),
                path,
                mime_type: mime_type.to_string(),
                length: 0,
                date,
            },
        });
        Ok(())
    }

    fn on_artifact_data(&mut self, _offset: u64, chunk: &[u8]) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| TnefError::ExportError("artifact data without start".into()))?;
        open.writer
            .write_all(chunk)
            .map_err(|e| TnefError::io(&open.entry.path, e))?;
        open.entry.length += chunk.len() as u64;
        Ok(())
    }

    fn on_artifact_end(&mut self) -> Result<()> {
        let Some(mut open) = self.open.take() else {
            return Ok(());
        };
        open.writer
            .flush()
            .map_err(|e| TnefError::io(&open.entry.path, e))?;
        info!(
            path = %open.entry.path.display(),
            kind = %open.entry.kind,
            bytes = open.entry.length,
            "Artifact written"
        );
        self.written.push(open.entry);
        Ok(())
    }
}

/// Replace characters that are unsafe in file names with `_` and truncate
/// to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();
    let sanitized = sanitized.trim();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized.to_string()
    }
}

/// `path`, or the first `stem_N.ext` next to it that does not exist.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    (1u32..)
        .map(|i| {
            if ext.is_empty() {
                parent.join(format!("{stem}_{i}"))
            } else {
                parent.join(format!("{stem}_{i}.{ext}"))
            }
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| parent.join(format!("{stem}_dup.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::Artifact;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename_part("report (1).pdf", 150), "report (1).pdf");
        assert_eq!(sanitize_filename_part("../../etc/passwd", 150), ".._.._etc_passwd");
        assert_eq!(sanitize_filename_part("..", 150), "unknown");
        assert_eq!(sanitize_filename_part("", 150), "unknown");
        assert_eq!(sanitize_filename_part("abcdef", 3), "abc");
    }

    #[test]
    fn test_writes_artifacts() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut sink = DirectorySink::new(temp.path()).unwrap();
        sink.on_artifact(Artifact::new(
            ArtifactKind::File,
            "notes.txt",
            "text/plain",
            b"hello".to_vec(),
        ))
        .unwrap();
        sink.on_artifact(Artifact::new(
            ArtifactKind::File,
            "notes.txt",
            "text/plain",
            b"again".to_vec(),
        ))
        .unwrap();

        temp.child("notes.txt").assert("hello");
        temp.child("notes_1.txt").assert(predicate::str::contains("again"));
        let written = sink.into_written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1].length, 5);
        assert_eq!(written[1].name, "notes.txt");
    }

    #[test]
    fn test_streamed_chunks() {
        let temp = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(temp.path().join("out")).unwrap();
        sink.on_artifact_start(ArtifactKind::Body, "body_part_0.txt", "text/plain", 6, None)
            .unwrap();
        sink.on_artifact_data(0, b"abc").unwrap();
        sink.on_artifact_data(3, b"def").unwrap();
        sink.on_artifact_end().unwrap();
        let data = std::fs::read(temp.path().join("out/body_part_0.txt")).unwrap();
        assert_eq!(data, b"abcdef");
    }

    #[test]
    fn test_data_without_start() {
        let temp = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(temp.path()).unwrap();
        assert!(matches!(
            sink.on_artifact_data(0, b"x"),
            Err(TnefError::ExportError(_))
        ));
    }

    #[test]
    fn test_rejects_file_as_dir() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("plain");
        file.write_str("x").unwrap();
        assert!(DirectorySink::new(file.path()).is_err());
    }
}
