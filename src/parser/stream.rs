//! Resumable TNEF attribute stream parser.
//!
//! A [`ParseState`] is created once per stream and fed chunks of any size.
//! Bytes that do not yet complete a signature, key, header or checksum are
//! held over to the next [`feed`](ParseState::feed); payload bytes move
//! straight into the attribute being assembled. Splitting the input at any
//! byte boundary produces the same artifacts as feeding it whole.

use std::io::{ErrorKind, Read};

use tracing::{debug, info, warn};

use super::attribute::{
    attr_name_to_str, AttributeHeader, RawAttribute, ATTRIBUTE_HEADER_LEN, TNEF_SIGNATURE,
};
use super::cursor::ByteCursor;
use crate::config::DecoderOptions;
use crate::error::{Result, TnefError};
use crate::listener::{ArtifactListener, CollectingListener};
use crate::model::address::MessageHeader;
use crate::model::artifact::Artifact;
use crate::synth::Package;

/// Where the parser is in the stream.
#[derive(Debug)]
enum Stage {
    ExpectingSignature,
    ExpectingKey,
    ReadingAttributeHeader,
    ReadingAttributePayload(RawAttribute),
    AwaitingChecksum(RawAttribute),
    EndOfStream,
    /// A fatal error was returned; further input is ignored.
    Failed,
}

/// Everything that survives between two `feed` calls.
#[derive(Debug)]
pub struct ParseState {
    stage: Stage,
    /// Unconsumed bytes carried over from the previous chunk.
    pending: Vec<u8>,
    /// Absolute stream offset of `pending[0]`.
    offset: u64,
    /// Stream offset of the attribute currently being assembled.
    attr_offset: u64,
    key: Option<u16>,
    attributes: u64,
    package: Package,
}

impl Default for ParseState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseState {
    pub fn new() -> Self {
        Self {
            stage: Stage::ExpectingSignature,
            pending: Vec::new(),
            offset: 0,
            attr_offset: 0,
            key: None,
            attributes: 0,
            package: Package::default(),
        }
    }

    /// A parser whose attendee lookups can fall back to the headers of the
    /// enclosing mail message.
    pub fn with_header(header: MessageHeader) -> Self {
        Self {
            package: Package::new(Some(header)),
            ..Self::new()
        }
    }

    /// The TNEF key that follows the signature, once read.
    pub fn key(&self) -> Option<u16> {
        self.key
    }

    /// Number of attributes dispatched so far.
    pub fn attribute_count(&self) -> u64 {
        self.attributes
    }

    /// Total bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    pub fn code_page(&self) -> Option<u32> {
        self.package.code_page
    }

    pub fn message_class(&self) -> Option<&str> {
        self.package.message_class.as_deref()
    }

    /// Consume `chunk`, dispatching every attribute it completes.
    ///
    /// Returns an error for a bad signature or level byte, or when the
    /// listener fails. After an error the state is spent.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        match self.stage {
            Stage::Failed => {
                warn!(len = chunk.len(), "Ignoring input after a fatal decode error");
                return Ok(());
            }
            Stage::EndOfStream => {
                warn!(len = chunk.len(), "Ignoring input after end of stream");
                return Ok(());
            }
            _ => {}
        }

        self.pending.extend_from_slice(chunk);
        let mut cur = ByteCursor::new(&self.pending);

        loop {
            let stage = std::mem::replace(&mut self.stage, Stage::Failed);
            let next = match stage {
                Stage::ExpectingSignature => {
                    if cur.available() < 4 {
                        self.stage = stage;
                        break;
                    }
                    let signature = cur.read_u32_le()?;
                    if signature != TNEF_SIGNATURE {
                        return Err(TnefError::NotTnefFormat { signature });
                    }
                    Stage::ExpectingKey
                }
                Stage::ExpectingKey => {
                    if cur.available() < 2 {
                        self.stage = stage;
                        break;
                    }
                    let key = cur.read_u16_le()?;
                    debug!(key, "TNEF key");
                    self.key = Some(key);
                    Stage::ReadingAttributeHeader
                }
                Stage::ReadingAttributeHeader => {
                    if cur.available() < ATTRIBUTE_HEADER_LEN {
                        self.stage = stage;
                        break;
                    }
                    self.attr_offset = self.offset + cur.offset() as u64;
                    let header = AttributeHeader::read(&mut cur, self.offset)?;
                    Stage::ReadingAttributePayload(RawAttribute::new(header))
                }
                Stage::ReadingAttributePayload(mut attr) => {
                    attr.fill_from(&mut cur)?;
                    if !attr.is_complete() {
                        self.stage = Stage::ReadingAttributePayload(attr);
                        break;
                    }
                    Stage::AwaitingChecksum(attr)
                }
                Stage::AwaitingChecksum(attr) => {
                    if cur.available() < 2 {
                        self.stage = Stage::AwaitingChecksum(attr);
                        break;
                    }
                    let declared = cur.read_u16_le()?;
                    let actual = attr.checksum();
                    if declared != actual {
                        warn!(
                            offset = self.attr_offset,
                            name = attr_name_to_str(attr.name()),
                            declared,
                            actual,
                            "Attribute checksum mismatch"
                        );
                    }
                    if options.debug_level >= 1 {
                        debug!(offset = self.attr_offset, "{}", attr.describe());
                    }
                    self.attributes += 1;
                    self.package.dispatch(&attr, options, listener)?;
                    Stage::ReadingAttributeHeader
                }
                Stage::EndOfStream | Stage::Failed => {
                    self.stage = stage;
                    break;
                }
            };
            self.stage = next;
        }

        let consumed = cur.offset();
        self.pending.drain(..consumed);
        self.offset += consumed as u64;
        Ok(())
    }

    /// Signal end of input: flush the open attachment and close the stream.
    ///
    /// A stream that ends before its signature is complete is not TNEF.
    /// Leftover bytes and a partial final attribute are logged and dropped.
    pub fn finish(
        &mut self,
        _options: &DecoderOptions,
        listener: &mut dyn ArtifactListener,
    ) -> Result<()> {
        match std::mem::replace(&mut self.stage, Stage::EndOfStream) {
            Stage::ExpectingSignature => {
                self.stage = Stage::Failed;
                let mut sig = [0u8; 4];
                sig[..self.pending.len()].copy_from_slice(&self.pending);
                return Err(TnefError::NotTnefFormat {
                    signature: u32::from_le_bytes(sig),
                });
            }
            Stage::Failed => {
                self.stage = Stage::Failed;
                return Ok(());
            }
            Stage::EndOfStream => return Ok(()),
            Stage::ExpectingKey => {
                warn!(offset = self.offset, "Stream ended before the TNEF key");
            }
            Stage::ReadingAttributeHeader => {
                if !self.pending.is_empty() {
                    warn!(
                        offset = self.offset,
                        len = self.pending.len(),
                        "Ignoring trailing bytes at end of stream"
                    );
                }
            }
            Stage::ReadingAttributePayload(attr) => {
                warn!(
                    offset = self.attr_offset,
                    name = attr_name_to_str(attr.name()),
                    missing = attr.remaining(),
                    "Dropping truncated attribute at end of stream"
                );
            }
            Stage::AwaitingChecksum(attr) => {
                warn!(
                    offset = self.attr_offset,
                    name = attr_name_to_str(attr.name()),
                    "Dropping attribute without checksum at end of stream"
                );
            }
        }
        self.pending.clear();
        self.package.flush_attachment(listener)?;
        info!(
            attributes = self.attributes,
            bytes = self.offset,
            "TNEF stream decoded"
        );
        Ok(())
    }
}

/// Decode a complete in-memory stream into its artifacts.
pub fn decode_all(bytes: &[u8], options: &DecoderOptions) -> Result<Vec<Artifact>> {
    let mut state = ParseState::new();
    let mut out = CollectingListener::new();
    state.feed(bytes, options, &mut out)?;
    state.finish(options, &mut out)?;
    Ok(out.into_artifacts())
}

/// Decode a stream read from `reader` in chunks of `chunk_size` bytes.
///
/// `progress` receives the running byte count after every chunk.
/// Returns the number of bytes read.
pub fn decode_reader<R: Read>(
    mut reader: R,
    state: &mut ParseState,
    chunk_size: usize,
    options: &DecoderOptions,
    listener: &mut dyn ArtifactListener,
    progress: Option<&dyn Fn(u64)>,
) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        state.feed(&buf[..n], options, listener)?;
        total += n as u64;
        if let Some(cb) = progress {
            cb(total);
        }
    }
    state.finish(options, listener)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::attribute::{checksum, ATTR_ATTACH_DATA, ATTR_ATTACH_TITLE, ATTR_BODY};

    fn record(level: u8, name: u16, attr_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![level];
        v.extend_from_slice(&name.to_le_bytes());
        v.extend_from_slice(&attr_type.to_le_bytes());
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(payload);
        v.extend_from_slice(&checksum(payload).to_le_bytes());
        v
    }

    fn stream(records: &[Vec<u8>]) -> Vec<u8> {
        let mut v = TNEF_SIGNATURE.to_le_bytes().to_vec();
        v.extend_from_slice(&0x0102u16.to_le_bytes());
        for r in records {
            v.extend_from_slice(r);
        }
        v
    }

    #[test]
    fn test_bad_signature() {
        let err = decode_all(b"PK\x03\x04rest", &DecoderOptions::default()).unwrap_err();
        assert!(matches!(err, TnefError::NotTnefFormat { signature: 0x0403_4b50 }));
    }

    #[test]
    fn test_short_input_is_not_tnef() {
        let err = decode_all(&[0x78, 0x9f], &DecoderOptions::default()).unwrap_err();
        assert!(matches!(err, TnefError::NotTnefFormat { .. }));
    }

    #[test]
    fn test_header_only_stream() {
        let bytes = stream(&[]);
        let arts = decode_all(&bytes, &DecoderOptions::default()).unwrap();
        assert!(arts.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = stream(&[
            record(2, ATTR_ATTACH_TITLE, 0x0001, b"x.bin\0"),
            record(2, ATTR_ATTACH_DATA, 0x0006, &[1, 2, 3, 4, 5]),
        ]);
        let opts = DecoderOptions::default();
        let mut state = ParseState::new();
        let mut out = CollectingListener::new();
        for b in &bytes {
            state.feed(std::slice::from_ref(b), &opts, &mut out).unwrap();
        }
        state.finish(&opts, &mut out).unwrap();
        assert_eq!(state.key(), Some(0x0102));
        assert_eq!(state.attribute_count(), 2);
        assert_eq!(state.bytes_consumed(), bytes.len() as u64);
        let arts = out.into_artifacts();
        assert_eq!(arts.len(), 1);
        assert_eq!(arts[0].name, "x.bin");
        assert_eq!(arts[0].bytes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bad_level_is_fatal() {
        let mut bytes = stream(&[record(1, ATTR_BODY, 0x0002, b"hi")]);
        bytes.extend_from_slice(&record(7, ATTR_BODY, 0x0002, b"hi"));
        let err = decode_all(&bytes, &DecoderOptions::default()).unwrap_err();
        assert!(matches!(err, TnefError::MalformedAttribute { level: 7, offset: 19 }));
    }

    #[test]
    fn test_truncated_attribute_dropped() {
        let mut bytes = stream(&[record(1, ATTR_BODY, 0x0002, b"one")]);
        let second = record(1, ATTR_BODY, 0x0002, b"two");
        bytes.extend_from_slice(&second[..second.len() - 3]);
        let arts = decode_all(&bytes, &DecoderOptions::default()).unwrap();
        assert_eq!(arts.len(), 1);
        assert_eq!(arts[0].bytes, b"one");
    }

    #[test]
    fn test_feed_after_finish_is_ignored() {
        let bytes = stream(&[]);
        let opts = DecoderOptions::default();
        let mut state = ParseState::new();
        let mut out = CollectingListener::new();
        state.feed(&bytes, &opts, &mut out).unwrap();
        state.finish(&opts, &mut out).unwrap();
        state
            .feed(&record(1, ATTR_BODY, 0x0002, b"late"), &opts, &mut out)
            .unwrap();
        assert!(out.artifacts.is_empty());
    }

    #[test]
    fn test_decode_reader_progress() {
        let bytes = stream(&[record(1, ATTR_BODY, 0x0002, b"body text")]);
        let opts = DecoderOptions::default();
        let mut state = ParseState::new();
        let mut out = CollectingListener::new();
        let seen = std::cell::Cell::new(0u64);
        let cb = |n: u64| seen.set(n);
        let total = decode_reader(&bytes[..], &mut state, 7, &opts, &mut out, Some(&cb)).unwrap();
        assert_eq!(total, bytes.len() as u64);
        assert_eq!(seen.get(), bytes.len() as u64);
        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].name, "body_part_0.txt");
    }
}
