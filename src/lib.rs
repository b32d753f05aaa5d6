//! `tnefshell`: a decoder for TNEF (`winmail.dat`) streams.
//!
//! The library turns a TNEF byte stream into artifacts: attached files,
//! message bodies (plain text, HTML, decompressed RTF), an iCalendar event
//! for meeting requests and a vCard for contact items. Decoding is
//! incremental: a [`parser::ParseState`] can be fed arbitrarily sized
//! chunks, and artifacts are delivered through a [`listener::ArtifactListener`].

pub mod config;
pub mod error;
pub mod export;
pub mod listener;
pub mod model;
pub mod parser;
pub mod synth;
