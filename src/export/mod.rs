//! Artifact sinks.

pub mod directory;
