//! Core data model: artifacts, the attachment being assembled, and addresses.

pub mod address;
pub mod artifact;
pub mod attachment;
