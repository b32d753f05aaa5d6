//! TNEF decoding: byte cursor, numeric codecs, attribute stream, MAPI
//! properties, compressed RTF, and the MIME container around it.

pub mod attribute;
pub mod codepage;
pub mod cursor;
pub mod mapi;
pub mod mime;
pub mod numeric;
pub mod rtf;
pub mod stream;
pub mod tags;

pub use stream::{decode_all, decode_reader, ParseState};
