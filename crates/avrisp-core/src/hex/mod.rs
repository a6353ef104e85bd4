//! Intel HEX image handling
//!
//! Decodes single Intel HEX lines into records and provides the sequential
//! line sources a programming session reads its image from.
//!
//! Only data (00) and end-of-file (01) records are interpreted. Address
//! and checksum fields are not validated: the flash address is derived
//! from the order in which data bytes arrive.

mod record;
mod source;

pub use record::{HexRecord, RecordError, RecordType, MAX_RECORD_DATA};
pub use source::{
    count_lines, estimate_lines_from_size, LineBuffer, LineSource, ReaderSource, SliceSource,
    MAX_LINE_LEN, RECORD_LINE_WIDTH,
};
