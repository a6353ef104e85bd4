//! Intel HEX record decoding

use core::fmt;
use heapless::Vec;

/// Maximum payload of one record
pub const MAX_RECORD_DATA: usize = 255;

const BYTE_COUNT_POS: usize = 1;
const RECORD_TYPE_POS: usize = 7;
const DATA_POS: usize = 9;

/// Record type field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Type 00: data bytes
    Data,
    /// Type 01: end of file
    EndOfFile,
    /// Any other type, ignored by the programmer
    Other(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => RecordType::Data,
            0x01 => RecordType::EndOfFile,
            other => RecordType::Other(other),
        }
    }
}

/// Reason a line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordError {
    /// The record type field is missing or not a hex byte
    InvalidRecordType,
    /// The byte count field is missing or not a hex byte
    InvalidByteCount,
    /// A data byte is missing or not a hex byte
    InvalidDataByte {
        /// Position of the byte within the record payload
        index: usize,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::InvalidRecordType => write!(f, "invalid record type"),
            RecordError::InvalidByteCount => write!(f, "invalid byte count"),
            RecordError::InvalidDataByte { index } => write!(f, "invalid data byte {}", index),
        }
    }
}

/// One decoded Intel HEX line
///
/// Only the fields the programmer consumes are decoded. The load offset and
/// checksum are skipped: flash addresses follow the order in which data
/// arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// Record type
    pub record_type: RecordType,
    /// Byte count field as declared by the line
    pub byte_count: u8,
    /// Payload bytes, `byte_count` of them for data records
    pub data: Vec<u8, MAX_RECORD_DATA>,
}

impl HexRecord {
    /// Decode one line of the form `:BBAAAATTDD..DDCC`
    ///
    /// The line must not include its newline; a trailing carriage return is
    /// harmless since fields are located by position. Fields are decoded in
    /// the order type, count, data, and the first bad field rejects the
    /// whole line.
    pub fn parse(line: &[u8]) -> Result<Self, RecordError> {
        let record_type = decode_byte(line, RECORD_TYPE_POS)
            .map(RecordType::from)
            .ok_or(RecordError::InvalidRecordType)?;
        let byte_count =
            decode_byte(line, BYTE_COUNT_POS).ok_or(RecordError::InvalidByteCount)?;

        let mut data = Vec::new();
        if record_type == RecordType::Data {
            for index in 0..byte_count as usize {
                let byte = decode_byte(line, DATA_POS + index * 2)
                    .ok_or(RecordError::InvalidDataByte { index })?;
                // Capacity equals the largest possible byte count
                let _ = data.push(byte);
            }
        }

        Ok(Self {
            record_type,
            byte_count,
            data,
        })
    }

    /// Payload of a data record, empty for every other type
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Decode the two hex digits at `pos`
fn decode_byte(line: &[u8], pos: usize) -> Option<u8> {
    let digits = line.get(pos..pos + 2)?;
    Some(nibble(digits[0])? << 4 | nibble(digits[1])?)
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_record() {
        let rec = HexRecord::parse(b":10010000214601360121470136007EFE09D2190140").unwrap();
        assert_eq!(rec.record_type, RecordType::Data);
        assert_eq!(rec.byte_count, 0x10);
        assert_eq!(
            rec.data(),
            &[
                0x21, 0x46, 0x01, 0x36, 0x01, 0x21, 0x47, 0x01, 0x36, 0x00, 0x7E, 0xFE, 0x09,
                0xD2, 0x19, 0x01
            ]
        );
    }

    #[test]
    fn test_parse_eof_and_other() {
        let eof = HexRecord::parse(b":00000001FF").unwrap();
        assert_eq!(eof.record_type, RecordType::EndOfFile);
        assert!(eof.data().is_empty());

        // Extended linear address records carry data that must not reach flash
        let ela = HexRecord::parse(b":020000040800F2").unwrap();
        assert_eq!(ela.record_type, RecordType::Other(0x04));
        assert_eq!(ela.byte_count, 2);
        assert!(ela.data().is_empty());
    }

    #[test]
    fn test_carriage_return_ignored() {
        let rec = HexRecord::parse(b":0200000012AB41\r").unwrap();
        assert_eq!(rec.data(), &[0x12, 0xAB]);
    }

    #[test]
    fn test_lowercase_digits() {
        let rec = HexRecord::parse(b":02000000beef53").unwrap();
        assert_eq!(rec.data(), &[0xBE, 0xEF]);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            HexRecord::parse(b":100000zz00"),
            Err(RecordError::InvalidRecordType)
        );
        assert_eq!(
            HexRecord::parse(b":G0000000AB"),
            Err(RecordError::InvalidByteCount)
        );
        assert_eq!(
            HexRecord::parse(b":0300000012X456"),
            Err(RecordError::InvalidDataByte { index: 1 })
        );
        // Declared count longer than the line
        assert_eq!(
            HexRecord::parse(b":04000000AABB"),
            Err(RecordError::InvalidDataByte { index: 2 })
        );
        assert_eq!(HexRecord::parse(b""), Err(RecordError::InvalidRecordType));
        // Signs are not hex digits
        assert_eq!(
            HexRecord::parse(b":+1000000"),
            Err(RecordError::InvalidByteCount)
        );
    }

    #[test]
    fn test_full_length_record() {
        let mut line = std::vec::Vec::from(&b":FF000000"[..]);
        for i in 0..255u32 {
            line.extend_from_slice(std::format!("{:02X}", i as u8).as_bytes());
        }
        line.extend_from_slice(b"00");
        let rec = HexRecord::parse(&line).unwrap();
        assert_eq!(rec.data().len(), 255);
        assert_eq!(rec.data()[254], 254);
    }
}
