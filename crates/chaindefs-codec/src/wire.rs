//! Protobuf-compatible field encoding.
//!
//! Only the two wire types the definition messages use are supported:
//! varint (0) and length-delimited (2). Fields are written in the order the
//! caller emits them and every field is always present, so output is a pure
//! function of the field values.

use crate::error::{CodecError, CodecResult};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_LEN: u8 = 2;

/// Append `value` as a LEB128 varint.
pub fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a LEB128 varint. Returns (value, bytes_consumed).
pub fn decode_varint(data: &[u8]) -> CodecResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
        if shift >= 64 {
            return Err(CodecError::Malformed("varint overflow".into()));
        }
    }
    Err(CodecError::Truncated("varint"))
}

/// Builds one message body field by field.
#[derive(Debug, Default)]
pub struct ProtoWriter {
    buf: Vec<u8>,
}

impl ProtoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, field: u32, wire_type: u8) {
        encode_varint(&mut self.buf, ((field as u64) << 3) | wire_type as u64);
    }

    pub fn varint(&mut self, field: u32, value: u64) -> &mut Self {
        self.key(field, WIRE_VARINT);
        encode_varint(&mut self.buf, value);
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.key(field, WIRE_LEN);
        encode_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

/// Iterates the fields of one message body.
pub struct ProtoReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProtoReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next `(field_number, value)`, or `None` at the end of the body.
    pub fn next_field(&mut self) -> CodecResult<Option<(u32, FieldValue<'a>)>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let (key, used) = decode_varint(&self.data[self.pos..])?;
        self.pos += used;
        let field = u32::try_from(key >> 3)
            .map_err(|_| CodecError::Malformed(format!("field number {}", key >> 3)))?;
        match (key & 0x7) as u8 {
            WIRE_VARINT => {
                let (value, used) = decode_varint(&self.data[self.pos..])?;
                self.pos += used;
                Ok(Some((field, FieldValue::Varint(value))))
            }
            WIRE_LEN => {
                let (len, used) = decode_varint(&self.data[self.pos..])?;
                self.pos += used;
                let end = usize::try_from(len)
                    .ok()
                    .and_then(|len| self.pos.checked_add(len))
                    .filter(|end| *end <= self.data.len())
                    .ok_or(CodecError::Truncated("length-delimited field"))?;
                let value = &self.data[self.pos..end];
                self.pos = end;
                Ok(Some((field, FieldValue::Bytes(value))))
            }
            other => Err(CodecError::Malformed(format!("unsupported wire type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_known_encodings() {
        let cases: [(u64, &[u8]); 4] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (300, &[0xac, 0x02]),
            (u64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            assert_eq!(buf, expected, "encoding {value}");
            assert_eq!(decode_varint(&buf).unwrap(), (value, expected.len()));
        }
    }

    #[test]
    fn varint_truncated() {
        assert_eq!(decode_varint(&[0x80]), Err(CodecError::Truncated("varint")));
        assert_eq!(decode_varint(&[]), Err(CodecError::Truncated("varint")));
    }

    #[test]
    fn varint_overflow() {
        assert!(matches!(
            decode_varint(&[0xff; 11]),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn writer_matches_protobuf_layout() {
        let mut w = ProtoWriter::new();
        w.varint(1, 150).string(2, "hi");
        assert_eq!(w.finish(), vec![0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i']);
    }

    #[test]
    fn reader_walks_fields() {
        let mut w = ProtoWriter::new();
        w.varint(1, 7).bytes(5, &[1, 2, 3]);
        let body = w.finish();

        let mut r = ProtoReader::new(&body);
        assert_eq!(r.next_field().unwrap(), Some((1, FieldValue::Varint(7))));
        assert_eq!(
            r.next_field().unwrap(),
            Some((5, FieldValue::Bytes(&[1, 2, 3])))
        );
        assert_eq!(r.next_field().unwrap(), None);
    }

    #[test]
    fn reader_rejects_overlong_length() {
        let body = [0x12, 0x05, b'a'];
        let mut r = ProtoReader::new(&body);
        assert_eq!(
            r.next_field(),
            Err(CodecError::Truncated("length-delimited field"))
        );
    }
}
