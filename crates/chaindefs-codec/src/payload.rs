use chaindefs_types::limits::FORMAT_MAGIC;
use chaindefs_types::DefinitionKind;

use crate::error::{CodecError, CodecResult};

/// Header length: magic, type byte, timestamp, data length.
pub const HEADER_LEN: usize = FORMAT_MAGIC.len() + 1 + 4 + 2;

/// Fixed header preceding every serialized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub kind: DefinitionKind,
    pub timestamp: u32,
    pub data_len: u16,
}

impl PayloadHeader {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(FORMAT_MAGIC);
        buf.push(self.kind.type_byte());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.data_len.to_le_bytes());
    }

    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> CodecResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::Truncated("payload header"));
        }
        let (magic, rest) = data.split_at(FORMAT_MAGIC.len());
        if magic != FORMAT_MAGIC {
            return Err(CodecError::BadMagic);
        }
        let kind = DefinitionKind::from_type_byte(rest[0]).ok_or(CodecError::UnknownType(rest[0]))?;
        let timestamp = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]);
        let data_len = u16::from_le_bytes([rest[5], rest[6]]);
        Ok(Self {
            kind,
            timestamp,
            data_len,
        })
    }

    /// Total payload length: header plus data.
    pub fn payload_len(&self) -> usize {
        HEADER_LEN + self.data_len as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = PayloadHeader {
            kind: DefinitionKind::Token,
            timestamp: 0x0102_0304,
            data_len: 0x0506,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(&buf[..5], b"trzd1");
        assert_eq!(&buf[5..], &[1, 0x04, 0x03, 0x02, 0x01, 0x06, 0x05]);
        assert_eq!(PayloadHeader::parse(&buf).unwrap(), header);
        assert_eq!(header.payload_len(), 12 + 0x0506);
    }

    #[test]
    fn rejects_bad_magic_and_type() {
        let mut buf = b"trzd2".to_vec();
        buf.extend_from_slice(&[0; 7]);
        assert_eq!(PayloadHeader::parse(&buf), Err(CodecError::BadMagic));

        let mut buf = b"trzd1".to_vec();
        buf.extend_from_slice(&[9, 0, 0, 0, 0, 0, 0]);
        assert_eq!(PayloadHeader::parse(&buf), Err(CodecError::UnknownType(9)));

        assert_eq!(
            PayloadHeader::parse(b"trzd1"),
            Err(CodecError::Truncated("payload header"))
        );
    }
}
