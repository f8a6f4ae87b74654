use chaindefs_types::limits::MAX_STRING_LEN;
use chaindefs_types::{
    Definition, DefinitionKind, EvmAddress, Network, Record, SolanaMint, SolanaToken, Token,
};

use crate::error::{CodecError, CodecResult};
use crate::payload::{PayloadHeader, HEADER_LEN};
use crate::wire::{FieldValue, ProtoReader, ProtoWriter};

/// Serialize one record with the batch `timestamp`.
///
/// Fails with [`CodecError::Encoding`] naming the record and field when a
/// string exceeds the length cap, an address or mint does not decode, or the
/// timestamp does not fit the header.
pub fn serialize(definition: &Definition, timestamp: u64) -> CodecResult<Vec<u8>> {
    let fail = |field: &'static str, reason: String| CodecError::Encoding {
        key: definition.key(),
        field,
        reason,
    };
    let timestamp = u32::try_from(timestamp)
        .map_err(|_| fail("timestamp", format!("{timestamp} does not fit in 32 bits")))?;
    check_len("symbol", definition.symbol()).map_err(|r| fail("symbol", r))?;
    check_len("name", definition.name()).map_err(|r| fail("name", r))?;

    let mut w = ProtoWriter::new();
    match definition {
        Definition::Network(n) => {
            w.varint(1, n.chain_id)
                .string(2, &n.symbol)
                .varint(3, n.slip44 as u64)
                .string(4, &n.name);
        }
        Definition::Token(t) => {
            let address = t.evm_address().map_err(|e| fail("address", e.to_string()))?;
            w.bytes(1, address.as_bytes())
                .varint(2, t.chain_id)
                .string(3, &t.symbol)
                .varint(4, t.decimals as u64)
                .string(5, &t.name);
        }
        Definition::SolanaToken(s) => {
            let mint = s.solana_mint().map_err(|e| fail("mint", e.to_string()))?;
            w.bytes(1, mint.as_bytes())
                .string(2, &s.symbol)
                .string(3, &s.name);
        }
    }
    let data = w.finish();
    let data_len = u16::try_from(data.len())
        .map_err(|_| fail("data", format!("{} bytes exceeds 65535", data.len())))?;

    let mut out = Vec::with_capacity(HEADER_LEN + data.len());
    PayloadHeader {
        kind: definition.kind(),
        timestamp,
        data_len,
    }
    .encode(&mut out);
    out.extend_from_slice(&data);
    tracing::trace!(key = %definition.key(), len = out.len(), "serialized definition");
    Ok(out)
}

fn check_len(field: &str, value: &str) -> Result<(), String> {
    if value.len() > MAX_STRING_LEN {
        Err(format!(
            "{field} is {} bytes, limit is {MAX_STRING_LEN}",
            value.len()
        ))
    } else {
        Ok(())
    }
}

/// Decode a serialized record. `data` must hold exactly one payload.
///
/// Only wire fields are recovered: external id, rank and tombstone flag are
/// never serialized.
pub fn deserialize(data: &[u8]) -> CodecResult<(PayloadHeader, Definition)> {
    let header = PayloadHeader::parse(data)?;
    if data.len() != header.payload_len() {
        return Err(CodecError::Malformed(format!(
            "payload declares {} bytes, got {}",
            header.payload_len(),
            data.len()
        )));
    }
    let fields = Fields::read(&data[HEADER_LEN..])?;
    let definition = match header.kind {
        DefinitionKind::Network => Definition::Network(Network {
            chain_id: fields.varint(1)?,
            symbol: fields.string(2)?,
            slip44: u32::try_from(fields.varint(3)?)
                .map_err(|_| CodecError::Malformed("slip44 out of range".into()))?,
            name: fields.string(4)?,
            is_testnet: false,
            external_id: None,
            external_rank: None,
            deleted: false,
        }),
        DefinitionKind::Token => Definition::Token(Token {
            address: EvmAddress::from_bytes(fields.fixed(1)?).to_string(),
            chain_id: fields.varint(2)?,
            symbol: fields.string(3)?,
            decimals: u8::try_from(fields.varint(4)?)
                .map_err(|_| CodecError::Malformed("decimals out of range".into()))?,
            name: fields.string(5)?,
            external_id: None,
            external_rank: None,
            deleted: false,
        }),
        DefinitionKind::SolanaToken => Definition::SolanaToken(SolanaToken {
            mint: SolanaMint::from_bytes(fields.fixed(1)?).to_string(),
            symbol: fields.string(2)?,
            name: fields.string(3)?,
            external_id: None,
            external_rank: None,
            deleted: false,
        }),
    };
    Ok((header, definition))
}

struct Fields<'a>(Vec<(u32, FieldValue<'a>)>);

impl<'a> Fields<'a> {
    fn read(body: &'a [u8]) -> CodecResult<Self> {
        let mut reader = ProtoReader::new(body);
        let mut fields = Vec::new();
        while let Some(field) = reader.next_field()? {
            fields.push(field);
        }
        Ok(Self(fields))
    }

    fn get(&self, number: u32) -> CodecResult<FieldValue<'a>> {
        self.0
            .iter()
            .rev()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| *v)
            .ok_or_else(|| CodecError::Malformed(format!("missing field {number}")))
    }

    fn varint(&self, number: u32) -> CodecResult<u64> {
        match self.get(number)? {
            FieldValue::Varint(v) => Ok(v),
            FieldValue::Bytes(_) => Err(CodecError::Malformed(format!(
                "field {number} should be a varint"
            ))),
        }
    }

    fn bytes(&self, number: u32) -> CodecResult<&'a [u8]> {
        match self.get(number)? {
            FieldValue::Bytes(b) => Ok(b),
            FieldValue::Varint(_) => Err(CodecError::Malformed(format!(
                "field {number} should be length-delimited"
            ))),
        }
    }

    fn string(&self, number: u32) -> CodecResult<String> {
        String::from_utf8(self.bytes(number)?.to_vec())
            .map_err(|_| CodecError::Malformed(format!("field {number} is not UTF-8")))
    }

    fn fixed<const N: usize>(&self, number: u32) -> CodecResult<[u8; N]> {
        self.bytes(number)?.try_into().map_err(|_| {
            CodecError::Malformed(format!("field {number} should be {} bytes", N))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindefs_types::DefinitionKey;
    use proptest::prelude::*;

    const TS: u64 = 1_700_000_000;

    fn eth() -> Definition {
        Definition::Network(Network {
            chain_id: 1,
            symbol: "ETH".into(),
            name: "Ethereum".into(),
            slip44: 60,
            is_testnet: false,
            external_id: Some("ethereum".into()),
            external_rank: Some(2),
            deleted: false,
        })
    }

    fn tst() -> Token {
        Token {
            chain_id: 1,
            address: "0x0000000000000000000000000000000000000001".into(),
            symbol: "TST".into(),
            decimals: 18,
            name: "Test".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        }
    }

    #[test]
    fn network_bytes() {
        let bytes = serialize(&eth(), TS).unwrap();
        let mut expected = b"trzd1".to_vec();
        expected.push(0);
        expected.extend_from_slice(&(TS as u32).to_le_bytes());
        expected.extend_from_slice(&[19, 0]);
        expected.extend_from_slice(&[0x08, 0x01, 0x12, 0x03]);
        expected.extend_from_slice(b"ETH");
        expected.extend_from_slice(&[0x18, 0x3c, 0x22, 0x08]);
        expected.extend_from_slice(b"Ethereum");
        assert_eq!(hex::encode(&bytes), hex::encode(&expected));
    }

    #[test]
    fn token_bytes() {
        let bytes = serialize(&Definition::Token(tst()), TS).unwrap();
        let header = PayloadHeader::parse(&bytes).unwrap();
        assert_eq!(header.kind, DefinitionKind::Token);
        assert_eq!(header.data_len, 37);
        let data = &bytes[HEADER_LEN..];
        assert_eq!(&data[..2], &[0x0a, 0x14]);
        assert_eq!(data[21], 0x01);
        assert_eq!(&data[22..24], &[0x10, 0x01]);
        assert_eq!(&data[29..31], &[0x20, 18]);
    }

    #[test]
    fn rank_and_external_id_do_not_affect_bytes() {
        let mut other = eth();
        if let Definition::Network(n) = &mut other {
            n.external_rank = None;
            n.external_id = None;
        }
        assert_eq!(serialize(&eth(), TS).unwrap(), serialize(&other, TS).unwrap());
    }

    #[test]
    fn address_case_does_not_affect_bytes() {
        let mut upper = tst();
        upper.address = "0x00000000000000000000000000000000000000AB".into();
        let mut lower = tst();
        lower.address = "0x00000000000000000000000000000000000000ab".into();
        assert_eq!(
            serialize(&Definition::Token(upper), TS).unwrap(),
            serialize(&Definition::Token(lower), TS).unwrap()
        );
    }

    #[test]
    fn oversized_name_is_an_encoding_error() {
        let mut token = tst();
        token.name = "x".repeat(257);
        let err = serialize(&Definition::Token(token.clone()), TS).unwrap_err();
        match err {
            CodecError::Encoding { key, field, .. } => {
                assert_eq!(key, token.key());
                assert_eq!(field, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_address_is_an_encoding_error() {
        let mut token = tst();
        token.address = "0x1234".into();
        assert!(matches!(
            serialize(&Definition::Token(token), TS),
            Err(CodecError::Encoding { field: "address", .. })
        ));
    }

    #[test]
    fn bad_mint_is_an_encoding_error() {
        let token = SolanaToken {
            mint: "not-base58-0OIl".into(),
            symbol: "X".into(),
            name: "X".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        };
        let err = serialize(&Definition::SolanaToken(token), TS).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Encoding {
                key: DefinitionKey::SolanaToken { .. },
                field: "mint",
                ..
            }
        ));
    }

    #[test]
    fn timestamp_must_fit_u32() {
        assert!(matches!(
            serialize(&eth(), u64::from(u32::MAX) + 1),
            Err(CodecError::Encoding { field: "timestamp", .. })
        ));
    }

    #[test]
    fn deserialize_recovers_wire_fields() {
        let token = tst();
        let bytes = serialize(&Definition::Token(token.clone()), TS).unwrap();
        let (header, decoded) = deserialize(&bytes).unwrap();
        assert_eq!(header.timestamp, TS as u32);
        assert_eq!(decoded, Definition::Token(token));
    }

    #[test]
    fn deserialize_solana_token() {
        let token = SolanaToken {
            mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            symbol: "USDC".into(),
            name: "USD Coin".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        };
        let bytes = serialize(&Definition::SolanaToken(token.clone()), TS).unwrap();
        assert_eq!(deserialize(&bytes).unwrap().1, Definition::SolanaToken(token));
    }

    #[test]
    fn deserialize_rejects_trailing_bytes() {
        let mut bytes = serialize(&eth(), TS).unwrap();
        bytes.push(0);
        assert!(matches!(deserialize(&bytes), Err(CodecError::Malformed(_))));
    }

    proptest! {
        #[test]
        fn serialization_is_deterministic(
            chain_id in any::<u64>(),
            slip44 in any::<u32>(),
            symbol in "[A-Za-z0-9]{0,16}",
            name in "[A-Za-z0-9 ]{0,64}",
            ts in any::<u32>(),
        ) {
            let network = Definition::Network(Network {
                chain_id,
                symbol,
                name,
                slip44,
                is_testnet: false,
                external_id: None,
                external_rank: None,
                deleted: false,
            });
            let a = serialize(&network, ts as u64).unwrap();
            let b = serialize(&network.clone(), ts as u64).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(deserialize(&a).unwrap().1, network);
        }
    }
}
