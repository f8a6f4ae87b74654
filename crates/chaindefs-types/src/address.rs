//! Decoded account identifiers.
//!
//! Records keep addresses in their textual form (that is what the definitions
//! file stores and what the primary key compares). These types are the
//! decoded, fixed-length byte forms used on the wire.

use std::fmt;

use crate::error::TypeError;
use crate::limits::{EVM_ADDRESS_LEN, SOLANA_MINT_LEN};

/// A 20-byte EVM account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvmAddress([u8; EVM_ADDRESS_LEN]);

impl EvmAddress {
    /// Parse a `0x`-prefixed hex address. Case is ignored.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| invalid("missing 0x prefix"))?;
        let bytes = hex::decode(hex_part).map_err(|e| invalid(&e.to_string()))?;
        let arr: [u8; EVM_ADDRESS_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| invalid(&format!("expected {EVM_ADDRESS_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn from_bytes(bytes: [u8; EVM_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; EVM_ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_plain_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_plain_hex())
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({self})")
    }
}

/// A 32-byte Solana mint public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolanaMint([u8; SOLANA_MINT_LEN]);

impl SolanaMint {
    /// Parse the base-58 text form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: String| TypeError::InvalidMint {
            mint: s.to_string(),
            reason,
        };
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| invalid(e.to_string()))?;
        let arr: [u8; SOLANA_MINT_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| invalid(format!("expected {SOLANA_MINT_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn from_bytes(bytes: [u8; SOLANA_MINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SOLANA_MINT_LEN] {
        &self.0
    }
}

impl fmt::Display for SolanaMint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for SolanaMint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SolanaMint({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercase_address() {
        let addr = EvmAddress::parse("0x0000000000085d4780b73119b644ae5ecd22b376").unwrap();
        assert_eq!(addr.as_bytes()[19], 0x76);
        assert_eq!(addr.to_string(), "0x0000000000085d4780b73119b644ae5ecd22b376");
    }

    #[test]
    fn parses_checksummed_address_case_insensitively() {
        let upper = EvmAddress::parse("0x0000000000085D4780B73119B644AE5ECD22B376").unwrap();
        let lower = EvmAddress::parse("0x0000000000085d4780b73119b644ae5ecd22b376").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = EvmAddress::parse("0000000000085d4780b73119b644ae5ecd22b376").unwrap_err();
        assert!(matches!(err, TypeError::InvalidAddress { .. }));
    }

    #[test]
    fn rejects_short_address() {
        let err = EvmAddress::parse("0x1234").unwrap_err();
        match err {
            TypeError::InvalidAddress { reason, .. } => assert!(reason.contains("expected 20")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_non_hex_address() {
        assert!(EvmAddress::parse("0xzz00000000085d4780b73119b644ae5ecd22b376").is_err());
    }

    #[test]
    fn mint_roundtrips_through_base58() {
        let mint = SolanaMint::from_bytes([7u8; 32]);
        let text = mint.to_string();
        assert_eq!(SolanaMint::parse(&text).unwrap(), mint);
    }

    #[test]
    fn known_mint_decodes_to_32_bytes() {
        // USDC on Solana.
        let mint = SolanaMint::parse("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
        assert_eq!(mint.as_bytes().len(), 32);
    }

    #[test]
    fn rejects_mint_with_wrong_length() {
        let short = bs58::encode([1u8; 20]).into_string();
        assert!(matches!(
            SolanaMint::parse(&short),
            Err(TypeError::InvalidMint { .. })
        ));
    }

    #[test]
    fn rejects_invalid_base58() {
        // '0' is not in the base-58 alphabet.
        assert!(SolanaMint::parse("0OIl").is_err());
    }
}
