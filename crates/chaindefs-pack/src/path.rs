use std::path::{Path, PathBuf};

use chaindefs_types::Definition;

use crate::error::PackResult;

/// One output location of an artifact, relative to the output root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPath {
    pub components: Vec<String>,
    /// Whether an existing file here is an expected duplicate rather than a
    /// conflict.
    pub exists_ok: bool,
}

impl OutputPath {
    fn new(components: &[&str], exists_ok: bool) -> Self {
        Self {
            components: components.iter().map(|c| c.to_string()).collect(),
            exists_ok,
        }
    }

    /// Locations for one record.
    ///
    /// Networks go under both their chain id and their slip44 id; many
    /// networks share a slip44 id, so that location tolerates an existing
    /// file. Tokens go under chain id and lowercase address, Solana tokens
    /// under their mint.
    pub fn for_definition(definition: &Definition) -> PackResult<Vec<Self>> {
        Ok(match definition {
            Definition::Network(n) => {
                let chain_id = n.chain_id.to_string();
                let slip44 = n.slip44.to_string();
                vec![
                    Self::new(&["eth", "chain-id", chain_id.as_str(), "network.dat"], false),
                    Self::new(&["eth", "slip44", slip44.as_str(), "network.dat"], true),
                ]
            }
            Definition::Token(t) => {
                let chain_id = t.chain_id.to_string();
                let file = format!("token-{}.dat", t.evm_address()?.to_plain_hex());
                vec![Self::new(&["eth", "chain-id", chain_id.as_str(), file.as_str()], false)]
            }
            Definition::SolanaToken(s) => {
                let file = format!("{}.dat", s.solana_mint()?);
                vec![Self::new(&["solana", "token", file.as_str()], false)]
            }
        })
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.components.iter().fold(root.to_path_buf(), |p, c| p.join(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindefs_types::{Network, SolanaToken, Token};

    #[test]
    fn network_has_two_locations() {
        let network = Definition::Network(Network {
            chain_id: 61,
            symbol: "ETC".into(),
            name: "Ethereum Classic".into(),
            slip44: 61,
            is_testnet: false,
            external_id: None,
            external_rank: None,
            deleted: false,
        });
        let paths = OutputPath::for_definition(&network).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0].resolve(Path::new("out")),
            Path::new("out/eth/chain-id/61/network.dat")
        );
        assert!(!paths[0].exists_ok);
        assert_eq!(
            paths[1].resolve(Path::new("out")),
            Path::new("out/eth/slip44/61/network.dat")
        );
        assert!(paths[1].exists_ok);
    }

    #[test]
    fn token_path_uses_lowercase_address() {
        let token = Definition::Token(Token {
            chain_id: 1,
            address: "0xDAC17F958D2EE523A2206206994597C13D831EC7".into(),
            symbol: "USDT".into(),
            decimals: 6,
            name: "Tether".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        });
        let paths = OutputPath::for_definition(&token).unwrap();
        assert_eq!(
            paths[0].components,
            vec![
                "eth",
                "chain-id",
                "1",
                "token-dac17f958d2ee523a2206206994597c13d831ec7.dat"
            ]
        );
    }

    #[test]
    fn solana_path_uses_mint() {
        let token = Definition::SolanaToken(SolanaToken {
            mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            symbol: "USDC".into(),
            name: "USD Coin".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        });
        let paths = OutputPath::for_definition(&token).unwrap();
        assert_eq!(
            paths[0].components,
            vec!["solana", "token", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v.dat"]
        );
    }

    #[test]
    fn malformed_token_address_fails() {
        let token = Definition::Token(Token {
            chain_id: 1,
            address: "0x12".into(),
            symbol: "BAD".into(),
            decimals: 0,
            name: "Bad".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        });
        assert!(OutputPath::for_definition(&token).is_err());
    }
}
