use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::record::{Definition, Record, SolanaToken, Network, Token};

/// The three record lists that make up one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSet {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default, rename = "erc20_tokens", alias = "tokens")]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub solana_tokens: Vec<SolanaToken>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.networks.len() + self.tokens.len() + self.solana_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live (non-tombstoned) records.
    pub fn live_count(&self) -> usize {
        self.definitions().filter(|d| !d.is_deleted()).count()
    }

    /// All records as [`Definition`]s: networks, then tokens, then Solana tokens.
    pub fn definitions(&self) -> impl Iterator<Item = Definition> + '_ {
        self.networks
            .iter()
            .cloned()
            .map(Definition::Network)
            .chain(self.tokens.iter().cloned().map(Definition::Token))
            .chain(self.solana_tokens.iter().cloned().map(Definition::SolanaToken))
    }

    /// Fail with [`TypeError::DuplicateKey`] on the first repeated primary key.
    pub fn ensure_unique_keys(&self) -> TypeResult<()> {
        let mut seen = HashSet::with_capacity(self.len());
        for definition in self.definitions() {
            let key = definition.key();
            if !seen.insert(key.clone()) {
                return Err(TypeError::DuplicateKey(key));
            }
        }
        Ok(())
    }

    /// Canonical order: each list by primary key. Token addresses compare
    /// lowercased, as in [`Record::key`].
    pub fn sort(&mut self) {
        self.networks.sort_by_key(|n| n.chain_id);
        self.tokens.sort_by_cached_key(|t| t.key());
        self.solana_tokens.sort_by(|a, b| a.mint.cmp(&b.mint));
    }
}
