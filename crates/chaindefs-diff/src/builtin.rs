//! Comparison of firmware built-in definitions against the current set.

use std::collections::{HashMap, HashSet};

use chaindefs_crypto::ContentHasher;
use chaindefs_types::{Definition, DefinitionKey, DefinitionSet, Network, Record, Token};

use crate::error::DiffResult;

/// Drift between the built-in definitions and the current set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuiltinReport {
    /// Built-in definitions whose content no longer appears in the current
    /// set, with the current record under the same key if there is one.
    pub outdated: Vec<(Definition, Option<Definition>)>,
    /// Top-ranked networks with no matching built-in.
    pub missing_networks: Vec<Network>,
    /// Top-ranked tokens on top-ranked networks with no matching built-in.
    pub missing_tokens: Vec<Token>,
}

impl BuiltinReport {
    pub fn is_ok(&self) -> bool {
        self.outdated.is_empty() && self.missing_networks.is_empty() && self.missing_tokens.is_empty()
    }
}

/// Compare EVM networks and tokens. Content is compared ignoring the
/// tombstone flag, the external id and the rank; `top` is the inclusive rank
/// cutoff for definitions that should be built in.
pub fn check_builtin(
    builtin: &DefinitionSet,
    current: &DefinitionSet,
    top: u32,
) -> DiffResult<BuiltinReport> {
    let hasher = ContentHasher::BUILTIN;
    let evm = |set: &DefinitionSet| -> Vec<Definition> {
        set.networks
            .iter()
            .cloned()
            .map(Definition::Network)
            .chain(set.tokens.iter().cloned().map(Definition::Token))
            .collect()
    };

    let builtin_defs = evm(builtin);
    let current_defs = evm(current);
    let mut builtin_hashes = HashSet::with_capacity(builtin_defs.len());
    for def in &builtin_defs {
        builtin_hashes.insert(hasher.builtin_digest(def)?);
    }
    let mut current_hashes = HashSet::with_capacity(current_defs.len());
    for def in &current_defs {
        current_hashes.insert(hasher.builtin_digest(def)?);
    }
    let by_key: HashMap<DefinitionKey, &Definition> =
        current_defs.iter().map(|d| (d.key(), d)).collect();

    let mut report = BuiltinReport::default();
    for def in builtin_defs {
        if !current_hashes.contains(&hasher.builtin_digest(&def)?) {
            tracing::warn!(key = %def.key(), "built-in definition outdated");
            let current = by_key.get(&def.key()).map(|d| (*d).clone());
            report.outdated.push((def, current));
        }
    }

    let in_top = |rank: Option<u32>| rank.is_some_and(|r| r <= top);
    let top_chains: HashSet<u64> = current
        .networks
        .iter()
        .filter(|n| in_top(n.external_rank))
        .map(|n| n.chain_id)
        .collect();

    for network in current.networks.iter().filter(|n| in_top(n.external_rank)) {
        if !builtin_hashes.contains(&hasher.builtin_digest(network)?) {
            tracing::warn!(chain_id = network.chain_id, "top network missing from built-ins");
            report.missing_networks.push(network.clone());
        }
    }
    for token in current
        .tokens
        .iter()
        .filter(|t| in_top(t.external_rank) && top_chains.contains(&t.chain_id))
    {
        if !builtin_hashes.contains(&hasher.builtin_digest(token)?) {
            tracing::warn!(key = %token.key(), "top token missing from built-ins");
            report.missing_tokens.push(token.clone());
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(rank: Option<u32>) -> Network {
        Network {
            chain_id: 1,
            symbol: "ETH".into(),
            name: "Ethereum".into(),
            slip44: 60,
            is_testnet: false,
            external_id: Some("ethereum".into()),
            external_rank: rank,
            deleted: false,
        }
    }

    fn usdt(chain_id: u64, rank: Option<u32>) -> Token {
        Token {
            chain_id,
            address: "0xdac17f958d2ee523a2206206994597c13d831ec7".into(),
            symbol: "USDT".into(),
            decimals: 6,
            name: "Tether".into(),
            external_id: Some("tether".into()),
            external_rank: rank,
            deleted: false,
        }
    }

    #[test]
    fn matching_builtins_pass() {
        let builtin = DefinitionSet {
            networks: vec![Network {
                external_id: None,
                ..eth(None)
            }],
            tokens: vec![usdt(1, None)],
            ..Default::default()
        };
        let current = DefinitionSet {
            networks: vec![eth(Some(1))],
            tokens: vec![usdt(1, Some(3))],
            ..Default::default()
        };
        assert!(check_builtin(&builtin, &current, 50).unwrap().is_ok());
    }

    #[test]
    fn outdated_builtin_is_reported_with_current() {
        let mut stale = eth(None);
        stale.name = "Ethereum Classic".into();
        let builtin = DefinitionSet {
            networks: vec![stale.clone()],
            ..Default::default()
        };
        let current = DefinitionSet {
            networks: vec![eth(None)],
            ..Default::default()
        };
        let report = check_builtin(&builtin, &current, 50).unwrap();
        assert_eq!(
            report.outdated,
            vec![(
                Definition::Network(stale),
                Some(Definition::Network(eth(None)))
            )]
        );
    }

    #[test]
    fn missing_top_definitions_are_reported() {
        let current = DefinitionSet {
            networks: vec![eth(Some(2))],
            tokens: vec![usdt(1, Some(3)), usdt(56, Some(3))],
            ..Default::default()
        };
        let report = check_builtin(&DefinitionSet::new(), &current, 50).unwrap();
        assert_eq!(report.missing_networks, vec![eth(Some(2))]);
        // Chain 56 is not a top network.
        assert_eq!(report.missing_tokens, vec![usdt(1, Some(3))]);
    }

    #[test]
    fn rank_cutoff_is_inclusive() {
        let current = DefinitionSet {
            networks: vec![eth(Some(51))],
            ..Default::default()
        };
        assert!(check_builtin(&DefinitionSet::new(), &current, 50).unwrap().is_ok());
        assert!(!check_builtin(&DefinitionSet::new(), &current, 51).unwrap().is_ok());
    }
}
