//! Candidate assembly: merging sources and enforcing device limits.

use std::collections::HashMap;

use chaindefs_types::limits::{truncate_utf8, MAX_STRING_LEN};
use chaindefs_types::{Definition, DefinitionKey, DefinitionSet, Record};

/// Mutations and omissions made by [`enforce_limits`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LimitReport {
    /// `(record, field)` pairs that were cut to the string limit.
    pub truncated: Vec<(DefinitionKey, &'static str)>,
    /// Records dropped because their address or mint does not decode.
    pub dropped: Vec<DefinitionKey>,
}

/// Merge candidate sets. For a repeated primary key the later source wins
/// and the record keeps the position where the key was first seen.
pub fn merge_sources(sources: impl IntoIterator<Item = DefinitionSet>) -> DefinitionSet {
    let mut merged = DefinitionSet::new();
    for source in sources {
        merge_into(&mut merged.networks, source.networks);
        merge_into(&mut merged.tokens, source.tokens);
        merge_into(&mut merged.solana_tokens, source.solana_tokens);
    }
    merged
}

fn merge_into<R: Record>(target: &mut Vec<R>, incoming: Vec<R>) {
    let mut index: HashMap<DefinitionKey, usize> = target
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();
    for record in incoming {
        match index.get(&record.key()) {
            Some(&i) => target[i] = record,
            None => {
                index.insert(record.key(), target.len());
                target.push(record);
            }
        }
    }
}

fn truncate(
    report: &mut LimitReport,
    key: &DefinitionKey,
    field: &'static str,
    value: &mut String,
) {
    if let Some(cut) = truncate_utf8(value, MAX_STRING_LEN) {
        tracing::info!(key = %key, field, from = value.len(), to = cut.len(), "truncating field");
        *value = cut;
        report.truncated.push((key.clone(), field));
    }
}

/// Re-apply rejections journaled by an interrupted session.
///
/// A restored record replaces the candidate with the same key, so the change
/// it rejected is not offered again. Entries that no longer match the
/// previous set, or whose key left the candidates, are ignored. Returns the
/// pinned keys.
pub fn pin_restored(
    set: &mut DefinitionSet,
    previous: &DefinitionSet,
    restored: impl IntoIterator<Item = Definition>,
) -> Vec<DefinitionKey> {
    let signed: HashMap<DefinitionKey, Definition> =
        previous.definitions().map(|d| (d.key(), d)).collect();
    let mut pinned = Vec::new();
    for record in restored {
        let key = record.key();
        if signed.get(&key) != Some(&record) {
            tracing::debug!(key = %key, "journaled record is stale, ignoring");
            continue;
        }
        let replaced = match record {
            Definition::Network(r) => replace_by_key(&mut set.networks, r),
            Definition::Token(r) => replace_by_key(&mut set.tokens, r),
            Definition::SolanaToken(r) => replace_by_key(&mut set.solana_tokens, r),
        };
        if replaced {
            tracing::info!(key = %key, "kept earlier rejection");
            pinned.push(key);
        }
    }
    pinned
}

fn replace_by_key<R: Record>(target: &mut [R], record: R) -> bool {
    let key = record.key();
    match target.iter_mut().find(|r| r.key() == key) {
        Some(slot) => {
            *slot = record;
            true
        }
        None => false,
    }
}

/// Cut `name` and `symbol` to the device string limit and drop records whose
/// address or mint cannot be encoded.
pub fn enforce_limits(set: &mut DefinitionSet) -> LimitReport {
    let mut report = LimitReport::default();

    for network in &mut set.networks {
        let key = network.key();
        truncate(&mut report, &key, "name", &mut network.name);
        truncate(&mut report, &key, "symbol", &mut network.symbol);
    }

    set.tokens.retain_mut(|token| {
        let key = token.key();
        if let Err(e) = token.evm_address() {
            tracing::warn!(key = %key, error = %e, "dropping token with malformed address");
            report.dropped.push(key);
            return false;
        }
        truncate(&mut report, &key, "name", &mut token.name);
        truncate(&mut report, &key, "symbol", &mut token.symbol);
        true
    });

    set.solana_tokens.retain_mut(|token| {
        let key = token.key();
        if let Err(e) = token.solana_mint() {
            tracing::warn!(key = %key, error = %e, "dropping Solana token with malformed mint");
            report.dropped.push(key);
            return false;
        }
        truncate(&mut report, &key, "name", &mut token.name);
        truncate(&mut report, &key, "symbol", &mut token.symbol);
        true
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindefs_types::{Network, SolanaToken, Token};

    fn network(chain_id: u64, name: &str) -> Network {
        Network {
            chain_id,
            symbol: "ETH".into(),
            name: name.into(),
            slip44: 60,
            is_testnet: false,
            external_id: None,
            external_rank: None,
            deleted: false,
        }
    }

    fn token(address: &str) -> Token {
        Token {
            chain_id: 1,
            address: address.into(),
            symbol: "TST".into(),
            decimals: 18,
            name: "Test".into(),
            external_id: None,
            external_rank: None,
            deleted: false,
        }
    }

    #[test]
    fn later_source_wins_in_first_position() {
        let first = DefinitionSet {
            networks: vec![network(1, "old"), network(2, "two")],
            ..Default::default()
        };
        let second = DefinitionSet {
            networks: vec![network(3, "three"), network(1, "new")],
            ..Default::default()
        };
        let merged = merge_sources([first, second]);
        let names: Vec<_> = merged.networks.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["new", "two", "three"]);
        assert!(merged.ensure_unique_keys().is_ok());
    }

    #[test]
    fn token_merge_ignores_address_case() {
        let addr = "0x00000000000000000000000000000000000000Ab";
        let first = DefinitionSet {
            tokens: vec![token(addr)],
            ..Default::default()
        };
        let mut lower = token(&addr.to_ascii_lowercase());
        lower.name = "Lower".into();
        let second = DefinitionSet {
            tokens: vec![lower],
            ..Default::default()
        };
        let merged = merge_sources([first, second]);
        assert_eq!(merged.tokens.len(), 1);
        assert_eq!(merged.tokens[0].name, "Lower");
    }

    #[test]
    fn long_names_are_truncated() {
        let mut set = DefinitionSet {
            networks: vec![network(1, &"x".repeat(300))],
            ..Default::default()
        };
        let report = enforce_limits(&mut set);
        assert_eq!(set.networks[0].name.len(), MAX_STRING_LEN);
        assert_eq!(
            report.truncated,
            vec![(DefinitionKey::Network { chain_id: 1 }, "name")]
        );
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn malformed_addresses_are_dropped() {
        let good = format!("0x{}01", "00".repeat(19));
        let mut set = DefinitionSet {
            tokens: vec![token("0x1234"), token(&good)],
            solana_tokens: vec![SolanaToken {
                mint: "not-base58!".into(),
                symbol: "BAD".into(),
                name: "Bad".into(),
                external_id: None,
                external_rank: None,
                deleted: false,
            }],
            ..Default::default()
        };
        let report = enforce_limits(&mut set);
        assert_eq!(set.tokens.len(), 1);
        assert_eq!(set.tokens[0].address, good);
        assert!(set.solana_tokens.is_empty());
        assert_eq!(report.dropped.len(), 2);
    }

    #[test]
    fn restored_record_replaces_candidate() {
        let previous = DefinitionSet {
            networks: vec![network(1, "Ethereum"), network(2, "two")],
            ..Default::default()
        };
        let mut candidates = DefinitionSet {
            networks: vec![network(1, "Renamed"), network(2, "two changed")],
            ..Default::default()
        };
        let stale = network(2, "not what was signed");

        let pinned = pin_restored(
            &mut candidates,
            &previous,
            [
                Definition::Network(network(1, "Ethereum")),
                Definition::Network(stale),
                Definition::Network(network(7, "gone")),
            ],
        );

        assert_eq!(pinned, vec![DefinitionKey::Network { chain_id: 1 }]);
        assert_eq!(candidates.networks[0].name, "Ethereum");
        assert_eq!(candidates.networks[1].name, "two changed");
        assert_eq!(candidates.networks.len(), 2);
    }
}
