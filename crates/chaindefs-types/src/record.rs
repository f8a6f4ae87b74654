//! Canonical record model.
//!
//! Three record kinds exist: EVM [`Network`]s, EVM [`Token`]s and
//! [`SolanaToken`]s. Each carries only its own fields plus the two
//! bookkeeping fields every kind shares: the volatile `external_rank` (never
//! part of change detection) and the `deleted` tombstone flag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{EvmAddress, SolanaMint};
use crate::error::TypeError;

fn is_false(value: &bool) -> bool {
    !*value
}

/// An EVM network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub chain_id: u64,
    #[serde(alias = "shortcut")]
    pub symbol: String,
    pub name: String,
    pub slip44: u32,
    #[serde(default)]
    pub is_testnet: bool,
    /// Identifier assigned by the external ranking service.
    #[serde(default, alias = "coingecko_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, alias = "coingecko_rank", skip_serializing_if = "Option::is_none")]
    pub external_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

/// An EVM token contract on a specific chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    /// `0x`-prefixed hex address.
    pub address: String,
    #[serde(alias = "shortcut")]
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
    #[serde(default, alias = "coingecko_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, alias = "coingecko_rank", skip_serializing_if = "Option::is_none")]
    pub external_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

/// A Solana SPL token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaToken {
    /// Base-58 mint public key.
    pub mint: String,
    #[serde(alias = "shortcut")]
    pub symbol: String,
    pub name: String,
    #[serde(default, alias = "coingecko_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, alias = "coingecko_rank", skip_serializing_if = "Option::is_none")]
    pub external_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

/// Record kind, also the wire discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefinitionKind {
    Network,
    Token,
    SolanaToken,
}

impl DefinitionKind {
    /// Discriminant byte in the serialized payload header.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Network => 0,
            Self::Token => 1,
            Self::SolanaToken => 2,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Network),
            1 => Some(Self::Token),
            2 => Some(Self::SolanaToken),
            _ => None,
        }
    }

    /// Upper-case label for change reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Token => "TOKEN",
            Self::SolanaToken => "SOLANA TOKEN",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Primary key of a record. Unique within a record set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefinitionKey {
    Network { chain_id: u64 },
    Token { chain_id: u64, address: String },
    SolanaToken { mint: String },
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { chain_id } => write!(f, "network {chain_id}"),
            Self::Token { chain_id, address } => write!(f, "token {chain_id}:{address}"),
            Self::SolanaToken { mint } => write!(f, "solana token {mint}"),
        }
    }
}

/// A single differing field between two versions of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
    /// Protected fields (symbol, decimals) need explicit approval to change.
    pub protected: bool,
}

impl FieldChange {
    fn compare<T: PartialEq + fmt::Debug>(
        out: &mut Vec<FieldChange>,
        field: &'static str,
        old: &T,
        new: &T,
        protected: bool,
    ) {
        if old != new {
            out.push(FieldChange {
                field,
                old: format!("{old:?}"),
                new: format!("{new:?}"),
                protected,
            });
        }
    }
}

/// Behaviour shared by every record kind.
pub trait Record: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync {
    fn kind(&self) -> DefinitionKind;
    fn key(&self) -> DefinitionKey;
    fn name(&self) -> &str;
    fn symbol(&self) -> &str;
    fn external_id(&self) -> Option<&str>;
    fn external_rank(&self) -> Option<u32>;
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);

    /// Copy with the tombstone flag and the volatile rank cleared.
    ///
    /// Two records with equal content views are the same definition.
    fn content_view(&self) -> Self;

    /// Like [`Record::content_view`], additionally dropping the external id.
    fn builtin_view(&self) -> Self;

    /// Field-by-field comparison, excluding the tombstone flag and rank.
    fn field_changes(&self, newer: &Self) -> Vec<FieldChange>;

    fn into_definition(self) -> Definition;
}

impl Record for Network {
    fn kind(&self) -> DefinitionKind {
        DefinitionKind::Network
    }

    fn key(&self) -> DefinitionKey {
        DefinitionKey::Network {
            chain_id: self.chain_id,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    fn external_rank(&self) -> Option<u32> {
        self.external_rank
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn content_view(&self) -> Self {
        Self {
            external_rank: None,
            deleted: false,
            ..self.clone()
        }
    }

    fn builtin_view(&self) -> Self {
        Self {
            external_id: None,
            ..self.content_view()
        }
    }

    fn field_changes(&self, newer: &Self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        FieldChange::compare(&mut out, "name", &self.name, &newer.name, false);
        FieldChange::compare(&mut out, "symbol", &self.symbol, &newer.symbol, true);
        FieldChange::compare(&mut out, "slip44", &self.slip44, &newer.slip44, false);
        FieldChange::compare(&mut out, "is_testnet", &self.is_testnet, &newer.is_testnet, false);
        FieldChange::compare(&mut out, "external_id", &self.external_id, &newer.external_id, false);
        out
    }

    fn into_definition(self) -> Definition {
        Definition::Network(self)
    }
}

impl Token {
    /// Decode the textual address into its 20 raw bytes.
    pub fn evm_address(&self) -> Result<EvmAddress, TypeError> {
        EvmAddress::parse(&self.address)
    }
}

impl Record for Token {
    fn kind(&self) -> DefinitionKind {
        DefinitionKind::Token
    }

    fn key(&self) -> DefinitionKey {
        DefinitionKey::Token {
            chain_id: self.chain_id,
            address: self.address.to_ascii_lowercase(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    fn external_rank(&self) -> Option<u32> {
        self.external_rank
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn content_view(&self) -> Self {
        Self {
            external_rank: None,
            deleted: false,
            ..self.clone()
        }
    }

    fn builtin_view(&self) -> Self {
        Self {
            external_id: None,
            ..self.content_view()
        }
    }

    fn field_changes(&self, newer: &Self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        FieldChange::compare(&mut out, "name", &self.name, &newer.name, false);
        FieldChange::compare(&mut out, "symbol", &self.symbol, &newer.symbol, true);
        FieldChange::compare(&mut out, "decimals", &self.decimals, &newer.decimals, true);
        FieldChange::compare(&mut out, "external_id", &self.external_id, &newer.external_id, false);
        out
    }

    fn into_definition(self) -> Definition {
        Definition::Token(self)
    }
}

impl SolanaToken {
    /// Decode the base-58 mint into its 32 raw bytes.
    pub fn solana_mint(&self) -> Result<SolanaMint, TypeError> {
        SolanaMint::parse(&self.mint)
    }
}

impl Record for SolanaToken {
    fn kind(&self) -> DefinitionKind {
        DefinitionKind::SolanaToken
    }

    fn key(&self) -> DefinitionKey {
        DefinitionKey::SolanaToken {
            mint: self.mint.clone(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    fn external_rank(&self) -> Option<u32> {
        self.external_rank
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn content_view(&self) -> Self {
        Self {
            external_rank: None,
            deleted: false,
            ..self.clone()
        }
    }

    fn builtin_view(&self) -> Self {
        Self {
            external_id: None,
            ..self.content_view()
        }
    }

    fn field_changes(&self, newer: &Self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        FieldChange::compare(&mut out, "name", &self.name, &newer.name, false);
        FieldChange::compare(&mut out, "symbol", &self.symbol, &newer.symbol, true);
        FieldChange::compare(&mut out, "external_id", &self.external_id, &newer.external_id, false);
        out
    }

    fn into_definition(self) -> Definition {
        Definition::SolanaToken(self)
    }
}

/// Any definition record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Definition {
    Network(Network),
    Token(Token),
    SolanaToken(SolanaToken),
}

macro_rules! each_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Definition::Network($inner) => $body,
            Definition::Token($inner) => $body,
            Definition::SolanaToken($inner) => $body,
        }
    };
}

impl Record for Definition {
    fn kind(&self) -> DefinitionKind {
        each_variant!(self, r => r.kind())
    }

    fn key(&self) -> DefinitionKey {
        each_variant!(self, r => r.key())
    }

    fn name(&self) -> &str {
        each_variant!(self, r => r.name())
    }

    fn symbol(&self) -> &str {
        each_variant!(self, r => r.symbol())
    }

    fn external_id(&self) -> Option<&str> {
        each_variant!(self, r => r.external_id())
    }

    fn external_rank(&self) -> Option<u32> {
        each_variant!(self, r => r.external_rank())
    }

    fn is_deleted(&self) -> bool {
        each_variant!(self, r => r.is_deleted())
    }

    fn set_deleted(&mut self, deleted: bool) {
        each_variant!(self, r => r.set_deleted(deleted))
    }

    fn content_view(&self) -> Self {
        each_variant!(self, r => r.content_view().into_definition())
    }

    fn builtin_view(&self) -> Self {
        each_variant!(self, r => r.builtin_view().into_definition())
    }

    fn field_changes(&self, newer: &Self) -> Vec<FieldChange> {
        match (self, newer) {
            (Self::Network(a), Self::Network(b)) => a.field_changes(b),
            (Self::Token(a), Self::Token(b)) => a.field_changes(b),
            (Self::SolanaToken(a), Self::SolanaToken(b)) => a.field_changes(b),
            _ => vec![FieldChange {
                field: "kind",
                old: self.kind().to_string(),
                new: newer.kind().to_string(),
                protected: true,
            }],
        }
    }

    fn into_definition(self) -> Definition {
        self
    }
}
