// Core data structures for the decode pipeline.
// RawLog is the immutable input shape supplied by the chain-data crawler;
// DecodedEvent is the normalized output every rule must produce.

use alloy::primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw event log as observed on chain, plus enrichment metadata populated
/// by the upstream crawler (contract name, logo, token decimals).
/// Constructed once per observed log, consumed once by dispatch, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    /// Chain the log was observed on (e.g., "eth-mainnet", "matic-mainnet")
    pub chain_name: String,
    /// Address of the emitting contract
    pub sender_address: Address,
    /// Ordered topic hashes; topic0 is the event signature hash
    pub raw_log_topics: Vec<B256>,
    /// ABI-encoded event data payload
    pub raw_log_data: Bytes,
    /// Block timestamp (populated by the crawler when available)
    #[serde(default)]
    pub block_signed_at: Option<DateTime<Utc>>,
    /// Transaction the log was emitted in
    #[serde(default)]
    pub tx_hash: Option<B256>,
    /// Enrichment: display name of the emitting contract
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Enrichment: logo URL of the emitting contract
    #[serde(default)]
    pub sender_logo_url: Option<String>,
    /// Enrichment: token decimals of the emitting contract (scaling exponent)
    #[serde(default)]
    pub sender_contract_decimals: Option<u8>,
}

impl RawLog {
    /// The event signature hash, if the log carries any topics at all.
    /// Anonymous events (no topic0) are not decodable by the registry.
    pub fn topic0(&self) -> Option<B256> {
        self.raw_log_topics.first().copied()
    }
}

/// Action categories for decoded events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecodedAction {
    Swapped,
    Transferred,
    Approval,
    Minted,
    Burned,
    Deposited,
    Withdrew,
    ReceivedBridge,
    MultisigAction,
    AccountAbstraction,
}

impl fmt::Display for DecodedAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodedAction::Swapped => write!(f, "Swapped"),
            DecodedAction::Transferred => write!(f, "Transferred"),
            DecodedAction::Approval => write!(f, "Approval"),
            DecodedAction::Minted => write!(f, "Minted"),
            DecodedAction::Burned => write!(f, "Burned"),
            DecodedAction::Deposited => write!(f, "Deposited"),
            DecodedAction::Withdrew => write!(f, "Withdrew"),
            DecodedAction::ReceivedBridge => write!(f, "Received Bridge"),
            DecodedAction::MultisigAction => write!(f, "Multisig Action"),
            DecodedAction::AccountAbstraction => write!(f, "Account Abstraction"),
        }
    }
}

/// Broader category grouping for decoded events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Dex,
    Nft,
    Lending,
    Safe,
    Bridge,
    Governance,
    Token,
    Others,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventCategory::Dex => write!(f, "DEX"),
            EventCategory::Nft => write!(f, "NFT"),
            EventCategory::Lending => write!(f, "Lending"),
            EventCategory::Safe => write!(f, "SAFE"),
            EventCategory::Bridge => write!(f, "Bridge"),
            EventCategory::Governance => write!(f, "Governance"),
            EventCategory::Token => write!(f, "Token"),
            EventCategory::Others => write!(f, "Others"),
        }
    }
}

/// Protocol display info attached to every decoded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub name: String,
    pub logo_url: String,
}

impl ProtocolInfo {
    /// Build from the log's enrichment fields. Absent enrichment renders
    /// as empty strings rather than partial records.
    pub fn from_log(log: &RawLog) -> Self {
        Self {
            name: log.sender_name.clone().unwrap_or_default(),
            logo_url: log.sender_logo_url.clone().unwrap_or_default(),
        }
    }
}

/// One (title, value) display pair in a decoded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    pub title: String,
    pub value: String,
}

/// Normalized decoded event: the single output schema every rule produces.
/// Every field is present; numeric detail values are decimal strings scaled
/// by the correct token decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub action: DecodedAction,
    pub category: EventCategory,
    pub name: String,
    pub protocol: ProtocolInfo,
    pub details: Vec<EventDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_raw_log_from_json() {
        let json = r#"{
            "chain_name": "eth-mainnet",
            "sender_address": "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f",
            "raw_log_topics": [
                "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"
            ],
            "raw_log_data": "0x",
            "sender_name": "Uniswap V2",
            "sender_contract_decimals": 18
        }"#;
        let log: RawLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.chain_name, "eth-mainnet");
        assert_eq!(
            log.sender_address,
            address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f")
        );
        assert_eq!(log.sender_contract_decimals, Some(18));
        assert!(log.topic0().is_some());
        assert!(log.block_signed_at.is_none());
    }

    #[test]
    fn test_topic0_empty_topics() {
        let json = r#"{
            "chain_name": "eth-mainnet",
            "sender_address": "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f",
            "raw_log_topics": [],
            "raw_log_data": "0x"
        }"#;
        let log: RawLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.topic0(), None);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(DecodedAction::Swapped.to_string(), "Swapped");
        assert_eq!(
            DecodedAction::AccountAbstraction.to_string(),
            "Account Abstraction"
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(EventCategory::Dex.to_string(), "DEX");
        assert_eq!(EventCategory::Others.to_string(), "Others");
    }

    #[test]
    fn test_protocol_info_defaults_empty() {
        let json = r#"{
            "chain_name": "eth-mainnet",
            "sender_address": "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f",
            "raw_log_topics": [],
            "raw_log_data": "0x"
        }"#;
        let log: RawLog = serde_json::from_str(json).unwrap();
        let info = ProtocolInfo::from_log(&log);
        assert_eq!(info.name, "");
        assert_eq!(info.logo_url, "");
    }
}
