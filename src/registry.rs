//! Rule Registry
//!
//! Purpose:
//!     Stores decode rules keyed by (protocol, event signature hash, chain
//!     scope). Registration happens once at startup through a builder and
//!     fails fast on duplicate keys; `build()` freezes the registry into a
//!     read-only lookup table for the dispatch phase. The signature hash
//!     (topic0) is derived from the ABI once at registration, never
//!     recomputed per lookup.
//!
//! Dependencies:
//!     - alloy (json-abi event definitions, keccak selectors)
//!     - thiserror (startup error taxonomy)

use crate::abi::{DecodeError, DecodedArgs, EventAbiDecoder};
use crate::normalize::EventPayload;
use crate::types::RawLog;
use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::B256;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Startup-time configuration conflict. Fatal: process initialization must
/// abort rather than silently pick a winner.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate rule: {protocol}:{event} already registered for an overlapping chain scope")]
    DuplicateRule { protocol: String, event: String },

    #[error("ambiguous address registration: {address} on {chain} maps to both `{existing}` and `{conflicting}`")]
    AmbiguousAddress {
        address: String,
        chain: String,
        existing: String,
        conflicting: String,
    },

    #[error("event `{event}` not found in the supplied ABI for {protocol}")]
    UnknownAbiEvent { protocol: String, event: String },

    #[error("failed to parse ABI for {protocol}: {reason}")]
    InvalidAbi { protocol: String, reason: String },
}

/// Chains a rule applies to: the `"*"` wildcard or an explicit allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainScope {
    Any,
    Only(Vec<String>),
}

impl ChainScope {
    /// Build from a registration list; a `"*"` entry anywhere means all chains.
    pub fn from_list(chains: &[&str]) -> Self {
        if chains.iter().any(|c| *c == "*") {
            ChainScope::Any
        } else {
            ChainScope::Only(chains.iter().map(|c| (*c).to_string()).collect())
        }
    }

    pub fn allows(&self, chain: &str) -> bool {
        match self {
            ChainScope::Any => true,
            ChainScope::Only(chains) => chains.iter().any(|c| c == chain),
        }
    }

    fn overlaps(&self, other: &ChainScope) -> bool {
        match (self, other) {
            (ChainScope::Any, _) | (_, ChainScope::Any) => true,
            (ChainScope::Only(a), ChainScope::Only(b)) => {
                a.iter().any(|chain| b.contains(chain))
            }
        }
    }
}

/// Borrowed decode capability handed to a rule at invocation time: the
/// rule's own ABI event plus the external ABI-decode primitive.
pub struct DecodeCapability<'a> {
    event: &'a Event,
    decoder: &'a dyn EventAbiDecoder,
}

impl DecodeCapability<'_> {
    /// Decode the log's topics and data against the rule's ABI event.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedArgs, DecodeError> {
        self.decoder
            .decode_event(self.event, &log.raw_log_topics, &log.raw_log_data)
    }
}

/// Uniform shape of every rule's transformation logic:
/// (raw log, chain name, decode capability) -> payload or failure.
pub type DecodeFn = Arc<
    dyn Fn(&RawLog, &str, DecodeCapability<'_>) -> Result<EventPayload, DecodeError>
        + Send
        + Sync,
>;

/// One registered decode rule: (protocol, event, chain scope) bound to an
/// ABI event and a decode function. Registered once, invoked many times,
/// never mutated.
pub struct DecodeRule {
    pub protocol: String,
    pub event_name: String,
    pub chains: ChainScope,
    pub abi_event: Event,
    pub topic0: B256,
    decode: DecodeFn,
}

impl DecodeRule {
    pub(crate) fn invoke(
        &self,
        log: &RawLog,
        chain: &str,
        decoder: &dyn EventAbiDecoder,
    ) -> Result<EventPayload, DecodeError> {
        let capability = DecodeCapability {
            event: &self.abi_event,
            decoder,
        };
        (self.decode)(log, chain, capability)
    }
}

impl std::fmt::Debug for DecodeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DecodeRule")
            .field("protocol", &self.protocol)
            .field("event_name", &self.event_name)
            .field("chains", &self.chains)
            .field("topic0", &self.topic0)
            .finish()
    }
}

/// Registration-phase accumulator. Consumed by `build()` so no rule can be
/// added once dispatch traffic starts.
#[derive(Default)]
pub struct RegistryBuilder {
    // protocol -> topic0 -> rules (disjoint chain scopes)
    rules: HashMap<String, HashMap<B256, Vec<DecodeRule>>>,
    // (protocol, event name) -> chain scopes already claimed
    claimed: HashMap<(String, String), Vec<ChainScope>>,
    len: usize,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decode rule for `event_name` of `protocol` on `chains`
    /// (`"*"` for all). The event is resolved in the supplied ABI and its
    /// signature hash computed here, once. Fails if the (protocol, event)
    /// key is already registered for any chain in `chains`.
    pub fn register<F>(
        &mut self,
        protocol: &str,
        event_name: &str,
        chains: &[&str],
        abi: &JsonAbi,
        decode: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&RawLog, &str, DecodeCapability<'_>) -> Result<EventPayload, DecodeError>
            + Send
            + Sync
            + 'static,
    {
        let event = abi
            .events
            .get(event_name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| RegistryError::UnknownAbiEvent {
                protocol: protocol.to_string(),
                event: event_name.to_string(),
            })?;

        let scope = ChainScope::from_list(chains);
        let key = (protocol.to_string(), event_name.to_string());
        if let Some(existing) = self.claimed.get(&key) {
            if existing.iter().any(|s| s.overlaps(&scope)) {
                return Err(RegistryError::DuplicateRule {
                    protocol: protocol.to_string(),
                    event: event_name.to_string(),
                });
            }
        }

        let topic0 = event.selector();
        let rule = DecodeRule {
            protocol: protocol.to_string(),
            event_name: event_name.to_string(),
            chains: scope.clone(),
            abi_event: event.clone(),
            topic0,
            decode: Arc::new(decode),
        };

        self.rules
            .entry(protocol.to_string())
            .or_default()
            .entry(topic0)
            .or_default()
            .push(rule);
        self.claimed.entry(key).or_default().push(scope);
        self.len += 1;
        Ok(())
    }

    /// Freeze the registry. Registration is over; only lookups remain.
    pub fn build(self) -> RuleRegistry {
        info!("Rule registry frozen: {} rules registered", self.len);
        RuleRegistry {
            rules: self.rules,
            len: self.len,
        }
    }
}

/// Immutable rule lookup table. Reads require no locking; the registry is
/// shared by reference across dispatch workers.
pub struct RuleRegistry {
    rules: HashMap<String, HashMap<B256, Vec<DecodeRule>>>,
    len: usize,
}

impl RuleRegistry {
    /// Exact lookup by (protocol, topic0, chain). A rule whose chain
    /// allow-list excludes `chain` does not match even when the signature
    /// hash does; a rule authored against one chain's ABI must not misfire
    /// against a same-signature contract elsewhere.
    pub fn lookup(&self, protocol: &str, topic0: B256, chain: &str) -> Option<&DecodeRule> {
        self.rules
            .get(protocol)?
            .get(&topic0)?
            .iter()
            .find(|rule| rule.chains.allows(chain))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
