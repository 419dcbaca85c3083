//! Address Resolver
//!
//! Maps a (chain, contract address) pair to a protocol identifier.
//! Registrations come from static configuration before any dispatch
//! traffic starts; lookups are read-only thereafter. Two styles:
//!
//!   - exact address -> protocol
//!   - is_factory entries: the address is a factory whose spawned children
//!     also belong to the protocol. Child -> factory bindings are recorded
//!     by the crawler in a `FactoryChildIndex`; the resolver only performs
//!     direct lookups, never on-chain calls.
//!
//! Addresses are lowercased before lookup (mixed-case checksums are common
//! on the wire). An unresolvable address is the normal case for an indexer
//! watching an open log stream and returns None without noise.

use crate::registry::RegistryError;
use alloy::primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Declares that an address (or factory address family) belongs to a named
/// protocol on a named chain. Loaded once at startup, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRegistration {
    pub address: String,
    #[serde(default)]
    pub is_factory: bool,
    pub protocol_name: String,
    pub chain_name: String,
}

/// Pre-resolved child -> factory bindings, keyed by (chain, child address).
/// The crawler that tracks factory creation events writes here while
/// dispatch reads; the resolver itself never discovers children.
#[derive(Debug, Default)]
pub struct FactoryChildIndex {
    inner: DashMap<(String, String), String>,
}

impl FactoryChildIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` was spawned by `factory` on `chain`.
    pub fn bind(&self, chain: &str, child: Address, factory: Address) {
        self.inner.insert(
            (chain.to_string(), normalize_address(child)),
            normalize_address(factory),
        );
    }

    /// The factory a child address is bound to, if any (lowercase hex).
    pub fn factory_of(&self, chain: &str, child: &str) -> Option<String> {
        self.inner
            .get(&(chain.to_string(), child.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Fast-lookup resolver built once from the registration list.
/// All address keys are lowercase hex with 0x prefix.
pub struct AddressResolver {
    /// chain -> lowercase address -> protocol name
    direct: HashMap<String, HashMap<String, String>>,
    /// chain -> lowercase addresses registered with is_factory
    factories: HashMap<String, HashSet<String>>,
    /// Child -> factory bindings recorded by the crawler
    children: Arc<FactoryChildIndex>,
}

impl AddressResolver {
    /// Build from parsed registrations. Fails with `AmbiguousAddress` if an
    /// address maps to two different protocols on the same chain; this is a
    /// configuration error, not a runtime decision.
    pub fn from_registrations(
        registrations: &[ProtocolRegistration],
        children: Arc<FactoryChildIndex>,
    ) -> Result<Self, RegistryError> {
        let mut direct: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut factories: HashMap<String, HashSet<String>> = HashMap::new();

        for reg in registrations {
            let addr = normalize_address_str(&reg.address);
            let by_addr = direct.entry(reg.chain_name.clone()).or_default();

            if let Some(existing) = by_addr.get(&addr) {
                if existing != &reg.protocol_name {
                    return Err(RegistryError::AmbiguousAddress {
                        address: addr,
                        chain: reg.chain_name.clone(),
                        existing: existing.clone(),
                        conflicting: reg.protocol_name.clone(),
                    });
                }
                debug!(
                    "Resolver: duplicate registration for {} on {} ({}), ignoring",
                    addr, reg.chain_name, reg.protocol_name
                );
                continue;
            }

            by_addr.insert(addr.clone(), reg.protocol_name.clone());
            if reg.is_factory {
                factories
                    .entry(reg.chain_name.clone())
                    .or_default()
                    .insert(addr);
            }
        }

        let total: usize = direct.values().map(HashMap::len).sum();
        info!(
            "Resolver loaded: {} addresses across {} chains ({} factories)",
            total,
            direct.len(),
            factories.values().map(HashSet::len).sum::<usize>(),
        );

        Ok(Self {
            direct,
            factories,
            children,
        })
    }

    /// Resolve an observed contract address to its protocol, if tracked.
    /// Direct registrations win; otherwise the child index is consulted and
    /// the bound factory must itself be registered with is_factory.
    pub fn resolve(&self, chain: &str, address: Address) -> Option<&str> {
        let addr = normalize_address(address);

        if let Some(by_addr) = self.direct.get(chain) {
            if let Some(protocol) = by_addr.get(&addr) {
                return Some(protocol.as_str());
            }
        }

        let factory = self.children.factory_of(chain, &addr)?;
        if !self
            .factories
            .get(chain)
            .is_some_and(|set| set.contains(&factory))
        {
            debug!(
                "Resolver: child {} bound to unregistered factory {} on {}",
                addr, factory, chain
            );
            return None;
        }
        self.direct.get(chain)?.get(&factory).map(String::as_str)
    }

    /// Number of directly registered addresses
    pub fn registered_count(&self) -> usize {
        self.direct.values().map(HashMap::len).sum()
    }
}

/// Normalize an address to lowercase hex with 0x prefix.
pub(crate) fn normalize_address(address: Address) -> String {
    format!("{address:?}").to_lowercase()
}

/// Normalize an address string to lowercase with 0x prefix.
pub(crate) fn normalize_address_str(s: &str) -> String {
    let s = s.trim().to_lowercase();
    if s.starts_with("0x") {
        s
    } else {
        format!("0x{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn registrations() -> Vec<ProtocolRegistration> {
        vec![
            ProtocolRegistration {
                address: "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f".to_string(),
                is_factory: true,
                protocol_name: "uniswap-v2".to_string(),
                chain_name: "eth-mainnet".to_string(),
            },
            ProtocolRegistration {
                address: "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789".to_string(),
                is_factory: false,
                protocol_name: "4337-entry-point".to_string(),
                chain_name: "matic-mainnet".to_string(),
            },
        ]
    }

    fn resolver_with(children: Arc<FactoryChildIndex>) -> AddressResolver {
        AddressResolver::from_registrations(&registrations(), children).unwrap()
    }

    #[test]
    fn test_direct_resolution_case_insensitive() {
        let resolver = resolver_with(Arc::new(FactoryChildIndex::new()));
        // Mixed-case checksummed form in config, lookup by Address value
        let addr = address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f");
        assert_eq!(resolver.resolve("eth-mainnet", addr), Some("uniswap-v2"));
    }

    #[test]
    fn test_unknown_address_is_none() {
        let resolver = resolver_with(Arc::new(FactoryChildIndex::new()));
        let addr = address!("0000000000000000000000000000000000000099");
        assert_eq!(resolver.resolve("eth-mainnet", addr), None);
    }

    #[test]
    fn test_chain_scoped_resolution() {
        let resolver = resolver_with(Arc::new(FactoryChildIndex::new()));
        // Registered on eth-mainnet only
        let addr = address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f");
        assert_eq!(resolver.resolve("matic-mainnet", addr), None);
    }

    #[test]
    fn test_factory_child_resolution() {
        let children = Arc::new(FactoryChildIndex::new());
        let factory = address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f");
        let child = address!("b4e16d0168e52d35cacd2c6185b44281ec28c9dc");
        children.bind("eth-mainnet", child, factory);

        let resolver = resolver_with(children);
        assert_eq!(resolver.resolve("eth-mainnet", child), Some("uniswap-v2"));
        // Same child address on another chain has no binding
        assert_eq!(resolver.resolve("matic-mainnet", child), None);
    }

    #[test]
    fn test_child_of_non_factory_not_resolved() {
        let children = Arc::new(FactoryChildIndex::new());
        // 4337 entry point is registered without is_factory
        let non_factory = address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");
        let child = address!("b4e16d0168e52d35cacd2c6185b44281ec28c9dc");
        children.bind("matic-mainnet", child, non_factory);

        let resolver = resolver_with(children);
        assert_eq!(resolver.resolve("matic-mainnet", child), None);
    }

    #[test]
    fn test_ambiguous_registration_rejected() {
        let mut regs = registrations();
        regs.push(ProtocolRegistration {
            address: "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f".to_string(),
            is_factory: false,
            protocol_name: "sushiswap".to_string(),
            chain_name: "eth-mainnet".to_string(),
        });
        let result =
            AddressResolver::from_registrations(&regs, Arc::new(FactoryChildIndex::new()));
        assert!(matches!(
            result,
            Err(RegistryError::AmbiguousAddress { .. })
        ));
    }

    #[test]
    fn test_identical_duplicate_registration_tolerated() {
        let mut regs = registrations();
        regs.push(regs[0].clone());
        let resolver =
            AddressResolver::from_registrations(&regs, Arc::new(FactoryChildIndex::new()))
                .unwrap();
        assert_eq!(resolver.registered_count(), 2);
    }

    #[test]
    fn test_normalize_address_str() {
        assert_eq!(
            normalize_address_str(" 0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
            "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"
        );
        assert_eq!(
            normalize_address_str("AB5801a7D398351b8bE11C439e05C5B3259aeC9B"),
            "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
        );
    }
}
