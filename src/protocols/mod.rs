//! Protocol decode-rule catalog
//!
//! One module per protocol, each pairing its address registrations with its
//! event decode rules and an embedded ABI file under `abis/`. Modules plug
//! into the engine through the registry's single function-shaped contract;
//! the dispatch core knows nothing about any individual protocol.
//!
//! Adding a protocol:
//!     1. Drop its ABI JSON into `abis/`.
//!     2. Write a module exposing `registrations()` and `register(builder)`.
//!     3. Wire it into `all_registrations()` / `register_all()` below.

use crate::registry::{RegistryBuilder, RegistryError};
use crate::resolver::ProtocolRegistration;
use alloy::json_abi::JsonAbi;

pub mod entry_point_4337;
pub mod uniswap_v2;

/// Address registrations for every catalogued protocol.
pub fn all_registrations() -> Vec<ProtocolRegistration> {
    let mut registrations = Vec::new();
    registrations.extend(uniswap_v2::registrations());
    registrations.extend(entry_point_4337::registrations());
    registrations
}

/// Register every catalogued decode rule. Duplicate keys abort startup.
pub fn register_all(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    uniswap_v2::register(builder)?;
    entry_point_4337::register(builder)?;
    Ok(())
}

/// Parse an embedded ABI file. A malformed embedded ABI is a packaging
/// defect surfaced at startup, not a per-log failure.
pub(crate) fn parse_abi(protocol: &str, raw: &str) -> Result<JsonAbi, RegistryError> {
    serde_json::from_str(raw).map_err(|e| RegistryError::InvalidAbi {
        protocol: protocol.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registers_cleanly() {
        let mut builder = RegistryBuilder::new();
        register_all(&mut builder).unwrap();
        let registry = builder.build();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_catalog_registrations_unambiguous() {
        use crate::resolver::{AddressResolver, FactoryChildIndex};
        use std::sync::Arc;

        let resolver = AddressResolver::from_registrations(
            &all_registrations(),
            Arc::new(FactoryChildIndex::new()),
        )
        .unwrap();
        assert_eq!(resolver.registered_count(), 3);
    }
}
