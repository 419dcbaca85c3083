//! Registration configuration
//!
//! Loads the static protocol registration list (and optional pre-enumerated
//! factory child bindings) from JSON files. Loading happens once before the
//! engine is built; a malformed file is a startup error, never a runtime
//! decision.

use crate::resolver::ProtocolRegistration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A pre-resolved child -> factory binding, as enumerated offline or by the
/// factory-event crawler. Feeds `FactoryChildIndex` before replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildBinding {
    pub chain_name: String,
    pub child: String,
    pub factory: String,
}

/// Load protocol registrations from a JSON file.
pub fn load_registrations<P: AsRef<Path>>(path: P) -> Result<Vec<ProtocolRegistration>> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read registrations file: {}", path.as_ref().display()))?;
    let registrations: Vec<ProtocolRegistration> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registrations JSON: {}", path.as_ref().display()))?;
    Ok(registrations)
}

/// Load factory child bindings from a JSON file.
pub fn load_child_bindings<P: AsRef<Path>>(path: P) -> Result<Vec<ChildBinding>> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read child bindings file: {}", path.as_ref().display()))?;
    let bindings: Vec<ChildBinding> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse child bindings JSON: {}", path.as_ref().display()))?;
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registrations() {
        let json = r#"[
            {
                "address": "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f",
                "is_factory": true,
                "protocol_name": "uniswap-v2",
                "chain_name": "eth-mainnet"
            },
            {
                "address": "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789",
                "protocol_name": "4337-entry-point",
                "chain_name": "matic-mainnet"
            }
        ]"#;
        let regs: Vec<ProtocolRegistration> = serde_json::from_str(json).unwrap();
        assert_eq!(regs.len(), 2);
        assert!(regs[0].is_factory);
        // is_factory defaults to false when omitted
        assert!(!regs[1].is_factory);
        assert_eq!(regs[1].protocol_name, "4337-entry-point");
    }

    #[test]
    fn test_parse_child_bindings() {
        let json = r#"[
            {
                "chain_name": "eth-mainnet",
                "child": "0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc",
                "factory": "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"
            }
        ]"#;
        let bindings: Vec<ChildBinding> = serde_json::from_str(json).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].chain_name, "eth-mainnet");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_registrations("/nonexistent/protocols.json").is_err());
    }
}
