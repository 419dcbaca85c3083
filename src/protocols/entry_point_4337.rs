//! ERC-4337 EntryPoint (account abstraction)
//!
//! Decodes `UserOperationEvent` from the canonical EntryPoint contract.
//! Gas quantities are scaled by the sender contract's decimals enrichment
//! (the gas token's smallest unit).

use crate::abi::DecodeError;
use crate::normalize::{DetailValue, EventPayload};
use crate::registry::{DecodeCapability, RegistryBuilder, RegistryError};
use crate::resolver::ProtocolRegistration;
use crate::types::{DecodedAction, EventCategory, ProtocolInfo, RawLog};

const PROTOCOL: &str = "4337-entry-point";
const ENTRY_POINT_ABI: &str = include_str!("abis/4337-entry-point.json");

pub fn registrations() -> Vec<ProtocolRegistration> {
    vec![ProtocolRegistration {
        address: "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789".to_string(),
        is_factory: false,
        protocol_name: PROTOCOL.to_string(),
        chain_name: "matic-mainnet".to_string(),
    }]
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    let abi = super::parse_abi(PROTOCOL, ENTRY_POINT_ABI)?;
    builder.register(
        PROTOCOL,
        "UserOperationEvent",
        &["matic-mainnet"],
        &abi,
        decode_user_operation,
    )
}

fn decode_user_operation(
    log: &RawLog,
    _chain: &str,
    abi: DecodeCapability<'_>,
) -> Result<EventPayload, DecodeError> {
    let args = abi.decode(log)?;
    let decimals = log.sender_contract_decimals;

    Ok(EventPayload {
        action: DecodedAction::AccountAbstraction,
        category: EventCategory::Others,
        name: "User Operation Event".to_string(),
        protocol: ProtocolInfo::from_log(log),
        details: vec![
            DetailValue::amount("Gas Cost", args.uint("actualGasCost")?, decimals),
            DetailValue::amount("Gas Used", args.uint("actualGasUsed")?, decimals),
            DetailValue::text("Paymaster", format!("{:?}", args.address("paymaster")?)),
            DetailValue::text("Sender", format!("{:?}", args.address("sender")?)),
            DetailValue::text(
                "User Operation Hash",
                format!("{:?}", args.fixed_bytes("userOpHash")?),
            ),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchEngine, DispatchOutcome};
    use crate::resolver::{AddressResolver, FactoryChildIndex};
    use alloy::primitives::{address, b256, keccak256, Bytes, U256};
    use std::sync::Arc;

    const ENTRY_POINT: alloy::primitives::Address =
        address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");

    fn engine() -> DispatchEngine {
        let resolver = AddressResolver::from_registrations(
            &registrations(),
            Arc::new(FactoryChildIndex::new()),
        )
        .unwrap();
        let mut builder = RegistryBuilder::new();
        register(&mut builder).unwrap();
        DispatchEngine::new(resolver, builder.build())
    }

    fn user_op_log() -> RawLog {
        let user_op_hash =
            b256!("d5c7e8f43be86f6edcf3e5a0b8a84b72c0e2a11b9d5a3cc3cc7f1f9f6a35cd0d");
        let sender = address!("a02137f33e4f30ad20cddc8da28a5dbbbde1fb81");
        let paymaster = address!("0000000000000000000000000000000000000000");

        // nonce, success, actualGasCost, actualGasUsed
        let mut data = Vec::with_capacity(128);
        data.extend_from_slice(&U256::from(7u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(52_843_000_000_000u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(175_212u64).to_be_bytes::<32>());

        RawLog {
            chain_name: "matic-mainnet".to_string(),
            sender_address: ENTRY_POINT,
            raw_log_topics: vec![
                keccak256(
                    b"UserOperationEvent(bytes32,address,address,uint256,bool,uint256,uint256)",
                ),
                user_op_hash,
                sender.into_word(),
                paymaster.into_word(),
            ],
            raw_log_data: Bytes::from(data),
            block_signed_at: None,
            tx_hash: None,
            sender_name: Some("EntryPoint".to_string()),
            sender_logo_url: None,
            sender_contract_decimals: Some(18),
        }
    }

    #[test]
    fn test_user_operation_decodes() {
        let outcome = engine().dispatch(&user_op_log());
        let DispatchOutcome::Decoded(event) = outcome else {
            panic!("expected Decoded, got {outcome:?}");
        };

        assert_eq!(event.action, DecodedAction::AccountAbstraction);
        assert_eq!(event.category, EventCategory::Others);
        assert_eq!(event.name, "User Operation Event");

        assert_eq!(event.details[0].title, "Gas Cost");
        assert_eq!(event.details[0].value, "0.000052843");
        assert_eq!(event.details[1].title, "Gas Used");
        assert_eq!(event.details[1].value, "0.000000000000175212");
        assert_eq!(
            event.details[3].value.to_lowercase(),
            "0xa02137f33e4f30ad20cddc8da28a5dbbbde1fb81"
        );
    }

    #[test]
    fn test_chain_allow_list_enforced() {
        // Same contract, same topic0, wrong chain: the rule must not fire.
        let mut regs = registrations();
        regs[0].chain_name = "eth-mainnet".to_string();
        let resolver = AddressResolver::from_registrations(
            &regs,
            Arc::new(FactoryChildIndex::new()),
        )
        .unwrap();
        let mut builder = RegistryBuilder::new();
        register(&mut builder).unwrap();
        let engine = DispatchEngine::new(resolver, builder.build());

        let mut log = user_op_log();
        log.chain_name = "eth-mainnet".to_string();
        let outcome = engine.dispatch(&log);
        assert!(matches!(
            outcome,
            DispatchOutcome::Skipped(crate::dispatch::SkipReason::NoMatchingRule)
        ));
    }

    #[test]
    fn test_account_deployed_has_no_rule() {
        // The ABI carries AccountDeployed but no rule is registered for it.
        let mut log = user_op_log();
        log.raw_log_topics =
            vec![keccak256(b"AccountDeployed(bytes32,address,address,address)")];
        log.raw_log_data = Bytes::new();
        assert!(engine().dispatch(&log).is_skipped());
    }
}
