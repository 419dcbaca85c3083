//! Uniswap V2 (and forks sharing its pair interface)
//!
//! The factory addresses are registered with is_factory, so every pair the
//! factory deployed resolves to this protocol once the crawler has bound
//! the pair to its factory. The Swap rule is chain-wildcarded: all V2
//! deployments share the pair event ABI.

use crate::abi::DecodeError;
use crate::normalize::{DetailValue, EventPayload};
use crate::registry::{DecodeCapability, RegistryBuilder, RegistryError};
use crate::resolver::ProtocolRegistration;
use crate::types::{DecodedAction, EventCategory, ProtocolInfo, RawLog};

const PROTOCOL: &str = "uniswap-v2";
const PAIR_ABI: &str = include_str!("abis/uniswap-v2-pair.json");

pub fn registrations() -> Vec<ProtocolRegistration> {
    vec![
        ProtocolRegistration {
            address: "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f".to_string(),
            is_factory: true,
            protocol_name: PROTOCOL.to_string(),
            chain_name: "eth-mainnet".to_string(),
        },
        ProtocolRegistration {
            address: "0xcf329b34049033de26e4449aebcb41f1992724d3".to_string(),
            is_factory: true,
            protocol_name: PROTOCOL.to_string(),
            chain_name: "defi-kingdoms-mainnet".to_string(),
        },
    ]
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    let abi = super::parse_abi(PROTOCOL, PAIR_ABI)?;
    builder.register(PROTOCOL, "Swap", &["*"], &abi, decode_swap)
}

fn decode_swap(
    log: &RawLog,
    _chain: &str,
    abi: DecodeCapability<'_>,
) -> Result<EventPayload, DecodeError> {
    let args = abi.decode(log)?;
    let decimals = log.sender_contract_decimals;

    Ok(EventPayload {
        action: DecodedAction::Swapped,
        category: EventCategory::Dex,
        name: "Swap".to_string(),
        protocol: ProtocolInfo::from_log(log),
        details: vec![
            DetailValue::text("Sender", format!("{:?}", args.address("sender")?)),
            DetailValue::text("Recipient", format!("{:?}", args.address("to")?)),
            DetailValue::amount("Amount 0 In", args.uint("amount0In")?, decimals),
            DetailValue::amount("Amount 1 In", args.uint("amount1In")?, decimals),
            DetailValue::amount("Amount 0 Out", args.uint("amount0Out")?, decimals),
            DetailValue::amount("Amount 1 Out", args.uint("amount1Out")?, decimals),
        ],
    })
}
