//! EVM Event Log Decoder Library
//!
//! Decodes raw blockchain event logs into normalized, human-readable event
//! records. Per-protocol decode rules register once at startup, scoped to
//! chains and contract addresses (including factory-spawned families);
//! dispatch matches each incoming log against the frozen registry and
//! invokes the one rule that applies, with per-log failure isolation.
//!
//! Author: AI-Generated
//! Created: 2026-07-28

pub mod abi;
pub mod config;
pub mod dispatch;
pub mod normalize;
pub mod protocols;
pub mod registry;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use abi::{AlloyEventDecoder, DecodeError, DecodedArgs, EventAbiDecoder};
pub use config::{load_child_bindings, load_registrations, ChildBinding};
pub use dispatch::{
    DispatchEngine, DispatchFailure, DispatchOutcome, DispatchStats, FailureReason, SkipReason,
};
pub use normalize::{normalize, scale_amount, DetailValue, EventPayload, SchemaError};
pub use registry::{
    ChainScope, DecodeCapability, DecodeRule, RegistryBuilder, RegistryError, RuleRegistry,
};
pub use resolver::{AddressResolver, FactoryChildIndex, ProtocolRegistration};
pub use types::{DecodedAction, DecodedEvent, EventCategory, EventDetail, ProtocolInfo, RawLog};
