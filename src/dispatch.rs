//! Dispatch Engine
//!
//! Purpose:
//!     Routes a raw log to the one decode rule that applies and invokes it
//!     with isolated failure handling. Resolution order: address -> protocol
//!     (resolver), then (protocol, topic0, chain) -> rule (registry), then
//!     rule invocation behind a panic boundary, then normalization.
//!
//!     Outcomes are three-valued. `Skipped` is the expected, silent case:
//!     most logs an indexer observes belong to no tracked protocol.
//!     `Failed` is the unexpected, loggable case, always scoped to the one
//!     log that caused it. One misbehaving or stale rule cannot take down
//!     the pipeline; this isolation is the engine's central correctness
//!     property.
//!
//! Author: AI-Generated
//! Created: 2026-07-29

use crate::abi::{AlloyEventDecoder, DecodeError, EventAbiDecoder};
use crate::normalize::{normalize, SchemaError};
use crate::registry::RuleRegistry;
use crate::resolver::AddressResolver;
use crate::types::{DecodedEvent, RawLog};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a log was skipped. Expected and frequent; not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The emitting address resolves to no tracked protocol
    UnknownAddress,
    /// The log carries no topics (anonymous event)
    MissingTopic0,
    /// The protocol is tracked but no rule matches (topic0, chain)
    NoMatchingRule,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::UnknownAddress => write!(f, "address not registered to any protocol"),
            SkipReason::MissingTopic0 => write!(f, "log has no topic0"),
            SkipReason::NoMatchingRule => write!(f, "no rule for (protocol, topic0, chain)"),
        }
    }
}

/// What went wrong inside a matched rule
#[derive(Debug)]
pub enum FailureReason {
    /// The ABI-decode primitive or the rule body rejected the log
    Decode(DecodeError),
    /// The rule's output failed normalization
    Schema(SchemaError),
    /// The rule panicked; contained at the dispatch boundary
    RulePanic(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureReason::Decode(e) => write!(f, "{e}"),
            FailureReason::Schema(e) => write!(f, "{e}"),
            FailureReason::RulePanic(msg) => write!(f, "rule panicked: {msg}"),
        }
    }
}

/// A per-log failure, tagged with enough context to locate the rule.
#[derive(Debug)]
pub struct DispatchFailure {
    pub protocol: String,
    pub event: String,
    pub chain: String,
    pub reason: FailureReason,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{} on {}: {}",
            self.protocol, self.event, self.chain, self.reason
        )
    }
}

/// Per-log dispatch result
#[derive(Debug)]
pub enum DispatchOutcome {
    Decoded(DecodedEvent),
    Skipped(SkipReason),
    Failed(DispatchFailure),
}

impl DispatchOutcome {
    pub fn is_decoded(&self) -> bool {
        matches!(self, DispatchOutcome::Decoded(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DispatchOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }
}

/// Running outcome tally for a batch of dispatched logs
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    pub decoded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Decoded(_) => self.decoded += 1,
            DispatchOutcome::Skipped(_) => self.skipped += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.decoded + self.skipped + self.failed
    }
}

/// The dispatch engine: frozen resolver + frozen registry + the external
/// ABI-decode capability. `dispatch` is a pure function of its input and
/// this immutable state, so one engine is shared across workers via `Arc`
/// with no locking.
pub struct DispatchEngine {
    resolver: AddressResolver,
    registry: RuleRegistry,
    decoder: Arc<dyn EventAbiDecoder>,
}

impl DispatchEngine {
    pub fn new(resolver: AddressResolver, registry: RuleRegistry) -> Self {
        Self::with_decoder(resolver, registry, Arc::new(AlloyEventDecoder))
    }

    /// Swap in a different ABI-decode primitive (tests, instrumentation).
    pub fn with_decoder(
        resolver: AddressResolver,
        registry: RuleRegistry,
        decoder: Arc<dyn EventAbiDecoder>,
    ) -> Self {
        Self {
            resolver,
            registry,
            decoder,
        }
    }

    /// Decode one raw log. Never panics, never returns a process-level
    /// error; every anomaly is a tagged outcome for this log alone.
    pub fn dispatch(&self, log: &RawLog) -> DispatchOutcome {
        let chain = log.chain_name.as_str();

        let Some(protocol) = self.resolver.resolve(chain, log.sender_address) else {
            return DispatchOutcome::Skipped(SkipReason::UnknownAddress);
        };

        let Some(topic0) = log.topic0() else {
            debug!(
                "Skipping log from {:?} on {}: no topic0",
                log.sender_address, chain
            );
            return DispatchOutcome::Skipped(SkipReason::MissingTopic0);
        };

        let Some(rule) = self.registry.lookup(protocol, topic0, chain) else {
            debug!(
                "Skipping log from {:?} on {}: protocol {} has no rule for {}",
                log.sender_address, chain, protocol, topic0
            );
            return DispatchOutcome::Skipped(SkipReason::NoMatchingRule);
        };

        // Panic boundary: a buggy rule is contained exactly like an
        // erroring one, and the next log dispatches normally.
        let invoked = catch_unwind(AssertUnwindSafe(|| {
            rule.invoke(log, chain, self.decoder.as_ref())
        }));

        let failure = |reason: FailureReason| {
            warn!(
                "Decode failed for {}:{} on {}: {}",
                rule.protocol, rule.event_name, chain, reason
            );
            DispatchOutcome::Failed(DispatchFailure {
                protocol: rule.protocol.clone(),
                event: rule.event_name.clone(),
                chain: chain.to_string(),
                reason,
            })
        };

        match invoked {
            Err(panic) => failure(FailureReason::RulePanic(panic_message(&panic))),
            Ok(Err(e)) => failure(FailureReason::Decode(e)),
            Ok(Ok(payload)) => {
                match normalize(&rule.protocol, &rule.event_name, chain, payload) {
                    Ok(event) => DispatchOutcome::Decoded(event),
                    Err(e) => failure(FailureReason::Schema(e)),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
