//! Normalization Layer
//!
//! Purpose:
//!     Enforces the canonical output schema every decode rule must produce.
//!     Rules return an `EventPayload` whose amount details are still raw
//!     integers; normalization validates mandatory fields and renders each
//!     amount as an exact decimal string scaled by the token's decimals.
//!     Financial quantities never pass through floating point.
//!
//! Scaling rule:
//!     raw amount / 10^decimals, full precision, trailing zeros trimmed.
//!     decimals of zero renders the raw integer string. A missing or
//!     unrepresentable scaling exponent falls back to an explicit
//!     "(unscaled)" marker in the value rather than failing the log.

use crate::types::{DecodedAction, DecodedEvent, EventCategory, EventDetail, ProtocolInfo};
use alloy::primitives::utils::format_units;
use alloy::primitives::U256;
use thiserror::Error;

/// A rule's output failed schema validation. A rule-authoring defect,
/// scoped to one log, reported with enough context to locate the rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule output for {protocol}:{event} on {chain} failed validation: {reason}")]
pub struct SchemaError {
    pub protocol: String,
    pub event: String,
    pub chain: String,
    pub reason: String,
}

/// One display detail as produced by a rule, before value rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailValue {
    /// Pre-rendered value (addresses, hashes, flags)
    Text { title: String, value: String },
    /// Raw integer amount awaiting scaling by `decimals`
    Amount {
        title: String,
        amount: U256,
        decimals: Option<u8>,
    },
}

impl DetailValue {
    pub fn text(title: impl Into<String>, value: impl Into<String>) -> Self {
        DetailValue::Text {
            title: title.into(),
            value: value.into(),
        }
    }

    pub fn amount(title: impl Into<String>, amount: U256, decimals: Option<u8>) -> Self {
        DetailValue::Amount {
            title: title.into(),
            amount,
            decimals,
        }
    }

    fn title(&self) -> &str {
        match self {
            DetailValue::Text { title, .. } | DetailValue::Amount { title, .. } => title,
        }
    }
}

/// Raw rule output: same shape as `DecodedEvent` but with unrendered
/// detail values. The normalization layer is the only way to turn this
/// into a `DecodedEvent`, so no rule can drift the output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub action: DecodedAction,
    pub category: EventCategory,
    pub name: String,
    pub protocol: ProtocolInfo,
    pub details: Vec<DetailValue>,
}

/// Validate a rule's payload and render it into the canonical schema.
/// `protocol`/`event`/`chain` identify the rule for error context.
pub fn normalize(
    protocol: &str,
    event: &str,
    chain: &str,
    payload: EventPayload,
) -> Result<DecodedEvent, SchemaError> {
    let schema_error = |reason: &str| SchemaError {
        protocol: protocol.to_string(),
        event: event.to_string(),
        chain: chain.to_string(),
        reason: reason.to_string(),
    };

    if payload.name.trim().is_empty() {
        return Err(schema_error("event name is empty"));
    }
    if payload.details.iter().any(|d| d.title().trim().is_empty()) {
        return Err(schema_error("detail entry has an empty title"));
    }

    let details = payload
        .details
        .into_iter()
        .map(|detail| match detail {
            DetailValue::Text { title, value } => EventDetail { title, value },
            DetailValue::Amount {
                title,
                amount,
                decimals,
            } => EventDetail {
                title,
                value: scale_amount(amount, decimals),
            },
        })
        .collect();

    Ok(DecodedEvent {
        action: payload.action,
        category: payload.category,
        name: payload.name,
        protocol: payload.protocol,
        details,
    })
}

/// Render `amount / 10^decimals` as a decimal string with full precision.
/// A missing or out-of-range exponent yields an explicit unscaled marker
/// instead of a guess; scaling anomalies must not crash the pipeline.
pub fn scale_amount(amount: U256, decimals: Option<u8>) -> String {
    match decimals {
        Some(0) => amount.to_string(),
        Some(d) => match format_units(amount, d) {
            Ok(rendered) => trim_fraction(rendered),
            Err(_) => format!("{amount} (unscaled)"),
        },
        None => format!("{amount} (unscaled)"),
    }
}

/// Drop trailing fractional zeros ("1.500000" -> "1.5", "3.000" -> "3").
fn trim_fraction(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
