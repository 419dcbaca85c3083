//! ABI Event Decode Capability
//!
//! Purpose:
//!     Wraps alloy's dynamic ABI machinery behind a small trait so decode
//!     rules depend on a capability, not a library. Rules receive decoded
//!     arguments addressable by name with typed accessors.
//!
//! Dependencies:
//!     - alloy (json-abi event definitions, dyn-abi decoding)

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::Event;
use alloy::primitives::{Address, B256, I256, U256};
use thiserror::Error;

/// Per-log decode failure. Scoped to a single log; never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The ABI-decode primitive rejected the payload (shape mismatch,
    /// truncated data, wrong topic count)
    #[error("ABI decode failed for event `{event}`: {source}")]
    Abi {
        event: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
    /// A decoded argument was missing or of an unexpected type
    #[error("argument `{name}` missing or of unexpected type")]
    ArgMismatch { name: String },
    /// Rule-specific failure (unexpected argument shape, arithmetic error)
    #[error("{0}")]
    Rule(String),
}

/// Decoded event arguments, addressable by ABI input name.
#[derive(Debug, Clone)]
pub struct DecodedArgs {
    args: Vec<(String, DynSolValue)>,
}

impl DecodedArgs {
    fn value(&self, name: &str) -> Result<&DynSolValue, DecodeError> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| DecodeError::ArgMismatch {
                name: name.to_string(),
            })
    }

    pub fn address(&self, name: &str) -> Result<Address, DecodeError> {
        match self.value(name)? {
            DynSolValue::Address(a) => Ok(*a),
            _ => Err(DecodeError::ArgMismatch {
                name: name.to_string(),
            }),
        }
    }

    pub fn uint(&self, name: &str) -> Result<U256, DecodeError> {
        match self.value(name)? {
            DynSolValue::Uint(v, _) => Ok(*v),
            _ => Err(DecodeError::ArgMismatch {
                name: name.to_string(),
            }),
        }
    }

    pub fn int(&self, name: &str) -> Result<I256, DecodeError> {
        match self.value(name)? {
            DynSolValue::Int(v, _) => Ok(*v),
            _ => Err(DecodeError::ArgMismatch {
                name: name.to_string(),
            }),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, DecodeError> {
        match self.value(name)? {
            DynSolValue::Bool(b) => Ok(*b),
            _ => Err(DecodeError::ArgMismatch {
                name: name.to_string(),
            }),
        }
    }

    pub fn fixed_bytes(&self, name: &str) -> Result<B256, DecodeError> {
        match self.value(name)? {
            DynSolValue::FixedBytes(word, 32) => Ok(*word),
            _ => Err(DecodeError::ArgMismatch {
                name: name.to_string(),
            }),
        }
    }

    /// Number of decoded arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// The externally supplied ABI-decode primitive. Pure computation over the
/// supplied bytes; trusted, not reimplemented here.
pub trait EventAbiDecoder: Send + Sync {
    fn decode_event(
        &self,
        event: &Event,
        topics: &[B256],
        data: &[u8],
    ) -> Result<DecodedArgs, DecodeError>;
}

/// Default implementation backed by alloy's dyn-abi.
pub struct AlloyEventDecoder;

impl EventAbiDecoder for AlloyEventDecoder {
    fn decode_event(
        &self,
        event: &Event,
        topics: &[B256],
        data: &[u8],
    ) -> Result<DecodedArgs, DecodeError> {
        let decoded = event
            .decode_log_parts(topics.iter().copied(), data)
            .map_err(|e| DecodeError::Abi {
                event: event.name.clone(),
                source: e,
            })?;

        // Indexed inputs decode from topics in declaration order, the rest
        // from the data section. Re-associate values with input names so
        // rules address arguments by name.
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args = Vec::with_capacity(event.inputs.len());
        for input in &event.inputs {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            match value {
                Some(v) => args.push((input.name.clone(), v)),
                None => {
                    return Err(DecodeError::ArgMismatch {
                        name: input.name.clone(),
                    })
                }
            }
        }

        Ok(DecodedArgs { args })
    }
}
