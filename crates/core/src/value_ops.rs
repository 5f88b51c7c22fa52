//! Byte-array `Value` type and its arithmetic operators.
//!
//! `subtract`, `multiply`, and `divide` have no defined semantics for raw
//! byte-array values, so they are kept as explicit "not implemented"
//! stubs rather than guessed at. [`concatenate`] is the one operator with
//! clear semantics: it copies every source buffer into the result, in
//! order.

use thiserror::Error;

/// A raw, unsigned byte-array value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value(pub Vec<u8>);

impl Value {
    /// Wrap raw bytes as a `Value`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Value(bytes.into())
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Errors from the value-arithmetic operators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueOpError {
    /// The operator has no defined semantics for byte-array values yet.
    #[error("{0} is not implemented for byte-array values")]
    NotImplemented(&'static str),
}

/// Concatenate `values` into a single buffer, copying each source buffer
/// into the destination in order.
pub fn concatenate(values: &[Value]) -> Value {
    let total_len: usize = values.iter().map(|v| v.0.len()).sum();
    let mut out = Vec::with_capacity(total_len);
    for v in values {
        out.extend_from_slice(&v.0);
    }
    Value(out)
}

/// Not specified for byte-array values. Always returns
/// [`ValueOpError::NotImplemented`].
pub fn subtract(_a: &Value, _b: &Value) -> Result<Value, ValueOpError> {
    Err(ValueOpError::NotImplemented("subtract"))
}

/// Not specified for byte-array values. Always returns
/// [`ValueOpError::NotImplemented`].
pub fn multiply(_a: &Value, _b: &Value) -> Result<Value, ValueOpError> {
    Err(ValueOpError::NotImplemented("multiply"))
}

/// Not specified for byte-array values. Always returns
/// [`ValueOpError::NotImplemented`].
pub fn divide(_a: &Value, _b: &Value) -> Result<Value, ValueOpError> {
    Err(ValueOpError::NotImplemented("divide"))
}
