//! Transaction identifiers: immutable, fixed-width, big-endian byte
//! sequences.

use std::fmt;

/// The only wire lengths a [`Tid`] may take.
pub const VALID_LENGTHS: [usize; 4] = [4, 8, 16, 20];

/// An opaque, fixed-width transaction identifier.
///
/// Equality, ordering, and hashing all derive from the underlying byte
/// sequence, so equal TIDs always hash equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(Vec<u8>);

/// A [`Tid`] was constructed from a byte sequence of an unsupported length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("TID must be 4, 8, 16, or 20 bytes, got {0}")]
pub struct InvalidTidLength(pub usize);

impl Tid {
    /// Decode a TID from its raw big-endian wire bytes.
    ///
    /// # Errors
    /// Returns [`InvalidTidLength`] unless `bytes.len()` is one of
    /// [`VALID_LENGTHS`].
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, InvalidTidLength> {
        let bytes = bytes.into();
        if VALID_LENGTHS.contains(&bytes.len()) {
            Ok(Tid(bytes))
        } else {
            Err(InvalidTidLength(bytes.len()))
        }
    }

    /// Borrow the raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wire length in bytes (always one of [`VALID_LENGTHS`]).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// TIDs are never empty; this always returns `false`. Present for
    /// clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Tid {
    /// Uppercase hex without separators.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
