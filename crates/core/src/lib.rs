//! Data model shared by the txlock lock manager.
//!
//! This crate carries the pieces of the key–value domain that the lock
//! manager (`txlock-concurrency`) needs as a collaborator but does not own:
//! the key sentinel algebra, transaction identifiers, and the byte-array
//! value type. Storage back-ends, transaction execution, and the wire
//! formats around them are out of scope here; they live with their own
//! collaborators.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod tid;
pub mod value_ops;

pub use error::KeyError;
pub use key::Key;
pub use tid::Tid;
pub use value_ops::Value;
