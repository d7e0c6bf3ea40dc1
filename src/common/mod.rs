//! Shared plumbing for the converter: error types and the byte source.

pub mod error;
pub mod source;

pub use error::{DecodeError, DecodeResult};
pub use source::{ByteSource, WORD_SIZE};
