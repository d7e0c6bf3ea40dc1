//! Decoder module for SIS3316 NGM binary data
//!
//! Converts the raw byte stream into structured SisEvent records, one spill
//! at a time.

pub mod bits;
pub mod event;
pub mod spill;

pub use event::{decode_event, SisEvent, WordBudget};
pub use spill::{SpillBuffer, SpillReader, SpillStatus};
