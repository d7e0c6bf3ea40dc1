//! Spill framing and chronological reordering
//!
//! One spill covers every configured card and channel for one acquisition
//! window. Channel dumps are stored back-to-back, so events arrive in
//! channel-scan order and must be re-sorted by timestamp before they leave
//! the spill.
//!
//! # Data Format
//!
//! ```text
//! 10 words  spill header (word 0 == 0x0E0F0E0F marks end of stream)
//! per card:
//!   2 words  card packet header (skipped)
//!   per channel:
//!     8 words  channel dump header; word 7 declares the dump word count
//!     events   back-to-back until the declared word count is exhausted
//! ```
//!
//! An incomplete dump poisons the whole spill: the failure point inside the
//! corrupt channel is unknown, so downstream channel offsets cannot be
//! trusted. The spill's buffer is dropped and processing resumes at the next
//! spill boundary.

use std::io::Read;

use tracing::warn;

use super::event::{decode_event, SisEvent, WordBudget};
use crate::common::{ByteSource, DecodeResult, WORD_SIZE};
use crate::config::DaqConfig;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub mod constants {
    /// Spill header length in words.
    pub const SPILL_HEADER_WORDS: usize = 10;
    /// Sentinel in the first spill-header word marking end of stream.
    pub const END_OF_STREAM: u32 = 0x0E0F_0E0F;
    /// Per-card packet header length in words (skipped).
    pub const CARD_HEADER_WORDS: usize = 2;
    /// Channel dump header length in words.
    pub const CHANNEL_HEADER_WORDS: usize = 8;
    /// Index of the declared dump word count within the channel header.
    pub const DUMP_WORDS_INDEX: usize = 7;
    /// Minimum bytes that must remain after a channel header for the dump to
    /// be considered present. Matches the acquisition software's check; it
    /// does not prove the full declared word count is available, short
    /// payloads are caught by the byte source during event decode.
    pub const MIN_DUMP_BYTES: u64 = 40;
}

// ---------------------------------------------------------------------------
// Reorder buffer
// ---------------------------------------------------------------------------

/// Unsorted accumulation of every event decoded within one spill.
///
/// Owned by the spill reader for the spill's lifetime, then drained in
/// timestamp order. Ties keep insertion order (stable sort), which is the
/// deterministic channel-scan order.
#[derive(Debug, Default)]
pub struct SpillBuffer {
    events: Vec<SisEvent>,
}

impl SpillBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SisEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drain the buffer in chronological order.
    ///
    /// A pure reordering: every accumulated event comes out exactly once.
    pub fn into_sorted(mut self) -> Vec<SisEvent> {
        self.events.sort_by_key(|event| event.timestamp);
        self.events
    }
}

// ---------------------------------------------------------------------------
// Spill reader
// ---------------------------------------------------------------------------

/// Outcome of framing one spill.
#[derive(Debug)]
pub enum SpillStatus {
    /// Every configured channel dump decoded; events are still unsorted.
    Complete(SpillBuffer),
    /// A dump was truncated or overran its budget; the spill was discarded.
    Incomplete,
    /// The end-of-stream sentinel (or the end of the input) was reached.
    EndOfStream,
}

/// Frames one spill at a time from a byte source.
#[derive(Debug, Clone)]
pub struct SpillReader {
    cards: u16,
    channels_per_card: u16,
}

impl SpillReader {
    pub fn new(cards: u16, channels_per_card: u16) -> Self {
        Self {
            cards,
            channels_per_card,
        }
    }

    pub fn from_config(daq: &DaqConfig) -> Self {
        Self::new(daq.cards, daq.channels_per_card)
    }

    /// Read one spill and fill a fresh buffer.
    ///
    /// Recoverable decode failures (truncation, word-budget overrun) are
    /// absorbed here and reported as `Incomplete`; only I/O errors propagate.
    pub fn read_spill<R: Read>(&self, src: &mut ByteSource<R>) -> DecodeResult<SpillStatus> {
        match self.read_spill_inner(src) {
            Ok(status) => Ok(status),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "incomplete dump, discarding spill");
                Ok(SpillStatus::Incomplete)
            }
            Err(err) => Err(err),
        }
    }

    fn read_spill_inner<R: Read>(&self, src: &mut ByteSource<R>) -> DecodeResult<SpillStatus> {
        use constants::*;

        let header_bytes = (SPILL_HEADER_WORDS * WORD_SIZE) as u64;
        if src.remaining() < header_bytes {
            if src.remaining() > 0 {
                warn!(
                    remaining = src.remaining(),
                    "input ended without end-of-stream sentinel"
                );
            }
            return Ok(SpillStatus::EndOfStream);
        }

        let header = src.read_words::<SPILL_HEADER_WORDS>()?;
        if header[0] == END_OF_STREAM {
            return Ok(SpillStatus::EndOfStream);
        }

        let mut buffer = SpillBuffer::new();

        for _card in 0..self.cards {
            src.skip((CARD_HEADER_WORDS * WORD_SIZE) as u64)?;

            for channel in 0..self.channels_per_card {
                let dump_header = src.read_words::<CHANNEL_HEADER_WORDS>()?;
                let dump_words = dump_header[DUMP_WORDS_INDEX];

                if src.remaining() < MIN_DUMP_BYTES {
                    warn!(
                        channel,
                        dump_words,
                        remaining = src.remaining(),
                        "incomplete dump, discarding spill"
                    );
                    return Ok(SpillStatus::Incomplete);
                }

                let mut budget = WordBudget::new(dump_words);
                while !budget.is_empty() {
                    let event = decode_event(src, &mut budget)?;
                    buffer.push(event);
                }
            }
        }

        Ok(SpillStatus::Complete(buffer))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
