//! Event decoder for SIS3316 raw records
//!
//! Decodes one digitized pulse from an NGM channel dump.
//!
//! # Data Format
//!
//! An event is a variable-length run of 32-bit Little-Endian words:
//!
//! ```text
//! 2 words   header: format bits, channel ID, 48-bit timestamp
//! 7 words   peak/accumulator group        (format bit 0)
//! 2 words   extended accumulator group    (format bit 1)
//! 3 words   MAW group                     (format bit 2)
//! 2 words   energy group                  (format bit 3)
//! 1 word    sample count + pileup/MAW-test flags
//! n/2 words waveform, two 16-bit samples per word, low half first
//! ```
//!
//! Disabled groups occupy no words on disk; their fields decode to zero.

use super::bits::{field, flag, split_samples, timestamp48};
use crate::common::{ByteSource, DecodeError, DecodeResult};
use serde::{Deserialize, Serialize};
use std::io::Read;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub mod constants {
    /// Words in the unconditional event header.
    pub const HEADER_WORDS: u32 = 2;
    /// Words in the sample-count word.
    pub const LENGTH_WORDS: u32 = 1;

    // Header word 0
    pub const FORMAT_MASK: u32 = 0xf;
    pub const CHANNEL_MASK: u32 = 0xfff0;
    pub const CHANNEL_SHIFT: u32 = 4;

    // Format bits
    pub const FMT_PEAK_ACCUM: u8 = 0x1;
    pub const FMT_EXT_ACCUM: u8 = 0x2;
    pub const FMT_MAW: u8 = 0x4;
    pub const FMT_ENERGY: u8 = 0x8;

    // Optional group sizes in words
    pub const PEAK_ACCUM_WORDS: u32 = 7;
    pub const EXT_ACCUM_WORDS: u32 = 2;
    pub const MAW_WORDS: u32 = 3;
    pub const ENERGY_WORDS: u32 = 2;

    // Peak/accumulator group
    pub const PEAK_VALUE_MASK: u32 = 0xffff;
    pub const PEAK_INDEX_MASK: u32 = 0xffff_0000;
    pub const PEAK_INDEX_SHIFT: u32 = 16;
    pub const INFO_MASK: u32 = 0xff00_0000;
    pub const INFO_SHIFT: u32 = 24;
    pub const ACCUM0_MASK: u32 = 0x00ff_ffff;

    // Sample-count word
    pub const SAMPLE_WORDS_MASK: u32 = 0x03ff_ffff;
    pub const PILEUP_BIT: u32 = 26;
    pub const MAW_TEST_BIT: u32 = 27;
}

// ---------------------------------------------------------------------------
// Word budget
// ---------------------------------------------------------------------------

/// Remaining-word counter for one channel dump.
///
/// The dump header declares how many words the dump holds; every read the
/// event decoder performs is deducted here first. Checked subtraction means
/// the counter can never silently go negative: an overrun surfaces as
/// `WordBudgetExceeded` before the bytes are consumed.
#[derive(Debug, Clone, Copy)]
pub struct WordBudget {
    remaining: u32,
}

impl WordBudget {
    pub fn new(words: u32) -> Self {
        Self { remaining: words }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Deduct `words` from the budget, failing if the dump declared fewer.
    pub fn consume(&mut self, words: u32) -> DecodeResult<()> {
        match self.remaining.checked_sub(words) {
            Some(left) => {
                self.remaining = left;
                Ok(())
            }
            None => Err(DecodeError::WordBudgetExceeded {
                needed: words,
                remaining: self.remaining,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded event
// ---------------------------------------------------------------------------

/// One fully decoded SIS3316 pulse.
///
/// Fields of disabled optional groups are present and zero, matching the
/// on-disk convention that absence is a defined zero rather than a missing
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SisEvent {
    /// Card-relative channel identifier (0..channels_per_card)
    pub channel_id: u16,
    /// 48-bit monotonic timestamp, the ordering key within a spill
    pub timestamp: u64,
    /// 4-bit flag set selecting which optional groups were stored
    pub format_bits: u8,

    // Peak/accumulator group (format bit 0)
    pub peak_high_index: u16,
    pub peak_high_value: u16,
    pub info_bits: u8,
    /// Six standard sums (0..6) plus two extended sums (6..8, format bit 1)
    pub accumulator_sum: [u32; 8],

    // MAW group (format bit 2)
    pub maw_maximum: u32,
    pub maw_after_trigger: u32,
    pub maw_before_trigger: u32,

    // Energy group (format bit 3)
    pub start_energy: u32,
    pub max_energy: u32,

    // Flags from the sample-count word
    pub pileup: bool,
    pub maw_test: bool,

    /// Raw ADC trace, always of even length
    pub waveform: Vec<u16>,
}

impl SisEvent {
    /// Declared sample count; always equal to `waveform.len()` and even.
    pub fn n_samples(&self) -> u32 {
        self.waveform.len() as u32
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode one event from the cursor, deducting every word consumed from the
/// caller's dump budget.
///
/// Fails with `Truncated` if the source runs out of bytes, or with
/// `WordBudgetExceeded` if the event needs more words than the dump
/// declared. Neither failure returns a partial record.
pub fn decode_event<R: Read>(
    src: &mut ByteSource<R>,
    budget: &mut WordBudget,
) -> DecodeResult<SisEvent> {
    use constants::*;

    // Event header, present no matter what the format bits say
    budget.consume(HEADER_WORDS)?;
    let [word0, word1] = src.read_words::<2>()?;

    let format_bits = field(word0, FORMAT_MASK, 0) as u8;
    let channel_id = field(word0, CHANNEL_MASK, CHANNEL_SHIFT) as u16;
    let timestamp = timestamp48(word0, word1);

    // Peak/accumulator group
    let mut peak_high_index = 0u16;
    let mut peak_high_value = 0u16;
    let mut info_bits = 0u8;
    let mut accumulator_sum = [0u32; 8];
    if format_bits & FMT_PEAK_ACCUM != 0 {
        budget.consume(PEAK_ACCUM_WORDS)?;
        let words = src.read_words::<7>()?;
        peak_high_value = field(words[0], PEAK_VALUE_MASK, 0) as u16;
        peak_high_index = field(words[0], PEAK_INDEX_MASK, PEAK_INDEX_SHIFT) as u16;
        info_bits = field(words[1], INFO_MASK, INFO_SHIFT) as u8;
        accumulator_sum[0] = field(words[1], ACCUM0_MASK, 0);
        accumulator_sum[1..6].copy_from_slice(&words[2..7]);
    }

    // Extended accumulator group
    if format_bits & FMT_EXT_ACCUM != 0 {
        budget.consume(EXT_ACCUM_WORDS)?;
        let [acc6, acc7] = src.read_words::<2>()?;
        accumulator_sum[6] = acc6;
        accumulator_sum[7] = acc7;
    }

    // MAW group
    let mut maw_maximum = 0u32;
    let mut maw_after_trigger = 0u32;
    let mut maw_before_trigger = 0u32;
    if format_bits & FMT_MAW != 0 {
        budget.consume(MAW_WORDS)?;
        let [max, after, before] = src.read_words::<3>()?;
        maw_maximum = max;
        maw_after_trigger = after;
        maw_before_trigger = before;
    }

    // Energy group
    let mut start_energy = 0u32;
    let mut max_energy = 0u32;
    if format_bits & FMT_ENERGY != 0 {
        budget.consume(ENERGY_WORDS)?;
        let [start, max] = src.read_words::<2>()?;
        start_energy = start;
        max_energy = max;
    }

    // Sample-count word; n_samples is 2 * stored value, so always even
    budget.consume(LENGTH_WORDS)?;
    let length_word = src.read_word()?;
    let n_samples = 2 * field(length_word, SAMPLE_WORDS_MASK, 0);
    let pileup = flag(length_word, PILEUP_BIT);
    let maw_test = flag(length_word, MAW_TEST_BIT);

    // Waveform: each word carries two consecutive samples
    let sample_words = n_samples / 2;
    budget.consume(sample_words)?;
    let mut waveform = Vec::with_capacity(n_samples as usize);
    for _ in 0..sample_words {
        let (low, high) = split_samples(src.read_word()?);
        waveform.push(low);
        waveform.push(high);
    }

    Ok(SisEvent {
        channel_id,
        timestamp,
        format_bits,
        peak_high_index,
        peak_high_value,
        info_bits,
        accumulator_sum,
        maw_maximum,
        maw_after_trigger,
        maw_before_trigger,
        start_energy,
        max_energy,
        pileup,
        maw_test,
        waveform,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
