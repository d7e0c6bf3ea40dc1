//! Bit-field extraction primitives for SIS3316 raw words
//!
//! Every value in the NGM binary format lives in a 32-bit Little-Endian word,
//! either as the whole word or as a masked sub-field. These helpers are the
//! only place mask/shift arithmetic happens; the decoders above them work in
//! terms of named fields.

/// Extract a masked-and-shifted unsigned field from a 32-bit word.
#[inline]
pub fn field(word: u32, mask: u32, shift: u32) -> u32 {
    (word & mask) >> shift
}

/// Test a single flag bit.
#[inline]
pub fn flag(word: u32, bit: u32) -> bool {
    (word >> bit) & 1 != 0
}

/// Reconstruct the 48-bit event timestamp from the two event header words.
///
/// The top 16 bits of word 0 form bits 47..32; word 1 supplies bits 31..0.
#[inline]
pub fn timestamp48(word0: u32, word1: u32) -> u64 {
    (((word0 & 0xffff_0000) as u64) << 16) | word1 as u64
}

/// Split a sample word into its two consecutive 16-bit samples,
/// low half-word first.
#[inline]
pub fn split_samples(word: u32) -> (u16, u16) {
    ((word & 0xffff) as u16, (word >> 16) as u16)
}
