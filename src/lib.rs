//! SIS3316-RS: NGM binary-to-event converter for nuclear physics experiments
//!
//! Decodes the spill-framed binary stream written by SIS3316 waveform
//! digitizers and emits fully typed event records in chronological order.

pub mod common;
pub mod config;
pub mod converter;
pub mod decoder;
pub mod sink;
