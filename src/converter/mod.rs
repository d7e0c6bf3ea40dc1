//! Stream driver: file header to sorted events
//!
//! Owns the conversion loop for one input file: skip the file-level header,
//! frame spills until the end-of-stream sentinel, reorder each complete
//! spill chronologically and hand every event to the sink. One bad spill
//! never aborts the run; it is logged, dropped and the loop continues.

use std::io::Read;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::common::{ByteSource, DecodeError};
use crate::config::DaqConfig;
use crate::decoder::{SpillReader, SpillStatus};
use crate::sink::{EventSink, SinkError};

/// File-level NGM header, skipped unconditionally (100 words).
pub const FILE_HEADER_BYTES: u64 = 400;

/// Progress line cadence in events.
const PROGRESS_INTERVAL: u64 = 100_000;

/// Driver errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Totals for one converted file.
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    /// Events decoded and emitted in chronological order
    pub events: u64,
    /// Spills fully decoded
    pub spills: u64,
    /// Spills discarded because of an incomplete dump
    pub spills_dropped: u64,
    /// Wall-clock processing time
    pub elapsed: Duration,
}

/// Converts one NGM byte stream into sorted events.
pub struct Converter {
    reader: SpillReader,
}

impl Converter {
    pub fn new(daq: &DaqConfig) -> Self {
        Self {
            reader: SpillReader::from_config(daq),
        }
    }

    /// Run the conversion loop to the end-of-stream sentinel.
    ///
    /// The sink receives every event of a spill in timestamp order before
    /// the next spill is read; no partial spill ever reaches it.
    pub fn convert<R: Read, S: EventSink>(
        &self,
        src: &mut ByteSource<R>,
        sink: &mut S,
    ) -> Result<ConvertSummary, ConvertError> {
        let start = Instant::now();

        src.skip(FILE_HEADER_BYTES)?;

        let mut events = 0u64;
        let mut spills = 0u64;
        let mut spills_dropped = 0u64;
        let mut next_report = PROGRESS_INTERVAL;

        loop {
            match self.reader.read_spill(src)? {
                SpillStatus::Complete(buffer) => {
                    spills += 1;
                    for event in buffer.into_sorted() {
                        sink.append(event)?;
                        events += 1;
                        if events >= next_report {
                            info!(
                                events,
                                elapsed_s = start.elapsed().as_secs_f64(),
                                "processed events"
                            );
                            next_report += PROGRESS_INTERVAL;
                        }
                    }
                }
                SpillStatus::Incomplete => {
                    spills_dropped += 1;
                    warn!(spill = spills + spills_dropped, "spill discarded");
                }
                SpillStatus::EndOfStream => break,
            }
        }

        let summary = ConvertSummary {
            events,
            spills,
            spills_dropped,
            elapsed: start.elapsed(),
        };
        info!(
            events = summary.events,
            spills = summary.spills,
            spills_dropped = summary.spills_dropped,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "conversion finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::io::Cursor;

    fn push_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn push_file_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[0u8; FILE_HEADER_BYTES as usize]);
    }

    fn push_event(buf: &mut Vec<u8>, channel: u16, timestamp: u64, samples: &[u16]) -> u32 {
        let word0 = ((channel as u32 & 0xfff) << 4) | ((((timestamp >> 32) & 0xffff) as u32) << 16);
        push_u32(buf, word0);
        push_u32(buf, (timestamp & 0xffff_ffff) as u32);
        push_u32(buf, (samples.len() as u32) / 2);
        for pair in samples.chunks(2) {
            push_u32(buf, (pair[0] as u32) | ((pair[1] as u32) << 16));
        }
        3 + samples.len() as u32 / 2
    }

    fn push_sentinel(buf: &mut Vec<u8>) {
        push_u32(buf, 0x0e0f_0e0f);
        for _ in 1..10 {
            push_u32(buf, 0);
        }
    }

    /// One spill, one card, `dumps` = per-channel event lists.
    fn push_spill(buf: &mut Vec<u8>, dumps: &[Vec<(u16, u64)>]) {
        for _ in 0..10 {
            push_u32(buf, 0xabab_abab); // spill header
        }
        push_u32(buf, 0);
        push_u32(buf, 0); // card packet header
        for dump in dumps {
            let mut body = Vec::new();
            let mut words = 0;
            for &(channel, timestamp) in dump {
                words += push_event(&mut body, channel, timestamp, &[]);
            }
            for i in 0..8u32 {
                push_u32(buf, if i == 7 { words } else { 0 });
            }
            buf.extend_from_slice(&body);
        }
    }

    fn source_from(bytes: Vec<u8>) -> ByteSource<Cursor<Vec<u8>>> {
        let len = bytes.len() as u64;
        ByteSource::new(Cursor::new(bytes), len)
    }

    #[test]
    fn test_convert_sorts_across_channels() {
        let mut buf = Vec::new();
        push_file_header(&mut buf);
        push_spill(
            &mut buf,
            &[vec![(0, 30), (0, 10)], vec![(1, 20), (1, 40)]],
        );
        push_sentinel(&mut buf);

        let daq = DaqConfig {
            cards: 1,
            channels_per_card: 2,
        };
        let mut src = source_from(buf);
        let mut sink = MemorySink::new();
        let summary = Converter::new(&daq).convert(&mut src, &mut sink).unwrap();

        assert_eq!(summary.events, 4);
        assert_eq!(summary.spills, 1);
        assert_eq!(summary.spills_dropped, 0);

        let order: Vec<(u16, u64)> = sink
            .events()
            .iter()
            .map(|e| (e.channel_id, e.timestamp))
            .collect();
        assert_eq!(order, vec![(0, 10), (1, 20), (0, 30), (1, 40)]);
    }

    #[test]
    fn test_convert_empty_file() {
        let mut buf = Vec::new();
        push_file_header(&mut buf);
        push_sentinel(&mut buf);

        let daq = DaqConfig::default();
        let mut src = source_from(buf);
        let mut sink = MemorySink::new();
        let summary = Converter::new(&daq).convert(&mut src, &mut sink).unwrap();
        assert_eq!(summary.events, 0);
        assert_eq!(summary.spills, 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_file_shorter_than_header_fails() {
        let daq = DaqConfig::default();
        let mut src = source_from(vec![0u8; 100]);
        let mut sink = MemorySink::new();
        let err = Converter::new(&daq).convert(&mut src, &mut sink).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_spills_sorted_independently() {
        // Events of a later spill may be earlier in time than the previous
        // spill's; ordering is per spill only.
        let mut buf = Vec::new();
        push_file_header(&mut buf);
        push_spill(&mut buf, &[vec![(0, 200), (0, 100)]]);
        push_spill(&mut buf, &[vec![(0, 50), (0, 20)]]);
        push_sentinel(&mut buf);

        let daq = DaqConfig {
            cards: 1,
            channels_per_card: 1,
        };
        let mut src = source_from(buf);
        let mut sink = MemorySink::new();
        let summary = Converter::new(&daq).convert(&mut src, &mut sink).unwrap();

        assert_eq!(summary.spills, 2);
        let timestamps: Vec<u64> = sink.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 20, 50]);
    }
}
