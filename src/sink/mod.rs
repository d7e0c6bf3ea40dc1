//! Output sinks for decoded events
//!
//! The converter only needs `append`; chronological order is already final
//! when events arrive here, so a sink merely preserves insertion order.
//!
//! File structure:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Magic (8 bytes) + version (u32 LE)     │
//! ├─────────────────────────────────────────┤
//! │  Event 1: length prefix (u32 LE)        │
//! │           MsgPack serialized SisEvent   │
//! ├─────────────────────────────────────────┤
//! │  ...                                    │
//! ├─────────────────────────────────────────┤
//! │  Footer sentinel (u32 0xFFFFFFFF)       │
//! │  Footer: magic, event count, data bytes,│
//! │          xxh64 checksum                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The footer lets a reader distinguish a complete file from one cut short
//! by a crash.

use std::io::{Read, Write};

use thiserror::Error;
use xxhash_rust::xxh64::Xxh64;

use crate::decoder::SisEvent;

/// Magic bytes for converted event files
pub const FILE_MAGIC: [u8; 8] = *b"SIS3316E";

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Footer magic bytes (different from header to detect truncation)
pub const FOOTER_MAGIC: [u8; 8] = *b"SISEND01";

/// Length-prefix value that marks the footer instead of an event
const FOOTER_SENTINEL: u32 = 0xffff_ffff;

/// Sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Invalid file magic")]
    InvalidMagic,

    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("File incomplete: {0}")]
    Incomplete(String),

    #[error("Checksum mismatch: stored {stored:016x}, computed {computed:016x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("Event count mismatch: footer says {stored}, read {read}")]
    CountMismatch { stored: u64, read: u64 },
}

/// Anything that can accept decoded events in their final order.
pub trait EventSink {
    fn append(&mut self, event: SisEvent) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// Memory sink
// ---------------------------------------------------------------------------

/// Collects events in memory; the sink used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<SisEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SisEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SisEvent> {
        self.events
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, event: SisEvent) -> Result<(), SinkError> {
        self.events.push(event);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File sink
// ---------------------------------------------------------------------------

/// Writes length-prefixed MessagePack events with a checksummed footer.
pub struct FileSink<W: Write> {
    writer: W,
    checksum: Xxh64,
    data_bytes: u64,
    total_events: u64,
}

impl<W: Write> FileSink<W> {
    /// Create a sink, writing the file header immediately.
    pub fn new(mut writer: W) -> Result<Self, SinkError> {
        writer.write_all(&FILE_MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        Ok(Self {
            writer,
            checksum: Xxh64::new(0),
            data_bytes: 0,
            total_events: 0,
        })
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Write the footer and flush, returning the inner writer.
    pub fn finish(mut self) -> Result<W, SinkError> {
        self.writer.write_all(&FOOTER_SENTINEL.to_le_bytes())?;
        self.writer.write_all(&FOOTER_MAGIC)?;
        self.writer.write_all(&self.total_events.to_le_bytes())?;
        self.writer.write_all(&self.data_bytes.to_le_bytes())?;
        self.writer.write_all(&self.checksum.digest().to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> EventSink for FileSink<W> {
    fn append(&mut self, event: SisEvent) -> Result<(), SinkError> {
        let data = rmp_serde::to_vec(&event)?;
        let len_bytes = (data.len() as u32).to_le_bytes();

        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(&data)?;

        self.checksum.update(&len_bytes);
        self.checksum.update(&data);
        self.data_bytes += (len_bytes.len() + data.len()) as u64;
        self.total_events += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File reader
// ---------------------------------------------------------------------------

/// Reads back a converted event file in insertion order, verifying the
/// footer checksum along the way.
pub struct FileReader<R: Read> {
    reader: R,
    checksum: Xxh64,
    events_read: u64,
    done: bool,
}

impl<R: Read> FileReader<R> {
    /// Open a reader, validating the file header.
    pub fn new(mut reader: R) -> Result<Self, SinkError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != FILE_MAGIC {
            return Err(SinkError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != FORMAT_VERSION {
            return Err(SinkError::UnsupportedVersion(version));
        }

        Ok(Self {
            reader,
            checksum: Xxh64::new(0),
            events_read: 0,
            done: false,
        })
    }

    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Next event in insertion order, or `None` once the verified footer is
    /// reached. A file that ends without a footer reports `Incomplete`.
    pub fn next_event(&mut self) -> Result<Option<SisEvent>, SinkError> {
        if self.done {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        if let Err(err) = self.reader.read_exact(&mut len_bytes) {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(SinkError::Incomplete("missing footer".to_string()));
            }
            return Err(err.into());
        }

        let len = u32::from_le_bytes(len_bytes);
        if len == FOOTER_SENTINEL {
            self.verify_footer()?;
            self.done = true;
            return Ok(None);
        }

        let mut data = vec![0u8; len as usize];
        if let Err(err) = self.reader.read_exact(&mut data) {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(SinkError::Incomplete("event cut short".to_string()));
            }
            return Err(err.into());
        }

        self.checksum.update(&len_bytes);
        self.checksum.update(&data);
        self.events_read += 1;

        Ok(Some(rmp_serde::from_slice(&data)?))
    }

    /// Collect every remaining event, verifying the footer at the end.
    pub fn read_all(mut self) -> Result<Vec<SisEvent>, SinkError> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    fn verify_footer(&mut self) -> Result<(), SinkError> {
        let mut footer = [0u8; 32];
        if self.reader.read_exact(&mut footer).is_err() {
            return Err(SinkError::Incomplete("footer cut short".to_string()));
        }

        if footer[0..8] != FOOTER_MAGIC {
            return Err(SinkError::Incomplete("bad footer magic".to_string()));
        }

        let stored_events = u64::from_le_bytes(footer[8..16].try_into().unwrap());
        let stored_checksum = u64::from_le_bytes(footer[24..32].try_into().unwrap());

        if stored_events != self.events_read {
            return Err(SinkError::CountMismatch {
                stored: stored_events,
                read: self.events_read,
            });
        }

        let computed = self.checksum.digest();
        if stored_checksum != computed {
            return Err(SinkError::ChecksumMismatch {
                stored: stored_checksum,
                computed,
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
