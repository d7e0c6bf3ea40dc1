//! Forward-only byte source with truncation pre-checks
//!
//! The NGM stream is read strictly forward. `ByteSource` wraps any `Read`
//! together with the number of bytes known to remain, and refuses any read
//! that would exceed the input instead of handing back a short buffer. Every
//! decoder above it gets truncation detection for free.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::error::{DecodeError, DecodeResult};

/// Size of one format word in bytes (32-bit).
pub const WORD_SIZE: usize = 4;

/// A forward-readable binary stream with a known total length.
pub struct ByteSource<R> {
    inner: R,
    remaining: u64,
}

impl ByteSource<BufReader<File>> {
    /// Open a file as a byte source, taking its length from metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(BufReader::new(file), len))
    }
}

impl<R: Read> ByteSource<R> {
    /// Wrap a reader with a known total byte length.
    pub fn new(inner: R, total_len: u64) -> Self {
        Self {
            inner,
            remaining: total_len,
        }
    }

    /// Bytes left before the end of the input.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Fill `buf` exactly, or fail with `Truncated` before reading anything
    /// if fewer than `buf.len()` bytes remain.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> DecodeResult<()> {
        let needed = buf.len() as u64;
        if needed > self.remaining {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.remaining,
            });
        }
        self.inner.read_exact(buf)?;
        self.remaining -= needed;
        Ok(())
    }

    /// Read one 32-bit Little-Endian word.
    pub fn read_word(&mut self) -> DecodeResult<u32> {
        let mut buf = [0u8; WORD_SIZE];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read `N` consecutive 32-bit Little-Endian words.
    pub fn read_words<const N: usize>(&mut self) -> DecodeResult<[u32; N]> {
        let mut bytes = [0u8; WORD_SIZE];
        let mut words = [0u32; N];
        // One truncation check up front so a short group never half-reads
        let needed = (N * WORD_SIZE) as u64;
        if needed > self.remaining {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.remaining,
            });
        }
        for word in words.iter_mut() {
            self.inner.read_exact(&mut bytes)?;
            *word = u32::from_le_bytes(bytes);
        }
        self.remaining -= needed;
        Ok(words)
    }

    /// Skip `n` bytes, forward only.
    pub fn skip(&mut self, n: u64) -> DecodeResult<()> {
        if n > self.remaining {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.remaining,
            });
        }
        let copied = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        if copied != n {
            return Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("skip of {} bytes ended after {}", n, copied),
            )));
        }
        self.remaining -= n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source_from(bytes: Vec<u8>) -> ByteSource<Cursor<Vec<u8>>> {
        let len = bytes.len() as u64;
        ByteSource::new(Cursor::new(bytes), len)
    }

    #[test]
    fn test_read_word_little_endian() {
        let mut src = source_from(vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(src.read_word().unwrap(), 0x1234_5678);
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn test_read_words_decrements_remaining() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xaaaa_aaaau32.to_le_bytes());
        bytes.extend_from_slice(&0xbbbb_bbbbu32.to_le_bytes());
        let mut src = source_from(bytes);
        let [a, b] = src.read_words::<2>().unwrap();
        assert_eq!(a, 0xaaaa_aaaa);
        assert_eq!(b, 0xbbbb_bbbb);
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_is_truncation() {
        let mut src = source_from(vec![0u8; 6]);
        let err = src.read_words::<2>().unwrap_err();
        match err {
            DecodeError::Truncated { needed, remaining } => {
                assert_eq!(needed, 8);
                assert_eq!(remaining, 6);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
        // Pre-check means nothing was consumed
        assert_eq!(src.remaining(), 6);
    }

    #[test]
    fn test_skip_forward() {
        let mut src = source_from(vec![1, 2, 3, 4, 0xef, 0xbe, 0xad, 0xde]);
        src.skip(4).unwrap();
        assert_eq!(src.read_word().unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_skip_past_end_is_truncation() {
        let mut src = source_from(vec![0u8; 3]);
        assert!(matches!(
            src.skip(10),
            Err(DecodeError::Truncated {
                needed: 10,
                remaining: 3
            })
        ));
    }
}
