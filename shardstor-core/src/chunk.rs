//! Fixed-size chunking
//!
//! Chunks are the unit of the transform pipeline. A [`Chunker`] is a lazy
//! cursor over either an in-memory byte slice or a streaming reader; both
//! produce chunks of exactly `chunk_size` bytes except the last one, which
//! may be shorter. An empty input yields no chunks at all.
//!
//! The slice returned by [`Chunker::value`] borrows the cursor. It is only
//! valid until the next call to [`Chunker::advance`], which lets the
//! streaming variant reuse a single buffer for every chunk.

use crate::error::{Result, ShardStorError};
use std::io::{ErrorKind, Read};
use std::ops::Range;

/// Number of chunks needed to cover `len` bytes
pub fn chunk_count(len: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

enum Source<'a> {
    Slice {
        data: &'a [u8],
        current: Range<usize>,
    },
    Reader {
        reader: Box<dyn Read + 'a>,
        buf: Vec<u8>,
        filled: usize,
        exhausted: bool,
    },
}

/// Cursor over the fixed-size chunks of an input
///
/// Single-threaded by contract.
pub struct Chunker<'a> {
    chunk_size: usize,
    source: Source<'a>,
    index: Option<usize>,
}

impl<'a> Chunker<'a> {
    /// Chunk an in-memory byte slice. Chunks are sub-slices of `data`.
    pub fn from_slice(data: &'a [u8], chunk_size: usize) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            chunk_size,
            source: Source::Slice {
                data,
                current: 0..0,
            },
            index: None,
        })
    }

    /// Chunk a streaming reader through an internal buffer of `chunk_size` bytes
    pub fn from_reader<R: Read + 'a>(reader: R, chunk_size: usize) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            chunk_size,
            source: Source::Reader {
                reader: Box::new(reader),
                buf: vec![0u8; chunk_size],
                filled: 0,
                exhausted: false,
            },
            index: None,
        })
    }

    /// Configured chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Move to the next chunk. Returns `false` once the input is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        let chunk_size = self.chunk_size;
        let has_chunk = match &mut self.source {
            Source::Slice { data, current } => {
                let start = current.end;
                if start >= data.len() {
                    *current = start..start;
                    false
                } else {
                    let end = (start + chunk_size).min(data.len());
                    *current = start..end;
                    true
                }
            }
            Source::Reader {
                reader,
                buf,
                filled,
                exhausted,
            } => {
                *filled = 0;
                if *exhausted {
                    false
                } else {
                    *filled = fill_buffer(reader.as_mut(), buf)?;
                    if *filled < chunk_size {
                        *exhausted = true;
                    }
                    *filled > 0
                }
            }
        };

        if has_chunk {
            self.index = Some(self.index.map_or(0, |i| i + 1));
        }
        Ok(has_chunk)
    }

    /// Current chunk. Empty before the first `advance` and after exhaustion.
    pub fn value(&self) -> &[u8] {
        match &self.source {
            Source::Slice { data, current } => &data[current.clone()],
            Source::Reader { buf, filled, .. } => &buf[..*filled],
        }
    }

    /// Ordinal of the current chunk
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(ShardStorError::InvalidConfig(
            "chunk_size must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Read until `buf` is full or the reader hits end-of-stream.
fn fill_buffer<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(mut chunker: Chunker<'_>) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        while chunker.advance().unwrap() {
            chunks.push(chunker.value().to_vec());
        }
        chunks
    }

    /// Reader that hands out at most `step` bytes per call
    struct TrickleReader {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_chunk_even() {
        let data = vec![0u8; 100];
        let chunks = collect(Chunker::from_slice(&data, 10).unwrap());
        assert_eq!(chunks.len(), 10);
        assert!(chunks.iter().all(|c| c.len() == 10));
    }

    #[test]
    fn test_chunk_odd() {
        let data = vec![0u8; 99];
        let chunks = collect(Chunker::from_slice(&data, 10).unwrap());
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![10, 10, 10, 10, 10, 10, 10, 10, 10, 9]);
    }

    #[test]
    fn test_empty_input() {
        assert!(collect(Chunker::from_slice(&[], 10).unwrap()).is_empty());
        assert!(collect(Chunker::from_reader(std::io::empty(), 10).unwrap()).is_empty());
    }

    #[test]
    fn test_zero_chunk_size() {
        assert!(matches!(
            Chunker::from_slice(b"abc", 0),
            Err(ShardStorError::InvalidConfig(_))
        ));
        assert!(matches!(
            Chunker::from_reader(std::io::empty(), 0),
            Err(ShardStorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reader_short_reads_do_not_split_chunks() {
        let data: Vec<u8> = (0..95u8).collect();
        let reader = TrickleReader {
            data: data.clone(),
            pos: 0,
            step: 3,
        };
        let chunks = collect(Chunker::from_reader(reader, 10).unwrap());
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[9].len(), 5);
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn test_reader_exact_multiple() {
        let data = vec![7u8; 40];
        let chunks = collect(Chunker::from_reader(&data[..], 10).unwrap());
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_index_tracks_position() {
        let data = vec![1u8; 25];
        let mut chunker = Chunker::from_slice(&data, 10).unwrap();
        assert_eq!(chunker.index(), None);
        assert!(chunker.value().is_empty());
        chunker.advance().unwrap();
        assert_eq!(chunker.index(), Some(0));
        chunker.advance().unwrap();
        chunker.advance().unwrap();
        assert_eq!(chunker.index(), Some(2));
        assert!(!chunker.advance().unwrap());
        assert!(chunker.value().is_empty());
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 10), 0);
        assert_eq!(chunk_count(99, 10), 10);
        assert_eq!(chunk_count(100, 10), 10);
        assert_eq!(chunk_count(101, 10), 11);
    }

    proptest! {
        #[test]
        fn prop_chunker_coverage(data in proptest::collection::vec(any::<u8>(), 0..2048), size in 1usize..300) {
            for chunks in [
                collect(Chunker::from_slice(&data, size).unwrap()),
                collect(Chunker::from_reader(&data[..], size).unwrap()),
            ] {
                prop_assert_eq!(chunks.len() as u64, chunk_count(data.len() as u64, size as u64));
                if let Some((last, rest)) = chunks.split_last() {
                    prop_assert!(rest.iter().all(|c| c.len() == size));
                    prop_assert!(!last.is_empty() && last.len() <= size);
                }
                prop_assert_eq!(chunks.concat(), data.clone());
            }
        }
    }
}
