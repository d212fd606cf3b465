//! Lazy iteration over offset-delimited compressed blocks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bzip2::read::BzDecoder;
use tracing::debug;

use crate::types::IngestError;

/// One decompressed, decoded block of dump text.
///
/// Ephemeral: constructed per iteration and meant to be discarded once its
/// records are extracted.
#[derive(Debug)]
pub struct Block {
    /// Byte offset of the compressed block within the dump file.
    pub offset: u64,
    pub text: String,
}

/// Forward-only iterator over the dump's compressed blocks.
///
/// Block `i` spans `[offset[i], offset[i + 1])`; the final block runs to
/// end-of-file. Each block is an independently compressed unit and is
/// inflated standalone, never as a continuation of its predecessor.
///
/// A read that returns zero bytes before the offset list is exhausted means
/// the dump is shorter than the index promises. The stream terminates early
/// rather than erroring; callers must treat a short sequence as a possible
/// partial run (see [`BlockStream::truncated`]). A block that fails to
/// inflate or decode yields `CorruptBlock` for that offset and iteration
/// continues with the next block.
pub struct BlockStream {
    file: File,
    offsets: Vec<u64>,
    next: usize,
    truncated: bool,
}

impl BlockStream {
    /// Opens the dump file against a sorted offset sequence.
    pub fn open(path: impl AsRef<Path>, offsets: Vec<u64>) -> Result<Self, IngestError> {
        let file = File::open(path.as_ref())?;
        Ok(Self {
            file,
            offsets,
            next: 0,
            truncated: false,
        })
    }

    /// True when the stream ended before covering every indexed offset.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn read_block(&mut self) -> Result<Option<Block>, IngestError> {
        if self.next >= self.offsets.len() {
            return Ok(None);
        }

        let offset = self.offsets[self.next];
        self.file.seek(SeekFrom::Start(offset))?;

        let mut raw = Vec::new();
        if let Some(end) = self.offsets.get(self.next + 1) {
            let length = end - offset;
            (&mut self.file).take(length).read_to_end(&mut raw)?;
        } else {
            self.file.read_to_end(&mut raw)?;
        }

        if raw.is_empty() {
            debug!(offset, "zero-byte read before end of index, stopping early");
            self.truncated = true;
            self.next = self.offsets.len();
            return Ok(None);
        }
        self.next += 1;

        // Inflate and decode in one pass; both failure modes are tagged with
        // the block offset so callers can skip just this block.
        let mut text = String::new();
        BzDecoder::new(raw.as_slice())
            .read_to_string(&mut text)
            .map_err(|err| IngestError::CorruptBlock {
                offset,
                reason: err.to_string(),
            })?;

        Ok(Some(Block { offset, text }))
    }
}

impl Iterator for BlockStream {
    type Item = Result<Block, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use tempfile::tempdir;

    fn compress(text: &str) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn write_dump(blocks: &[Vec<u8>]) -> (tempfile::TempDir, std::path::PathBuf, Vec<u64>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.xml.bz2");
        let mut bytes = Vec::new();
        let mut offsets = Vec::new();
        for block in blocks {
            offsets.push(bytes.len() as u64);
            bytes.extend_from_slice(block);
        }
        std::fs::write(&path, bytes).unwrap();
        (dir, path, offsets)
    }

    /// Pads a compressed block with trailing zeros to a fixed size. The
    /// decoder stops at end-of-stream, so padding inside a block's byte range
    /// must not affect its decoded text.
    fn padded(text: &str, size: usize) -> Vec<u8> {
        let mut block = compress(text);
        assert!(block.len() <= size, "fixture text compresses above pad size");
        block.resize(size, 0);
        block
    }

    #[test]
    fn yields_every_block_in_order() {
        let (_dir, path, offsets) =
            write_dump(&[compress("alpha"), compress("beta"), compress("gamma")]);
        let texts: Vec<String> = BlockStream::open(&path, offsets)
            .unwrap()
            .map(|block| block.unwrap().text)
            .collect();
        assert_eq!(texts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn reads_exact_offset_ranges_and_last_block_to_eof() {
        // 300-byte dump with offsets [0, 100, 250]: ranges [0,100), [100,250),
        // [250,300). Padding proves length comes from offset arithmetic.
        let (_dir, path, _) = write_dump(&[
            padded("alpha", 100),
            padded("beta", 150),
            padded("gamma", 50),
        ]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 300);

        let mut stream = BlockStream::open(&path, vec![0, 100, 250]).unwrap();
        let blocks: Vec<Block> = stream.by_ref().map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].text, "alpha");
        assert_eq!(blocks[1].offset, 100);
        assert_eq!(blocks[1].text, "beta");
        assert_eq!(blocks[2].offset, 250);
        assert_eq!(blocks[2].text, "gamma");
        assert!(!stream.truncated());
    }

    #[test]
    fn zero_byte_read_terminates_early() {
        let first = compress("only");
        let end = first.len() as u64;
        let (_dir, path, _) = write_dump(&[first]);

        // The index promises a second block starting exactly at EOF.
        let mut stream = BlockStream::open(&path, vec![0, end]).unwrap();
        let texts: Vec<String> = stream.by_ref().map(|b| b.unwrap().text).collect();
        assert_eq!(texts, vec!["only"]);
        assert!(stream.truncated());
    }

    #[test]
    fn corrupt_block_is_reported_with_offset_and_skipped() {
        let good = compress("good");
        let good_len = good.len() as u64;
        let garbage = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03];
        let garbage_len = garbage.len() as u64;
        let (_dir, path, _) = write_dump(&[good, garbage, compress("after")]);

        let offsets = vec![0, good_len, good_len + garbage_len];
        let results: Vec<Result<Block, IngestError>> =
            BlockStream::open(&path, offsets).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().text, "good");
        match &results[1] {
            Err(IngestError::CorruptBlock { offset, .. }) => assert_eq!(*offset, good_len),
            other => panic!("expected CorruptBlock, got {other:?}"),
        }
        assert_eq!(results[2].as_ref().unwrap().text, "after");
    }

    #[test]
    fn invalid_utf8_block_is_corrupt() {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0xff, 0xfe, 0x80]).unwrap();
        let block = encoder.finish().unwrap();
        let (_dir, path, offsets) = write_dump(&[block]);

        let results: Vec<_> = BlockStream::open(&path, offsets).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(IngestError::CorruptBlock { offset: 0, .. })
        ));
    }

    #[test]
    fn empty_offset_list_yields_nothing() {
        let (_dir, path, _) = write_dump(&[compress("unused")]);
        let mut stream = BlockStream::open(&path, Vec::new()).unwrap();
        assert!(stream.next().is_none());
        assert!(!stream.truncated());
    }
}
