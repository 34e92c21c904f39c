use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::TransferError;

/// One fixed-size piece of a file, the unit of multipart transfer.
///
/// Part numbers are 1-based and contiguous in read order. The buffer is
/// owned exclusively by whoever holds the chunk for the duration of one PUT.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based ordinal, matching the multipart part number.
    pub part_number: u64,
    /// Raw chunk bytes. Only the final chunk may be shorter than the
    /// configured chunk size.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Authoritative chunk count for a file: `ceil(total_size / chunk_size)`.
///
/// A zero-length file still produces exactly one (empty) chunk. Use this for
/// progress reporting only; the protocol loop is bounded by what
/// [`ChunkReader`] actually yields, never by a precomputed estimate.
pub fn expected_chunks(total_size: u64, chunk_size: usize) -> u64 {
    if total_size == 0 {
        return 1;
    }
    total_size.div_ceil(chunk_size as u64)
}

/// Reads a file as a lazy, finite, forward-only sequence of [`Chunk`]s.
///
/// Never loads the whole file into memory and never caches: consuming the
/// sequence again means constructing a new reader and paying the I/O again.
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    file_size: u64,
    next_part: u64,
    done: bool,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`crate::DEFAULT_CHUNK_SIZE`] is used. Fails
    /// with [`TransferError::FileNotFound`] when the path does not exist or
    /// cannot be opened for reading.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = File::open(path)
            .map_err(|_| TransferError::FileNotFound(path.display().to_string()))?;
        let file_size = file.metadata()?.len();
        let chunk_size = if chunk_size == 0 {
            crate::DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            file_size,
            next_part: 1,
            done: false,
        })
    }

    /// Total file size in bytes, as observed at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Configured chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Reads the next chunk. Returns `None` once the file is exhausted.
    ///
    /// An empty file yields exactly one zero-length chunk before `None`, so
    /// an empty object still produces one uploadable part.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.done {
            return Ok(None);
        }

        let mut data = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < data.len() {
            let n = self.file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);

        if filled == 0 && self.next_part > 1 {
            self.done = true;
            return Ok(None);
        }
        if filled < self.chunk_size {
            // Short read means EOF; nothing left for a further part.
            self.done = true;
        }

        let chunk = Chunk {
            part_number: self.next_part,
            data,
        };
        self.next_part += 1;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    fn read_all(reader: &mut ChunkReader) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn yields_ordered_contiguous_parts() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "t.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        let chunks = read_all(&mut reader);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].part_number, 1);
        assert_eq!(&chunks[0].data, b"AABB");
        assert_eq!(chunks[1].part_number, 2);
        assert_eq!(&chunks[1].data, b"CCDD");
        assert_eq!(chunks[2].part_number, 3);
        assert_eq!(&chunks[2].data, b"EE");
    }

    #[test]
    fn concatenation_round_trips_bytes() {
        let dir = TempDir::new().unwrap();
        let original: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let path = create_test_file(dir.path(), "t.bin", &original);

        let mut reader = ChunkReader::new(&path, 64).unwrap();
        let mut rebuilt = Vec::new();
        for chunk in read_all(&mut reader) {
            rebuilt.extend_from_slice(&chunk.data);
        }
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "t.bin", &[7u8; 12]);

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        let chunks = read_all(&mut reader);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 4));
    }

    #[test]
    fn half_chunk_tail() {
        // 2.5 chunk sizes: lengths [c, c, c/2].
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "t.bin", &[1u8; 10]);

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        let lens: Vec<usize> = read_all(&mut reader).iter().map(Chunk::len).collect();
        assert_eq!(lens, vec![4, 4, 2]);
    }

    #[test]
    fn empty_file_yields_one_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "t.bin", b"");

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        let chunks = read_all(&mut reader);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].part_number, 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ChunkReader::new(&dir.path().join("absent.bin"), 4).unwrap_err();
        assert!(matches!(err, TransferError::FileNotFound(_)));
    }

    #[test]
    fn zero_chunk_size_uses_default() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "t.bin", b"x");
        let reader = ChunkReader::new(&path, 0).unwrap();
        assert_eq!(reader.chunk_size(), crate::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn expected_chunks_is_ceiling() {
        assert_eq!(expected_chunks(0, 4), 1);
        assert_eq!(expected_chunks(1, 4), 1);
        assert_eq!(expected_chunks(4, 4), 1);
        assert_eq!(expected_chunks(5, 4), 2);
        assert_eq!(expected_chunks(8, 4), 2);
        assert_eq!(expected_chunks(10, 4), 3);
    }

    #[test]
    fn expected_chunks_matches_actual_yield_count() {
        let dir = TempDir::new().unwrap();
        for size in [0usize, 1, 3, 4, 5, 8, 10, 13] {
            let path = create_test_file(dir.path(), &format!("f{size}.bin"), &vec![0u8; size]);
            let mut reader = ChunkReader::new(&path, 4).unwrap();
            let actual = read_all(&mut reader).len() as u64;
            assert_eq!(actual, expected_chunks(size as u64, 4), "size {size}");
        }
    }
}
