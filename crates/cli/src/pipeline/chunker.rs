//! Input chunking.

use bytes::Bytes;
use contracts::Chunk;

/// Split `data` into content-addressed chunks of at most `chunk_size` bytes
///
/// Chunks share the input buffer. Empty input yields no chunks.
pub fn split_into_chunks(data: Bytes, chunk_size: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size));
    let mut offset = 0;

    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        chunks.push(Chunk::from_content(data.slice(offset..end)));
        offset = end;
    }

    chunks
}
