//! Brotli compression support.

/// Reads a sequence of byte chunks as a single stream.
struct ChunkReader<'a> {
    chunks: &'a [&'a [u8]],
    chunk_idx: usize,
    pos_in_chunk: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(chunks: &'a [&'a [u8]]) -> Self {
        Self {
            chunks,
            chunk_idx: 0,
            pos_in_chunk: 0,
        }
    }

    fn read_chunk<'data>(
        remaining: &[u8],
        data: &'data mut [u8],
    ) -> (usize, Option<&'data mut [u8]>) {
        if remaining.len() < data.len() {
            let (head, tail) = data.split_at_mut(remaining.len());
            head.copy_from_slice(remaining);
            // Continue reading from the next chunk
            (remaining.len(), Some(tail))
        } else {
            data.copy_from_slice(&remaining[..data.len()]);
            (data.len(), None)
        }
    }
}

impl brotli::CustomRead<()> for ChunkReader<'_> {
    fn read(&mut self, mut data: &mut [u8]) -> Result<usize, ()> {
        let mut total_read = 0;
        loop {
            let Some(chunk) = self.chunks.get(self.chunk_idx) else {
                return Ok(total_read); // nothing left to read
            };

            let (read, remaining_data) = Self::read_chunk(&chunk[self.pos_in_chunk..], data);
            total_read += read;

            if let Some(remaining_data) = remaining_data {
                // Move to the next chunk
                self.chunk_idx += 1;
                self.pos_in_chunk = 0;
                data = remaining_data;
            } else {
                // Run out of the output buffer
                self.pos_in_chunk += read;
                debug_assert!(self.pos_in_chunk <= chunk.len());
                return Ok(total_read);
            }
        }
    }
}

#[derive(Default)]
struct Buffer(Vec<u8>);

impl brotli::CustomWrite<()> for Buffer {
    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        self.0.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct BoxedSlice<T>(Box<[T]>);

impl<T> Default for BoxedSlice<T> {
    fn default() -> Self {
        Self(Box::default())
    }
}

impl<T> brotli::SliceWrapper<T> for BoxedSlice<T> {
    fn slice(&self) -> &[T] {
        self.0.as_ref()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T> brotli::SliceWrapperMut<T> for BoxedSlice<T> {
    fn slice_mut(&mut self) -> &mut [T] {
        self.0.as_mut()
    }
}

#[derive(Debug)]
struct GlobalAlloc;

impl<T: Clone + Default> brotli::enc::Allocator<T> for GlobalAlloc {
    type AllocatedMemory = BoxedSlice<T>;

    fn alloc_cell(&mut self, len: usize) -> Self::AllocatedMemory {
        BoxedSlice(vec![T::default(); len].into())
    }

    fn free_cell(&mut self, data: Self::AllocatedMemory) {
        drop(data);
    }
}

impl brotli::enc::BrotliAlloc for GlobalAlloc {}

/// Compresses concatenated `chunks` into a single Brotli stream with the specified quality (0..=11).
pub(super) fn compress(chunks: &[&[u8]], quality: u8) -> Vec<u8> {
    let params = brotli::enc::BrotliEncoderParams {
        quality: i32::from(quality.min(11)),
        mode: brotli::enc::backward_references::BrotliEncoderMode::BROTLI_MODE_FONT,
        ..brotli::enc::BrotliEncoderParams::default()
    };

    let mut buffer = Buffer::default();
    let result = brotli::BrotliCompressCustomIo(
        &mut ChunkReader::new(chunks),
        &mut buffer,
        &mut [0_u8; 4_096],
        &mut [0_u8; 4_096],
        &params,
        GlobalAlloc,
        &mut |_, _, _, _| { /* do nothing */ },
        (),
    );
    if result.is_err() {
        // Neither the reader nor the writer ever return errors.
        log::error!("unexpected Brotli compression error");
    }
    buffer.0
}

#[cfg(test)]
mod tests {
    use brotli::CustomRead;
    use test_casing::test_casing;

    use super::*;
    use crate::{tests::TestFont, FontContainer};

    #[test_casing(5, [1, 10, 100, 1000, 100_000])]
    fn chunk_reader_works_as_expected(chunk_size: usize) {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let tables: Vec<_> = container.iter().map(|(_, data)| data).collect();
        let mut data_reader = ChunkReader::new(&tables);
        let mut buffer = vec![0; 100_000];

        let read = buffer
            .chunks_mut(chunk_size)
            .map(|chunk| data_reader.read(chunk).unwrap())
            .sum::<usize>();
        let expected = tables.concat();
        assert_eq!(read, expected.len());
        assert_eq!(buffer[..read], expected);
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let chunks: [&[u8]; 4] = [&[], &[1, 2], &[], &[3]];
        let mut data_reader = ChunkReader::new(&chunks);
        let mut buffer = [0; 8];
        assert_eq!(data_reader.read(&mut buffer).unwrap(), 3);
        assert_eq!(buffer[..3], [1, 2, 3]);
        assert_eq!(data_reader.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn compression_shrinks_repetitive_data() {
        let data = vec![42_u8; 10_000];
        for (quality, max_len) in [(0, 500), (5, 100), (11, 100)] {
            let compressed = compress(&[&data[..5_000], &data[5_000..]], quality);
            assert!(!compressed.is_empty());
            assert!(compressed.len() < max_len, "{}", compressed.len());
        }
    }
}
