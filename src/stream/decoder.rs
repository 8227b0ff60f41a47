use std::io::{ErrorKind, Read};

use bevy::log::{debug, warn};

use crate::{
    error::{SplatError, SplatResult},
    gaussian::record::SplatRecord,
    io::splat::{SPLAT_RECORD_SIZE, decode_records},
};


/// Records decoded by one call to [`ChunkStreamDecoder::next_batch`], placed at
/// `start..start + records.len()` of the asset.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBatch {
    pub start: usize,
    pub records: Vec<SplatRecord>,
}

impl DecodedBatch {
    pub fn end(&self) -> usize {
        self.start + self.records.len()
    }
}


/// Pulls at most `chunk_size` records per call from a byte stream, strictly in file order.
///
/// A read failure or a stream shorter than its declared length still yields the whole
/// records received so far; the error is returned by the following call.
#[derive(Debug)]
pub struct ChunkStreamDecoder {
    chunk_size: usize,
    declared_count: Option<usize>,
    decoded: usize,
    buffer: Vec<u8>,
    pending_error: Option<SplatError>,
    finished: bool,
}

impl ChunkStreamDecoder {
    pub fn new(chunk_size: usize, declared_count: Option<usize>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            declared_count,
            decoded: 0,
            buffer: Vec::new(),
            pending_error: None,
            finished: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn declared_count(&self) -> Option<usize> {
        self.declared_count
    }

    pub fn decoded_count(&self) -> usize {
        self.decoded
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.pending_error.is_none()
    }

    pub fn next_batch<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> SplatResult<Option<DecodedBatch>> {
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }
        if self.finished {
            return Ok(None);
        }

        let wanted = match self.declared_count {
            Some(declared) => self.chunk_size.min(declared.saturating_sub(self.decoded)),
            None => self.chunk_size,
        };
        if wanted == 0 {
            return self.finish().map(|_| None);
        }

        let wanted_bytes = wanted * SPLAT_RECORD_SIZE;
        let mut end_of_stream = false;

        while self.buffer.len() < wanted_bytes {
            let filled = self.buffer.len();
            self.buffer.resize(wanted_bytes, 0);

            match reader.read(&mut self.buffer[filled..]) {
                Ok(0) => {
                    self.buffer.truncate(filled);
                    end_of_stream = true;
                    break;
                }
                Ok(read) => self.buffer.truncate(filled + read),
                Err(err) if err.kind() == ErrorKind::Interrupted => self.buffer.truncate(filled),
                Err(err) => {
                    self.buffer.truncate(filled);
                    self.pending_error = Some(err.into());
                    end_of_stream = true;
                    break;
                }
            }
        }

        let whole = self.buffer.len() / SPLAT_RECORD_SIZE * SPLAT_RECORD_SIZE;
        let records = decode_records(&self.buffer[..whole]);
        let trailing = self.buffer.len() - whole;
        self.buffer.clear();

        let start = self.decoded;
        self.decoded += records.len();

        if end_of_stream {
            if trailing > 0 && self.pending_error.is_none() {
                warn!("dropping {trailing} trailing bytes of a partial splat record");
            }

            if let Err(error) = self.finish() {
                self.pending_error.get_or_insert(error);
            }
        }

        if records.is_empty() {
            return match self.pending_error.take() {
                Some(error) => Err(error),
                None => Ok(None),
            };
        }

        debug!("decoded splats {}..{}", start, self.decoded);

        Ok(Some(DecodedBatch { start, records }))
    }

    /// Drains the stream, failing on the first error.
    pub fn decode_all<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> SplatResult<Vec<SplatRecord>> {
        let mut records = Vec::with_capacity(self.declared_count.unwrap_or_default());
        while let Some(batch) = self.next_batch(reader)? {
            records.extend(batch.records);
        }
        Ok(records)
    }

    fn finish(&mut self) -> SplatResult<()> {
        self.finished = true;

        if self.decoded == 0 {
            return Err(SplatError::Format(format!(
                "stream is shorter than one {SPLAT_RECORD_SIZE} byte record",
            )));
        }

        match self.declared_count {
            Some(declared) if self.decoded < declared => Err(SplatError::Network(format!(
                "stream ended after {} of {declared} splats",
                self.decoded,
            ))),
            _ => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::io::splat::encode_records;

    fn bytes(count: usize) -> Vec<u8> {
        encode_records(&vec![SplatRecord::default(); count])
    }

    #[test]
    fn batches_are_bounded_and_ordered() {
        let data = bytes(10);
        let mut decoder = ChunkStreamDecoder::new(4, Some(10));
        let mut reader = Cursor::new(data);

        let mut starts = Vec::new();
        while let Some(batch) = decoder.next_batch(&mut reader).unwrap() {
            assert!(batch.records.len() <= 4);
            starts.push((batch.start, batch.end()));
        }

        assert_eq!(starts, vec![(0, 4), (4, 8), (8, 10)]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn short_stream_keeps_prefix_then_fails() {
        let data = bytes(3);
        let mut decoder = ChunkStreamDecoder::new(2, Some(5));
        let mut reader = Cursor::new(data);

        assert_eq!(decoder.next_batch(&mut reader).unwrap().unwrap().records.len(), 2);
        assert_eq!(decoder.next_batch(&mut reader).unwrap().unwrap().records.len(), 1);
        assert!(matches!(decoder.next_batch(&mut reader), Err(SplatError::Network(_))));
        assert_eq!(decoder.decoded_count(), 3);
    }

    #[test]
    fn undeclared_length_discovers_count() {
        let mut data = bytes(7);
        data.extend([1, 2, 3]);

        let mut decoder = ChunkStreamDecoder::new(3, None);
        let records = decoder.decode_all(&mut Cursor::new(data)).unwrap();

        assert_eq!(records.len(), 7);
    }

    #[test]
    fn empty_stream_is_format_error() {
        let mut decoder = ChunkStreamDecoder::new(3, None);
        let result = decoder.next_batch(&mut Cursor::new(vec![0u8; 31]));

        assert!(matches!(result, Err(SplatError::Format(_))));
    }
}
