use std::io::{self, Write};

use crate::compress::{BlockCodec, Snappy};
use crate::frame::chunk::{data_chunk_prefix, ChunkType, FrameError};
use crate::frame::{Logger, MAX_BLOCK_SIZE, STREAM_IDENTIFIER};
use crate::hash::checksum;

/// Compressing `Write` adapter producing a snappy framed stream.
///
/// Bytes are buffered until a full [`MAX_BLOCK_SIZE`] block is available, the tail
/// goes out on [`flush`](Write::flush) or [`close`](Writer::close). Nothing is
/// written on drop, callers must flush.
///
/// Any sink or encode error leaves the stream in an unknown state (part of a chunk
/// may already be on the wire), so the Writer refuses all later calls with
/// [`FrameError::Poisoned`].
pub struct Writer<W: Write, C: BlockCodec = Snappy> {
    inner: W,
    codec: C,
    // Bytes not yet framed, always shorter than one block between calls
    raw: Vec<u8>,
    // Compression output, sized for the worst case of a full block
    compr: Vec<u8>,
    poisoned: bool,
    logger: Option<Logger>,
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W) -> Result<Self, FrameError> {
        Writer::with_codec(writer, Snappy::new())
    }
}

// This is the high level writer interface
impl<W: Write, C: BlockCodec> Writer<W, C> {
    /// Writes the stream identifier, failing if the sink refuses it.
    pub fn with_codec(mut writer: W, codec: C) -> Result<Self, FrameError> {
        writer.write_all(&STREAM_IDENTIFIER)?;

        let compr = vec![0; codec.max_compressed_len(MAX_BLOCK_SIZE)];
        Ok(Writer {
            inner: writer,
            codec,
            raw: Vec::with_capacity(MAX_BLOCK_SIZE),
            compr,
            poisoned: false,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Flushes pending data then hands back the sink, which is left open.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    /// Same as `flush`, the sink's lifecycle stays with the caller.
    pub fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    // Runs `op` unless already poisoned, poisoning on failure
    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, FrameError>,
    ) -> Result<T, FrameError> {
        if self.poisoned {
            return Err(FrameError::Poisoned);
        }

        let res = op(self);
        if res.is_err() {
            self.poisoned = true;
        }
        res
    }

    fn write_blocks(&mut self, mut data: &[u8]) -> Result<(), FrameError> {
        // Top up a partially filled block first
        if !self.raw.is_empty() {
            let take = (MAX_BLOCK_SIZE - self.raw.len()).min(data.len());
            self.raw.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.raw.len() < MAX_BLOCK_SIZE {
                return Ok(());
            }
            self.flush_raw()?;
        }

        // Full blocks go straight from the caller's slice
        while data.len() >= MAX_BLOCK_SIZE {
            let (block, rest) = data.split_at(MAX_BLOCK_SIZE);
            write_data_chunk(
                &mut self.inner,
                &mut self.codec,
                &mut self.compr,
                block,
                self.logger,
            )?;
            data = rest;
        }

        self.raw.extend_from_slice(data);
        Ok(())
    }

    fn flush_raw(&mut self) -> Result<(), FrameError> {
        if self.raw.is_empty() {
            return Ok(());
        }

        write_data_chunk(
            &mut self.inner,
            &mut self.codec,
            &mut self.compr,
            &self.raw,
            self.logger,
        )?;
        self.raw.clear();
        Ok(())
    }
}

impl<W: Write, C: BlockCodec> Write for Writer<W, C> {
    /// Always accepts the whole of `buf`, framing every full block it completes.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guarded(|w| w.write_blocks(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guarded(|w| {
            w.flush_raw()?;
            Ok(w.inner.flush()?)
        })?;
        Ok(())
    }
}

// Frame one block as a data chunk, stored raw when compression doesn't shrink it.
fn write_data_chunk<W: Write, C: BlockCodec>(
    inner: &mut W,
    codec: &mut C,
    compr: &mut [u8],
    raw: &[u8],
    logger: Option<Logger>,
) -> Result<(), FrameError> {
    if raw.len() > MAX_BLOCK_SIZE {
        return Err(FrameError::ChunkTooLarge {
            length: raw.len(),
            max: MAX_BLOCK_SIZE,
        });
    }

    let sum = checksum(raw);
    let compr_len = codec.compress(raw, compr)?;

    let (typ, body) = if compr_len < raw.len() {
        (ChunkType::CompressedData, &compr[..compr_len])
    } else {
        (ChunkType::UncompressedData, raw)
    };

    let prefix = data_chunk_prefix(typ, body.len(), sum)?;
    inner.write_all(&prefix)?;
    inner.write_all(body)?;

    chunk_log!(
        logger,
        log::Level::Trace,
        "{:?}: raw {} body {} checksum {:#010x}",
        typ,
        raw.len(),
        body.len(),
        sum
    );

    Ok(())
}

#[cfg(test)]
mod test_writer {
    use super::*;
    use crate::compress::CodecError;
    use crate::frame::{frame_error, Capture, CHECKSUM_LEN, CHUNK_HEADER_LEN};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;

    fn random_data(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(0x5eed).fill(&mut data[..]);
        data
    }

    fn snappy(data: &[u8]) -> Vec<u8> {
        snap::raw::Encoder::new().compress_vec(data).unwrap()
    }

    // Walk the chunks after the identifier, returning (type, length) pairs
    fn chunks(stream: &[u8]) -> Vec<(u8, usize)> {
        assert_eq!(&stream[..STREAM_IDENTIFIER.len()], &STREAM_IDENTIFIER);

        let mut ret = vec![];
        let mut rest = &stream[STREAM_IDENTIFIER.len()..];
        while !rest.is_empty() {
            let len = rest[1] as usize | (rest[2] as usize) << 8 | (rest[3] as usize) << 16;
            ret.push((rest[0], len));
            rest = &rest[CHUNK_HEADER_LEN + len..];
        }
        ret
    }

    #[test]
    fn identifier_on_creation() {
        let writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        assert_eq!(writer.get_ref().get_ref(), &STREAM_IDENTIFIER);
    }

    #[test]
    fn identifier_write_failure() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        match Writer::new(Broken) {
            Err(FrameError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            Err(x) => panic!("Unexpected: {:?}", x),
            Ok(_) => panic!("Writer created on a broken sink"),
        }
    }

    #[test]
    fn fifty_zeros() {
        let data = [0u8; 50];

        let mut writer = Writer::new(Vec::new()).unwrap();
        assert_eq!(writer.write(&data).unwrap(), 50);
        writer.flush().unwrap();

        let compressed = snappy(&data);
        let mut awaited = b"\xff\x06\x00\x00sNaPpY".to_vec();
        awaited.extend_from_slice(&[0x00, compressed.len() as u8 + 4, 0x00, 0x00]);
        awaited.extend_from_slice(b"\x8f)H\xbd");
        awaited.extend_from_slice(&compressed);

        assert_eq!(writer.into_inner().unwrap(), awaited);
    }

    #[test]
    fn fifty_zeros_compressed_length() {
        let mut writer = Writer::new(Vec::new()).unwrap();
        writer.write_all(&[0u8; 50]).unwrap();

        let stream = writer.into_inner().unwrap();
        assert_eq!(&stream[10..14], b"\x00\x0a\x00\x00");
    }

    #[test]
    fn incompressible_stored() {
        let data: Vec<u8> = (0..50).collect();

        let mut writer = Writer::new(Vec::new()).unwrap();
        writer.write_all(&data).unwrap();
        writer.flush().unwrap();

        let mut awaited = STREAM_IDENTIFIER.to_vec();
        awaited.extend_from_slice(&[0x01, 0x36, 0x00, 0x00, 116, 22, 50, 22]);
        awaited.extend_from_slice(&data);

        assert_eq!(writer.into_inner().unwrap(), awaited);
    }

    #[test]
    fn empty_flush_is_noop() {
        let mut writer = Writer::new(Vec::new()).unwrap();
        writer.write_all(&[]).unwrap();
        writer.flush().unwrap();
        writer.close().unwrap();

        assert_eq!(writer.into_inner().unwrap(), STREAM_IDENTIFIER);
    }

    #[test]
    fn buffered_until_flush() {
        let mut writer = Writer::new(Vec::new()).unwrap();
        writer.write_all(b"Hello World!!!!!").unwrap();
        assert_eq!(writer.get_ref().len(), STREAM_IDENTIFIER.len());

        writer.flush().unwrap();
        assert!(writer.get_ref().len() > STREAM_IDENTIFIER.len());
    }

    #[test]
    fn full_block_emitted_without_flush() {
        let data = random_data(MAX_BLOCK_SIZE + 10);

        let mut writer = Writer::new(Vec::new()).unwrap();
        assert_eq!(writer.write(&data).unwrap(), data.len());

        // One full block out, 10 bytes still pending
        assert_eq!(
            chunks(writer.get_ref()),
            vec![(0x01, MAX_BLOCK_SIZE + CHECKSUM_LEN)]
        );

        let stream = writer.into_inner().unwrap();
        assert_eq!(
            chunks(&stream),
            vec![(0x01, MAX_BLOCK_SIZE + CHECKSUM_LEN), (0x01, 10 + CHECKSUM_LEN)]
        );
    }

    #[test]
    fn small_writes_fill_blocks() {
        let data = random_data(MAX_BLOCK_SIZE * 2 + 7);

        let mut writer = Writer::new(Vec::new()).unwrap();
        for piece in data.chunks(1000) {
            writer.write_all(piece).unwrap();
        }
        let stream = writer.into_inner().unwrap();

        assert_eq!(
            chunks(&stream),
            vec![
                (0x01, MAX_BLOCK_SIZE + CHECKSUM_LEN),
                (0x01, MAX_BLOCK_SIZE + CHECKSUM_LEN),
                (0x01, 7 + CHECKSUM_LEN),
            ]
        );

        // Bodies are the input verbatim, in order
        let mut bodies = vec![];
        let mut rest = &stream[STREAM_IDENTIFIER.len()..];
        for (_, len) in chunks(&stream) {
            bodies.extend_from_slice(&rest[CHUNK_HEADER_LEN + CHECKSUM_LEN..CHUNK_HEADER_LEN + len]);
            rest = &rest[CHUNK_HEADER_LEN + len..];
        }
        assert_eq!(bodies, data);
    }

    #[test]
    fn never_inflates() {
        let mut data = random_data(MAX_BLOCK_SIZE);
        // Half compressible, half noise
        data[..MAX_BLOCK_SIZE / 2].fill(b'a');

        for block in [&data[..], &data[MAX_BLOCK_SIZE / 2..], &data[..1], &data[..17]] {
            let mut writer = Writer::new(Vec::new()).unwrap();
            writer.write_all(block).unwrap();
            let stream = writer.into_inner().unwrap();

            let wire = stream.len() - STREAM_IDENTIFIER.len();
            assert!(wire <= CHUNK_HEADER_LEN + CHECKSUM_LEN + block.len());
        }
    }

    #[test]
    fn oversized_block_rejected() {
        let raw = vec![0u8; MAX_BLOCK_SIZE + 1];
        let mut codec = Snappy::new();
        let mut compr = vec![0; codec.max_compressed_len(raw.len())];
        let mut sink = Vec::new();

        let res = write_data_chunk(&mut sink, &mut codec, &mut compr, &raw, None);
        assert!(matches!(res, Err(FrameError::ChunkTooLarge { .. })));
        assert!(sink.is_empty());
    }

    #[test]
    fn single_chunk_on_the_wire() {
        let raw = [0u8; 50];
        let mut codec = Snappy::new();
        let mut compr = vec![0; codec.max_compressed_len(raw.len())];
        let mut sink = Vec::new();

        write_data_chunk(&mut sink, &mut codec, &mut compr, &raw, None).unwrap();

        let body = snappy(&raw);
        assert_eq!(sink.len(), CHUNK_HEADER_LEN + CHECKSUM_LEN + body.len());
        assert_eq!(sink[0], u8::from(ChunkType::CompressedData));
        assert_eq!(&sink[CHUNK_HEADER_LEN + CHECKSUM_LEN..], &body[..]);
    }

    // Claims no output room is needed, so every real compress call fails
    struct Undersized(Snappy);

    impl BlockCodec for Undersized {
        fn max_compressed_len(&self, _input_len: usize) -> usize {
            0
        }

        fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            self.0.compress(input, output)
        }

        fn decompressed_len(&self, input: &[u8]) -> Result<usize, CodecError> {
            self.0.decompressed_len(input)
        }

        fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            self.0.decompress(input, output)
        }
    }

    #[test]
    fn encode_error_poisons() {
        let mut writer = Writer::with_codec(Vec::new(), Undersized(Snappy::new())).unwrap();
        writer.write_all(b"Hello World!!!!!").unwrap();

        let err = writer.flush().unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Codec(_))));

        let err = writer.write_all(b"more").unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Poisoned)));
        assert_eq!(writer.get_ref(), &STREAM_IDENTIFIER);
    }

    // Sink whose `fail_on`th write call fails, every other call succeeds
    #[derive(Debug)]
    struct Flaky {
        data: Vec<u8>,
        calls: usize,
        fail_on: usize,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_poisons() {
        let sink = Flaky {
            data: vec![],
            calls: 0,
            // Call 1 is the identifier, call 2 the prefix of the first chunk
            fail_on: 2,
        };
        let mut writer = Writer::new(sink).unwrap();
        writer.write_all(&random_data(10)).unwrap();

        let block = random_data(MAX_BLOCK_SIZE);
        let err = writer.write_all(&block).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        // Retrying must not sneak duplicated or half framed data onto the wire
        let err = writer.write_all(&block).unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Poisoned)));

        let err = writer.flush().unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Poisoned)));

        let err = writer.into_inner().unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Poisoned)));
    }

    #[test]
    fn failed_body_write_poisons() {
        let sink = Flaky {
            data: vec![],
            calls: 0,
            // Prefix goes out, body does not
            fail_on: 3,
        };
        let mut writer = Writer::new(sink).unwrap();
        writer.write_all(b"Hello World!!!!!").unwrap();

        assert!(writer.flush().is_err());
        let wire = writer.get_ref().data.len();

        let err = writer.write_all(b"more").unwrap_err();
        assert!(matches!(frame_error(&err), Some(FrameError::Poisoned)));
        assert!(writer.close().is_err());
        assert_eq!(writer.get_ref().data.len(), wire);
    }

    #[test]
    fn logs_chunk_decisions() {
        static LOG: Capture = Capture::new();

        let mut writer = Writer::new(Vec::new()).unwrap().with_logger(&LOG);
        writer.write_all(&[0u8; 50]).unwrap();
        writer.flush().unwrap();

        assert!(LOG.contains(log::Level::Trace, "CompressedData: raw 50"));
    }
}
