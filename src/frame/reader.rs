use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian};

use crate::buf::{fill_buf, flush_buf, read_full, skip, truncated};
use crate::compress::{BlockCodec, Snappy};
use crate::frame::chunk::{ChunkHeader, ChunkType, FrameError};
use crate::frame::{
    Logger, CHECKSUM_LEN, CHUNK_HEADER_LEN, MAX_BLOCK_SIZE, MAX_DATA_CHUNK_LEN, STREAM_IDENTIFIER,
};
use crate::hash::checksum;

/// Decompressing `Read` adapter over a snappy framed stream.
///
/// Each chunk is decoded and verified in full before any of its bytes are handed
/// out. Whatever the caller's buffer can't take is kept and served by the following
/// reads without touching the source.
pub struct Reader<R: Read, C: BlockCodec = Snappy> {
    inner: R,
    codec: C,
    // Chunk body scratch, grows to the largest body seen
    body: Vec<u8>,
    // Decoded bytes of the current chunk, `decoded[pos..]` is still owed to the caller
    decoded: Vec<u8>,
    pos: usize,
    poisoned: bool,
    logger: Option<Logger>,
}

impl<R: Read> Reader<R> {
    pub fn new(reader: R) -> Result<Self, FrameError> {
        Reader::with_codec(reader, Snappy::new())
    }
}

impl<R: Read, C: BlockCodec> Reader<R, C> {
    /// Consumes and checks the stream identifier.
    ///
    /// A source too short to hold it fails with the underlying `UnexpectedEof`, one
    /// holding anything else fails with [`FrameError::NotFramedStream`].
    pub fn with_codec(mut reader: R, codec: C) -> Result<Self, FrameError> {
        let mut ident = [0u8; STREAM_IDENTIFIER.len()];
        read_full(&mut reader, &mut ident, "stream identifier")?;

        if ident != STREAM_IDENTIFIER {
            return Err(FrameError::NotFramedStream);
        }

        Ok(Reader {
            inner: reader,
            codec,
            body: Vec::with_capacity(MAX_DATA_CHUNK_LEN),
            decoded: Vec::with_capacity(MAX_BLOCK_SIZE),
            pos: 0,
            poisoned: false,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Hands back the source, any decoded bytes not yet read are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    // Parse one chunk. Ok(false) only on a clean end of stream, right at a chunk
    // boundary.
    fn next_chunk(&mut self) -> Result<bool, FrameError> {
        let mut raw = [0u8; CHUNK_HEADER_LEN];
        match fill_buf(&mut self.inner, &mut raw)? {
            (true, 0) => return Ok(false),
            (true, len) => return Err(truncated("chunk header", len, CHUNK_HEADER_LEN).into()),
            (false, _) => (),
        }
        let header = ChunkHeader::decode(&raw);

        match header.typ {
            ChunkType::StreamIdentifier => {
                // Allowed to repeat, must still be the exact identifier
                if raw[..] != STREAM_IDENTIFIER[..CHUNK_HEADER_LEN] {
                    return Err(FrameError::NotFramedStream);
                }

                let mut rest = [0u8; STREAM_IDENTIFIER.len() - CHUNK_HEADER_LEN];
                read_full(&mut self.inner, &mut rest, "stream identifier")?;
                if rest[..] != STREAM_IDENTIFIER[CHUNK_HEADER_LEN..] {
                    return Err(FrameError::NotFramedStream);
                }
                chunk_log!(self.logger, log::Level::Debug, "repeated stream identifier");
            }
            ChunkType::CompressedData | ChunkType::UncompressedData => {
                self.read_data(header)?;
            }
            ChunkType::Padding | ChunkType::ReservedSkippable(_) => {
                chunk_log!(
                    self.logger,
                    log::Level::Debug,
                    "skipping {:?}, {} bytes",
                    header.typ,
                    header.length
                );
                skip(&mut self.inner, header.length as u64, "skippable chunk")?;
            }
            ChunkType::ReservedUnskippable(typ) => {
                chunk_log!(self.logger, log::Level::Warn, "unskippable chunk {:#04x}", typ);
                return Err(FrameError::UnskippableChunk(typ));
            }
        }

        Ok(true)
    }

    fn read_data(&mut self, header: ChunkHeader) -> Result<(), FrameError> {
        let length = header.length;
        if length < CHECKSUM_LEN {
            return Err(FrameError::ShortChunk(length));
        }

        let max = match header.typ {
            ChunkType::CompressedData => {
                CHECKSUM_LEN + self.codec.max_compressed_len(MAX_BLOCK_SIZE)
            }
            _ => MAX_DATA_CHUNK_LEN,
        };
        if length > max {
            return Err(FrameError::ChunkTooLarge { length, max });
        }

        self.body.resize(length, 0);
        read_full(&mut self.inner, &mut self.body, "chunk body")?;

        let expected = LittleEndian::read_u32(&self.body[..CHECKSUM_LEN]);
        let payload = &self.body[CHECKSUM_LEN..];

        self.decoded.clear();
        self.pos = 0;

        if header.typ == ChunkType::CompressedData {
            let decoded_len = match self.codec.decompressed_len(payload) {
                Ok(len) if len <= MAX_BLOCK_SIZE => len,
                Ok(len) => {
                    chunk_log!(
                        self.logger,
                        log::Level::Warn,
                        "compressed chunk claims {} decoded bytes",
                        len
                    );
                    return Err(FrameError::BadChecksum { expected });
                }
                Err(e) => {
                    chunk_log!(self.logger, log::Level::Warn, "undecodable chunk: {}", e);
                    return Err(FrameError::BadChecksum { expected });
                }
            };

            self.decoded.resize(decoded_len, 0);
            if let Err(e) = self.codec.decompress(payload, &mut self.decoded) {
                self.decoded.clear();
                chunk_log!(self.logger, log::Level::Warn, "undecodable chunk: {}", e);
                return Err(FrameError::BadChecksum { expected });
            }
        } else {
            self.decoded.extend_from_slice(payload);
        }

        let actual = checksum(&self.decoded);
        if actual != expected {
            self.decoded.clear();
            chunk_log!(
                self.logger,
                log::Level::Warn,
                "checksum mismatch, expected {:#010x} got {:#010x}",
                expected,
                actual
            );
            return Err(FrameError::BadChecksum { expected });
        }

        chunk_log!(
            self.logger,
            log::Level::Trace,
            "{:?}: body {} decoded {}",
            header.typ,
            length - CHECKSUM_LEN,
            self.decoded.len()
        );
        Ok(())
    }
}

impl<R: Read, C: BlockCodec> Read for Reader<R, C> {
    /// Serves pending bytes first, otherwise parses chunks until one yields data,
    /// the source ends cleanly (`Ok(0)`) or an error occurs.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.decoded.len() {
                return Ok(flush_buf(&self.decoded, &mut self.pos, buf));
            }
            if buf.is_empty() {
                return Ok(0);
            }
            if self.poisoned {
                return Err(FrameError::Poisoned.into());
            }

            match self.next_chunk() {
                Ok(true) => continue,
                Ok(false) => return Ok(0),
                Err(e) => {
                    self.poisoned = true;
                    return Err(e.into());
                }
            }
        }
    }
}
