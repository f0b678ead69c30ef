use std::io;

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::compress::CodecError;
use crate::frame::{CHECKSUM_LEN, CHUNK_HEADER_LEN, MAX_DATA_CHUNK_LEN};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("not a snappy framed stream")]
    NotFramedStream,
    #[error("reserved unskippable chunk {0:#04x}")]
    UnskippableChunk(u8),
    #[error("bad checksum, expected {expected:#010x}")]
    BadChecksum { expected: u32 },
    #[error("chunk length {length} exceeds permitted max {max}")]
    ChunkTooLarge { length: usize, max: usize },
    #[error("data chunk length {0} too small to hold its checksum")]
    ShortChunk(usize),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("stream already failed")]
    Poisoned,
}

impl FrameError {
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FrameError::Io(e) => e.kind(),
            FrameError::Codec(_) | FrameError::Poisoned => io::ErrorKind::Other,
            _ => io::ErrorKind::InvalidData,
        }
    }
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> io::Error {
        match err {
            FrameError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    StreamIdentifier,
    CompressedData,
    UncompressedData,
    Padding,
    ReservedSkippable(u8),
    ReservedUnskippable(u8),
}

// Every byte value lands in one of the ranges, there is no invalid type byte
impl From<u8> for ChunkType {
    fn from(typ: u8) -> Self {
        match typ {
            0xff => ChunkType::StreamIdentifier,
            0x00 => ChunkType::CompressedData,
            0x01 => ChunkType::UncompressedData,
            0xfe => ChunkType::Padding,
            0x80..=0xfd => ChunkType::ReservedSkippable(typ),
            0x02..=0x7f => ChunkType::ReservedUnskippable(typ),
        }
    }
}

impl From<ChunkType> for u8 {
    fn from(typ: ChunkType) -> u8 {
        match typ {
            ChunkType::StreamIdentifier => 0xff,
            ChunkType::CompressedData => 0x00,
            ChunkType::UncompressedData => 0x01,
            ChunkType::Padding => 0xfe,
            ChunkType::ReservedSkippable(x) | ChunkType::ReservedUnskippable(x) => x,
        }
    }
}

impl ChunkType {
    pub fn is_data(&self) -> bool {
        matches!(self, ChunkType::CompressedData | ChunkType::UncompressedData)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub typ: ChunkType,
    /// Bytes following the header, checksum included for data chunks
    pub length: usize,
}

impl ChunkHeader {
    pub fn decode(buf: &[u8; CHUNK_HEADER_LEN]) -> Self {
        ChunkHeader {
            typ: ChunkType::from(buf[0]),
            length: LittleEndian::read_u24(&buf[1..]) as usize,
        }
    }

    pub fn encode(&self) -> [u8; CHUNK_HEADER_LEN] {
        let mut buf = [0u8; CHUNK_HEADER_LEN];
        buf[0] = self.typ.into();
        LittleEndian::write_u24(&mut buf[1..], self.length as u32);
        buf
    }
}

/// Header plus checksum of a data chunk whose body is `body_len` bytes long.
///
/// The wire chunk is this prefix followed by the body. `checksum` must be over the
/// decoded bytes, whichever representation the body uses.
pub fn data_chunk_prefix(
    typ: ChunkType,
    body_len: usize,
    checksum: u32,
) -> Result<[u8; CHUNK_HEADER_LEN + CHECKSUM_LEN], FrameError> {
    debug_assert!(typ.is_data());

    let length = body_len + CHECKSUM_LEN;
    if length > MAX_DATA_CHUNK_LEN {
        return Err(FrameError::ChunkTooLarge {
            length,
            max: MAX_DATA_CHUNK_LEN,
        });
    }

    let mut prefix = [0u8; CHUNK_HEADER_LEN + CHECKSUM_LEN];
    prefix[..CHUNK_HEADER_LEN].copy_from_slice(&ChunkHeader { typ, length }.encode());
    LittleEndian::write_u32(&mut prefix[CHUNK_HEADER_LEN..], checksum);
    Ok(prefix)
}
