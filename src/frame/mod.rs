//! Snappy framing format
//!
//! A stream is a sequence of chunks lying back to back with no padding in between.
//! Every chunk is self describing so a reader can verify, decode or skip it without
//! knowing anything about the chunks around it. Unless otherwise noted everything is
//! stored in Little Endian format.
//!
//! | Type    | Name     | Description |
//! | ------: | -------- | ----------- |
//! | u8      | type     | The type of the chunk, see below |
//! | u24     | length   | Number of bytes following the 4 byte header |
//! | [u8; N] | value    | The content of the chunk, interpret according to the chunk type |
//!
//! # Chunk Types
//!
//! | Chunk Type    | Name                 | Description |
//! | :-----------: | -------------------- | ----------- |
//! | `0xff`        | Stream Identifier    | Must open the stream, may repeat later |
//! | `0x00`        | Compressed Data      | Checksum followed by one snappy block |
//! | `0x01`        | Uncompressed Data    | Checksum followed by the raw bytes |
//! | `0xfe`        | Padding              | Ignored |
//! | `0x80..=0xfd` | Reserved Skippable   | Ignored, reserved for future use |
//! | `0x02..=0x7f` | Reserved Unskippable | Aborts decoding |
//!
//! ## Stream Identifier
//!
//! Always the 10 bytes `ff 06 00 00 73 4e 61 50 70 59`: a chunk of length 6 holding
//! the ASCII `sNaPpY`. A [`Reader`] refuses any source that does not start with it.
//!
//! ## Compressed Data / Uncompressed Data
//!
//! | Type    | Name     | Description |
//! | ------: | -------- | ----------- |
//! | u32     | checksum | Masked CRC-32C of the *decoded* bytes, see [`crate::hash`] |
//! | [u8; N] | data     | Snappy block (`0x00`) or the bytes themselves (`0x01`) |
//!
//! A data chunk never decodes to more than [`MAX_BLOCK_SIZE`] bytes. The checksum is
//! always over the decoded bytes so both representations are verified the same way.
//! The [`Writer`] stores a block raw whenever compressing it would not shrink it.
//!
//! ## Padding / Reserved Skippable
//!
//! Content is discarded unread, `length` bytes are skipped.
//!
//! ## Reserved Unskippable
//!
//! Means the stream uses a format extension this reader does not know. Skipping it
//! would silently drop data, so decoding stops with [`FrameError::UnskippableChunk`].
use std::io;

// Logger handed to a Writer/Reader, the codec never installs or uses a global one
pub type Logger = &'static dyn log::Log;

macro_rules! chunk_log {
    ($logger:expr, $lvl:expr, $($arg:tt)+) => {
        if let Some(logger) = $logger {
            let lvl: log::Level = $lvl;
            let metadata = log::Metadata::builder()
                .level(lvl)
                .target(module_path!())
                .build();

            if logger.enabled(&metadata) {
                logger.log(
                    &log::Record::builder()
                        .level(lvl)
                        .target(module_path!())
                        .args(format_args!($($arg)+))
                        .module_path_static(Some(module_path!()))
                        .file_static(Some(file!()))
                        .line(Some(line!()))
                        .build(),
                );
            }
        }
    };
}

pub mod chunk;
pub mod reader;
pub mod writer;

pub use chunk::{ChunkHeader, ChunkType, FrameError};
pub use reader::Reader;
pub use writer::Writer;

/// Stream identifier chunk, header included.
pub const STREAM_IDENTIFIER: [u8; 10] = *b"\xff\x06\x00\x00sNaPpY";

/// Largest number of decoded bytes a single data chunk may carry.
pub const MAX_BLOCK_SIZE: usize = 65536;

pub const CHUNK_HEADER_LEN: usize = 4;
pub const CHECKSUM_LEN: usize = 4;

/// Largest `length` field of an uncompressed data chunk.
pub const MAX_DATA_CHUNK_LEN: usize = MAX_BLOCK_SIZE + CHECKSUM_LEN;

/// Largest uncompressed data chunk on the wire, header included.
pub const MAX_CHUNK_LEN: usize = MAX_DATA_CHUNK_LEN + CHUNK_HEADER_LEN;

/// Pull the [`FrameError`] back out of an `io::Error` returned by `Read`/`Write`.
pub fn frame_error(err: &io::Error) -> Option<&FrameError> {
    err.get_ref().and_then(|e| e.downcast_ref::<FrameError>())
}

#[cfg(test)]
mod test_logger {
    use std::sync::Mutex;

    use log::{Level, Log, Metadata, Record};

    // Collects every record so tests can assert on what the codec reported
    pub struct Capture {
        pub lines: Mutex<Vec<(Level, String)>>,
    }

    impl Capture {
        pub const fn new() -> Self {
            Capture {
                lines: Mutex::new(Vec::new()),
            }
        }

        pub fn contains(&self, level: Level, needle: &str) -> bool {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .any(|(l, line)| *l == level && line.contains(needle))
        }
    }

    impl Log for Capture {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.lines
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }
}

#[cfg(test)]
pub(crate) use test_logger::Capture;
