//! Streaming compression in the snappy framing format.
//!
//! [`Writer`] cuts whatever is written to it into blocks of at most 64KiB, compresses
//! each one (or stores it as is when that is smaller) and frames it with its length
//! and a checksum of the original bytes. [`Reader`] undoes that, verifying every
//! chunk before handing out a single byte of it.
//!
//! ```no_run
//! use std::io::{copy, Write};
//! use snapstream::{Reader, Writer};
//!
//! let mut writer = Writer::new(Vec::new())?;
//! writer.write_all(b"Hello World!")?;
//! let stream = writer.into_inner()?;
//!
//! let mut out = vec![];
//! copy(&mut Reader::new(&stream[..])?, &mut out)?;
//! assert_eq!(out, b"Hello World!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod buf;
pub mod compress;
pub mod frame;
pub mod hash;

pub use frame::{frame_error, FrameError, Reader, Writer};
