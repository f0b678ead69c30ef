use std::cmp;
use std::io::{self, Read};

/// Read from `data` until `buf` is full or the source runs dry.
///
/// Returns `(eof, len)`: `eof` is set when the source returned 0 before `buf` was
/// filled, `len` is the number of bytes placed at the front of `buf`. This is what
/// lets a caller tell a clean end of stream (`(true, 0)`) apart from a truncated one.
pub fn fill_buf<R: Read>(data: &mut R, buf: &mut [u8]) -> io::Result<(bool, usize)> {
    let mut buf_read = 0;

    while buf_read < buf.len() {
        match data.read(&mut buf[buf_read..]) {
            Ok(0) => return Ok((true, buf_read)),
            Ok(x) => buf_read += x,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
    }
    Ok((false, buf_read))
}

/// Like `read_exact` but a short source is always reported as `UnexpectedEof`,
/// naming what was being read.
pub fn read_full<R: Read>(data: &mut R, buf: &mut [u8], what: &str) -> io::Result<()> {
    match fill_buf(data, buf)? {
        (false, _) => Ok(()),
        (true, len) if len == buf.len() => Ok(()),
        (true, len) => Err(truncated(what, len, buf.len())),
    }
}

/// Discard exactly `len` bytes from `data` without buffering them.
pub fn skip<R: Read>(data: &mut R, len: u64, what: &str) -> io::Result<()> {
    let skipped = io::copy(&mut data.take(len), &mut io::sink())?;
    if skipped == len {
        Ok(())
    } else {
        Err(truncated(what, skipped as usize, len as usize))
    }
}

pub fn truncated(what: &str, got: usize, want: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("truncated {}: got {} of {} bytes", what, got, want),
    )
}

/// Copy pending bytes `in_buf[*pos..]` into `buf`, advancing `pos`.
///
/// The pending buffer is not drained, so its allocation can be reused once
/// `pos` catches up with its length.
pub fn flush_buf(in_buf: &[u8], pos: &mut usize, buf: &mut [u8]) -> usize {
    // 1. Grab slice [pos...pos + min(buf.len(), pending))
    let pending = &in_buf[*pos..];
    let split_at = cmp::min(pending.len(), buf.len());
    // 2. Copy into buf
    buf[..split_at].copy_from_slice(&pending[..split_at]);
    // 3. Advance the cursor past what was handed out
    *pos += split_at;

    split_at
}
