use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Snappy(#[from] snap::Error),
}

// Trait for wrapping up the block compression portion of the code, the
// framing layer only ever hands it one bounded block at a time
pub trait BlockCodec {
    /// Worst case size of `compress` output for an input of `input_len` bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize;

    /// Compress `input` into `output`, returning the number of bytes written.
    /// `output` must be at least `max_compressed_len(input.len())` long.
    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;

    /// Decoded size announced by a compressed block.
    fn decompressed_len(&self, input: &[u8]) -> Result<usize, CodecError>;

    /// Decompress `input` into `output`, returning the number of bytes written.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;
}

/// Raw (unframed) snappy blocks.
///
/// The encoder keeps its hash table between calls so compressing a stream of
/// blocks does not allocate per block.
pub struct Snappy {
    enc: snap::raw::Encoder,
    dec: snap::raw::Decoder,
}

impl Snappy {
    pub fn new() -> Self {
        Snappy {
            enc: snap::raw::Encoder::new(),
            dec: snap::raw::Decoder::new(),
        }
    }
}

impl Default for Snappy {
    fn default() -> Self {
        Snappy::new()
    }
}

impl BlockCodec for Snappy {
    fn max_compressed_len(&self, input_len: usize) -> usize {
        snap::raw::max_compress_len(input_len)
    }

    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        Ok(self.enc.compress(input, output)?)
    }

    fn decompressed_len(&self, input: &[u8]) -> Result<usize, CodecError> {
        Ok(snap::raw::decompress_len(input)?)
    }

    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        Ok(self.dec.decompress(input, output)?)
    }
}
