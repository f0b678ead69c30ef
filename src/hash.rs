// Masked CRC-32C, the integrity check carried by every data chunk.
//
// The raw CRC is rotated and offset before it goes on the wire so that a
// checksum of data which itself embeds CRCs does not degenerate.
const MASK_DELTA: u32 = 0xa282_ead8;

/// Masked CRC-32C of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    mask(crc32c::crc32c(data))
}

fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}
