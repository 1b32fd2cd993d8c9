// modbreaker-parsers/src/pbo/compression.rs
//! LZSS unpacking for `Cprs` entries
//!
//! The stream is a sequence of groups: one flag byte, then up to eight
//! items. A set flag bit is a literal byte; a clear bit is a two-byte back
//! reference:
//!
//! ```text
//!   b1        b2
//! ┌────────┐┌────┬────┐
//! │ off lo ││off │len │   offset = b1 | (b2 & 0xF0) << 4   (1..=4095)
//! └────────┘└────┴────┘   length = (b2 & 0x0F) + 3          (3..=18)
//! ```
//!
//! References reaching before the start of the output yield spaces. The
//! packed data is followed by a 4-byte additive checksum of the output.

use thiserror::Error;

/// Why an LZSS stream could not be unpacked
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LzssError {
    #[error("input exhausted at byte {input_offset} after {produced} of {expected} bytes")]
    InputExhausted {
        input_offset: usize,
        produced: usize,
        expected: usize,
    },

    #[error("zero back-reference offset at byte {input_offset}")]
    ZeroOffset { input_offset: usize },

    #[error("checksum mismatch: stored {stored:08X}, computed {computed:08X}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Handles decompression for PBO entries
pub struct PboCompression;

impl PboCompression {
    /// Unpack `data` into exactly `expected_size` bytes.
    ///
    /// When four bytes remain after the stream they are treated as the
    /// checksum and, if `verify_checksum` is set, compared.
    pub fn decompress(data: &[u8], expected_size: usize, verify_checksum: bool) -> Result<Vec<u8>, LzssError> {
        let mut out = Vec::with_capacity(expected_size);
        let mut pos = 0usize;

        let exhausted = |pos: usize, produced: usize| LzssError::InputExhausted {
            input_offset: pos,
            produced,
            expected: expected_size,
        };

        while out.len() < expected_size {
            let flags = *data.get(pos).ok_or_else(|| exhausted(pos, out.len()))?;
            pos += 1;

            for bit in 0..8 {
                if out.len() >= expected_size {
                    break;
                }

                if flags & (1 << bit) != 0 {
                    let byte = *data.get(pos).ok_or_else(|| exhausted(pos, out.len()))?;
                    pos += 1;
                    out.push(byte);
                    continue;
                }

                let (b1, b2) = match (data.get(pos), data.get(pos + 1)) {
                    (Some(b1), Some(b2)) => (usize::from(*b1), usize::from(*b2)),
                    _ => return Err(exhausted(pos, out.len())),
                };
                let offset = b1 | ((b2 & 0xF0) << 4);
                if offset == 0 {
                    return Err(LzssError::ZeroOffset { input_offset: pos });
                }
                pos += 2;

                let length = ((b2 & 0x0F) + 3).min(expected_size - out.len());
                let start = out.len() as isize - offset as isize;
                for i in 0..length {
                    let src = start + i as isize;
                    // src < out.len() always holds because offset >= 1
                    let byte = if src < 0 { b' ' } else { out[src as usize] };
                    out.push(byte);
                }
            }
        }

        if let Some(stored) = data.get(pos..pos + 4) {
            let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
            let computed = Self::checksum(&out);
            if verify_checksum && stored != computed {
                return Err(LzssError::ChecksumMismatch { stored, computed });
            }
        }

        Ok(out)
    }

    /// Additive checksum stored after packed data
    pub fn checksum(data: &[u8]) -> u32 {
        data.iter().fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)))
    }
}
