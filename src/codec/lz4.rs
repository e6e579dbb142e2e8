//! LZ4 codec using `lz4_flex` block format.
//!
//! All calls are capacity-bounded: the caller supplies the destination
//! buffer and an operation fails if the result would not fit. The block
//! format carries no size header of its own; the frame's length field
//! and the fixed decompression buffer provide the bounds instead.
//!
//! # Example
//!
//! ```
//! use shapetun::codec::Lz4Codec;
//!
//! let src = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
//! let mut compressed = vec![0u8; Lz4Codec::worst_case_len(src.len())];
//! let n = Lz4Codec::compress_into(src, &mut compressed).unwrap();
//!
//! let mut restored = vec![0u8; src.len()];
//! let m = Lz4Codec::decompress_into(&compressed[..n], &mut restored).unwrap();
//! assert_eq!(&restored[..m], src);
//! ```

use crate::error::Result;

/// LZ4 block codec for frame payloads.
pub struct Lz4Codec;

impl Lz4Codec {
    /// Worst-case compressed size for `src_len` input bytes.
    ///
    /// Admission control and startup validation use this bound to
    /// decide whether a compression attempt can ever overflow the
    /// frame budget.
    #[inline]
    pub fn worst_case_len(src_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(src_len)
    }

    /// Compress `src` into `dst`, returning the compressed length.
    ///
    /// # Errors
    ///
    /// Returns error if `dst` is too small for the compressed output.
    #[inline]
    pub fn compress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
        Ok(lz4_flex::block::compress_into(src, dst)?)
    }

    /// Decompress `src` into `dst`, returning the decompressed length.
    ///
    /// # Errors
    ///
    /// Returns error if the input is malformed or the output would
    /// exceed `dst`.
    #[inline]
    pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
        Ok(lz4_flex::block::decompress_into(src, dst)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic, incompressible-looking byte stream.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545F4914F6CDD1Du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state & 0xFF) as u8
            })
            .collect()
    }

    #[test]
    fn test_compress_decompress_roundtrip() {
        let src = b"the quick brown fox jumps over the lazy dog, twice over";
        let mut compressed = vec![0u8; Lz4Codec::worst_case_len(src.len())];
        let n = Lz4Codec::compress_into(src, &mut compressed).unwrap();

        let mut restored = vec![0u8; src.len()];
        let m = Lz4Codec::decompress_into(&compressed[..n], &mut restored).unwrap();

        assert_eq!(m, src.len());
        assert_eq!(&restored[..m], src);
    }

    #[test]
    fn test_repetitive_data_shrinks() {
        let src = vec![0x41u8; 1000];
        let mut compressed = vec![0u8; Lz4Codec::worst_case_len(src.len())];
        let n = Lz4Codec::compress_into(&src, &mut compressed).unwrap();
        assert!(n < src.len());
    }

    #[test]
    fn test_worst_case_covers_incompressible_input() {
        let src = noise(2000);
        let mut compressed = vec![0u8; Lz4Codec::worst_case_len(src.len())];
        let n = Lz4Codec::compress_into(&src, &mut compressed).unwrap();
        assert!(n <= compressed.len());

        let mut restored = vec![0u8; src.len()];
        let m = Lz4Codec::decompress_into(&compressed[..n], &mut restored).unwrap();
        assert_eq!(&restored[..m], &src[..]);
    }

    #[test]
    fn test_worst_case_fits_default_headroom() {
        // A 2000-byte batch must always fit a 2064-byte frame minus the
        // 2-byte length field, even when incompressible.
        assert!(Lz4Codec::worst_case_len(2000) <= 2062);
    }

    #[test]
    fn test_compress_into_undersized_dst_fails() {
        let src = noise(500);
        let mut dst = vec![0u8; 10];
        assert!(Lz4Codec::compress_into(&src, &mut dst).is_err());
    }

    #[test]
    fn test_decompress_into_undersized_dst_fails() {
        let src = vec![0x42u8; 300];
        let mut compressed = vec![0u8; Lz4Codec::worst_case_len(src.len())];
        let n = Lz4Codec::compress_into(&src, &mut compressed).unwrap();

        let mut small = vec![0u8; 10];
        assert!(Lz4Codec::decompress_into(&compressed[..n], &mut small).is_err());
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let garbage = [0xF0, 0x17, 0x99, 0xC3, 0x42];
        let mut dst = vec![0u8; 64];
        assert!(Lz4Codec::decompress_into(&garbage, &mut dst).is_err());
    }
}
