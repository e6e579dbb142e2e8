//! Codec module - compression for frame payloads.
//!
//! This module wraps the compression backend behind the capacity-bounded
//! contract the framing layer relies on:
//!
//! - [`Lz4Codec`] - LZ4 block format via `lz4_flex`
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather
//! than trait objects. This allows for compile-time codec selection and
//! keeps the hot path free of dynamic dispatch.

mod lz4;

pub use lz4::Lz4Codec;
