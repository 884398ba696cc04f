//! Supporting infrastructure.
//!
//! Bit-level reading over sample buffers, in-place bit field edits, and the
//! error types shared by the crate.

pub mod bit_ops;
pub mod bitstream_io;
pub mod errors;
