//! Bitstream reading utilities for TOC parsing.
//!
//! Provides a big-endian bit source over a single compressed sample. Reads
//! past the end of the sample yield zero bits instead of failing; the grammar
//! decides whether the consumed size makes sense.

use std::io::{self, Chain, Cursor, Read, Repeat};

use bitstream_io::{BigEndian, BitRead, BitReader};

/// Widest value serviced by a single primitive read. Wider fields are
/// assembled from several chunks, most significant chunk first.
pub const MAX_CHUNK_BITS: u32 = 24;

type ZeroPadded<'a> = Chain<Cursor<&'a [u8]>, Repeat>;

#[derive(Debug)]
pub struct BitSource<'a> {
    bs: BitReader<ZeroPadded<'a>, BigEndian>,
    position: u64,
    len: u64,
}

impl<'a> BitSource<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let read = Cursor::new(buf).chain(io::repeat(0));

        Self {
            bs: BitReader::new(read),
            position: 0,
            len: (buf.len() as u64) << 3,
        }
    }

    /// Reads `n` bits as an unsigned value.
    ///
    /// Fields wider than [`MAX_CHUNK_BITS`] are read as consecutive chunks of
    /// at most 24 bits and concatenated. Only the trailing 64 bits of a field
    /// wider than 64 bits are kept.
    #[inline(always)]
    pub fn get_n(&mut self, n: u32) -> io::Result<u64> {
        let mut value = 0u64;
        let mut remaining = n;

        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK_BITS);
            let part: u32 = self.bs.read_unsigned_var(chunk)?;
            value = (value << chunk) | part as u64;
            remaining -= chunk;
        }

        self.position = self.position.saturating_add(n as u64);

        Ok(value)
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        Ok(self.get_n(1)? == 1)
    }

    /// Reads byte-alignment padding. Same bit consumption as [`Self::get_n`].
    #[inline(always)]
    pub fn get_align(&mut self, n: u32) -> io::Result<u64> {
        self.get_n(n)
    }

    /// Discards `n` bits.
    ///
    /// Bits beyond the end of the sample are all zero, so a skip running past
    /// the end only advances the position once the real data is consumed.
    pub fn skip_n(&mut self, n: u64) -> io::Result<()> {
        let in_bounds = n.min(self.available());
        let mut remaining = in_bounds;

        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK_BITS as u64) as u32;
            self.get_n(chunk)?;
            remaining -= chunk as u64;
        }

        self.position = self.position.saturating_add(n - in_bounds);

        Ok(())
    }

    /// Reads an escape-coded value: groups of `n` bits, each followed by a
    /// continuation flag. Every continuation shifts the accumulator by `n`
    /// and adds `1 << n`.
    #[inline(always)]
    pub fn get_variable_bits(&mut self, n: u32) -> io::Result<u64> {
        let mut value = 0u64;

        loop {
            value += self.get_n(n)?;

            if !self.get()? {
                break;
            }

            value = value
                .checked_shl(n)
                .filter(|v| v >> n == value)
                .and_then(|v| v.checked_add(1 << n))
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "variable_bits({n}): value overflows 64 bits at {}",
                            self.position
                        ),
                    )
                })?;
        }

        Ok(value)
    }

    /// Bits consumed since the start of the sample.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bits of real sample data not yet consumed.
    #[inline(always)]
    pub fn available(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    #[inline(always)]
    pub fn len_bits(&self) -> u64 {
        self.len
    }

    #[inline(always)]
    pub fn is_past_end(&self) -> bool {
        self.position > self.len
    }
}
