//! In-place bit manipulation on byte buffers.
//!
//! Offsets count bits from the most significant bit of byte 0. Both
//! operations leave every bit outside the addressed range untouched and reject
//! ranges that do not lie inside the buffer.

use crate::utils::errors::MutateError;

/// Largest shift applied in one pass; keeps the carry accumulator in a `u64`.
const MAX_SHIFT_PER_PASS: u32 = 56;

/// Fails unless `width` bits at `offset` lie inside `data`.
#[inline(always)]
pub fn check_bounds(data: &[u8], offset: u64, width: u64) -> Result<(), MutateError> {
    let len_bits = (data.len() as u64) << 3;

    match offset.checked_add(width) {
        Some(end) if end <= len_bits => Ok(()),
        _ => Err(MutateError::OutOfBounds {
            offset,
            width,
            len: data.len(),
        }),
    }
}

/// Fails unless `value` can be written to a `width`-bit field.
#[inline(always)]
pub fn check_value(width: u32, value: u64) -> Result<(), MutateError> {
    if width > 64 {
        return Err(MutateError::WidthTooLarge(width));
    }

    if width < 64 && value >> width != 0 {
        return Err(MutateError::ValueTooWide { value, width });
    }

    Ok(())
}

/// Overwrites `width` bits starting at `offset` with `value`.
///
/// `value` must fit in `width` bits. Only the bytes the range touches are
/// written.
pub fn set_bits(data: &mut [u8], offset: u64, width: u32, value: u64) -> Result<(), MutateError> {
    check_value(width, value)?;
    check_bounds(data, offset, width as u64)?;

    let mut remaining = width;
    let mut bit = offset;

    while remaining > 0 {
        let byte = (bit >> 3) as usize;
        let bit_in_byte = (bit & 7) as u32;
        let take = remaining.min(8 - bit_in_byte);
        let shift = 8 - bit_in_byte - take;

        let field_mask = ((1u16 << take) - 1) as u8;
        let part = (value >> (remaining - take)) as u8 & field_mask;

        data[byte] = (data[byte] & !(field_mask << shift)) | (part << shift);

        remaining -= take;
        bit += take as u64;
    }

    Ok(())
}

/// Shifts the `width` bits at `offset` left by `shift` positions inside
/// their own span.
///
/// Bits pushed past the left edge of the range are dropped and zeros come in
/// from the right.
pub fn shift_left(data: &mut [u8], offset: u64, width: u64, shift: u32) -> Result<(), MutateError> {
    check_bounds(data, offset, width)?;

    if width == 0 || shift == 0 {
        return Ok(());
    }

    if shift as u64 >= width {
        return clear_range(data, offset, width);
    }

    let mut left = shift;
    while left > 0 {
        let pass = left.min(MAX_SHIFT_PER_PASS);
        shift_left_pass(data, offset, width, pass);
        left -= pass;
    }

    Ok(())
}

fn clear_range(data: &mut [u8], offset: u64, width: u64) -> Result<(), MutateError> {
    let mut bit = offset;
    let end = offset + width;

    while bit < end {
        let take = (end - bit).min(64) as u32;
        set_bits(data, bit, take, 0)?;
        bit += take as u64;
    }

    Ok(())
}

// Walks the range from its last byte to its first, carrying the bits that
// leave each byte into the byte before it.
fn shift_left_pass(data: &mut [u8], offset: u64, width: u64, shift: u32) {
    let start_byte = (offset >> 3) as usize;
    let end_byte = ((offset + width - 1) >> 3) as usize;
    let start_bit = (offset & 7) as u32;
    let end_bit = ((offset + width - 1) & 7) as u32;

    let start_mask = 0xFFu8 >> start_bit;
    let end_mask = 0xFFu8 << (7 - end_bit);

    let mut shift_acc = 0u64;

    for i in (start_byte..=end_byte).rev() {
        let curr = data[i];

        let mut mask = 0xFFu8;
        if i == start_byte {
            mask &= start_mask;
        }
        if i == end_byte {
            mask &= end_mask;
        }

        shift_acc += ((curr & mask) as u64) << shift;
        data[i] = (curr & !mask) | (shift_acc as u8 & mask);
        shift_acc >>= 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [u8; 3] = [0b1010_1010, 0b0101_0101, 0b1111_0000];

    #[test]
    fn shift_left_inside_one_byte() -> Result<(), MutateError> {
        let mut data = DATA;
        shift_left(&mut data, 1, 4, 3)?;
        assert_eq!(data, [0b1100_0010, 0b0101_0101, 0b1111_0000]);

        let mut data = [0b0101_1101];
        shift_left(&mut data, 3, 3, 3)?;
        assert_eq!(data, [0b0100_0001]);
        Ok(())
    }

    #[test]
    fn set_bits_across_bytes() -> Result<(), MutateError> {
        let mut data = DATA;
        set_bits(&mut data, 4, 8, 0b1111_1111)?;
        assert_eq!(data, [0b1010_1111, 0b1111_0101, 0b1111_0000]);

        let mut data = [0b1010_1010, 0b0101_0101];
        set_bits(&mut data, 5, 4, 0b1011)?;
        assert_eq!(data, [0b1010_1101, 0b1101_0101]);
        Ok(())
    }

    #[test]
    fn set_bits_single_bit_leaves_neighbours() -> Result<(), MutateError> {
        for offset in 0..24 {
            let mut data = [0xFF; 3];
            set_bits(&mut data, offset, 1, 0)?;

            let expected = (0xFF_FFFFu32 & !(1 << (23 - offset))).to_be_bytes();
            assert_eq!(data, expected[1..]);
        }
        Ok(())
    }

    #[test]
    fn set_bits_touches_only_its_bytes() -> Result<(), MutateError> {
        let mut data = [0x00; 4];
        set_bits(&mut data, 8, 8, 0xA5)?;
        assert_eq!(data, [0x00, 0xA5, 0x00, 0x00]);

        // the last byte of a buffer can be written on its own
        let mut data = [0x00; 2];
        set_bits(&mut data, 13, 3, 0b111)?;
        assert_eq!(data, [0x00, 0b0000_0111]);
        Ok(())
    }

    #[test]
    fn set_bits_wide_value() -> Result<(), MutateError> {
        let mut data = [0u8; 9];
        set_bits(&mut data, 4, 64, u64::MAX)?;
        assert_eq!(data, [0x0F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xF0]);
        Ok(())
    }

    #[test]
    fn set_bits_rejects_contract_violations() {
        let mut data = DATA;

        assert_eq!(
            set_bits(&mut data, 0, 3, 8),
            Err(MutateError::ValueTooWide { value: 8, width: 3 })
        );
        assert_eq!(
            set_bits(&mut data, 20, 5, 0),
            Err(MutateError::OutOfBounds {
                offset: 20,
                width: 5,
                len: 3
            })
        );
        assert_eq!(
            set_bits(&mut data, 0, 65, 0),
            Err(MutateError::WidthTooLarge(65))
        );
        assert_eq!(data, DATA);
    }

    #[test]
    fn shift_left_noops() -> Result<(), MutateError> {
        let mut data = DATA;
        shift_left(&mut data, 5, 0, 3)?;
        assert_eq!(data, DATA);

        shift_left(&mut data, 5, 12, 0)?;
        assert_eq!(data, DATA);

        shift_left(&mut data, 24, 0, 7)?;
        assert_eq!(data, DATA);
        Ok(())
    }

    #[test]
    fn shift_left_across_bytes() -> Result<(), MutateError> {
        // range covers bits 4..20: 1010 0101 0101 1111
        let mut data = DATA;
        shift_left(&mut data, 4, 16, 3)?;
        // shifted: 0 0101 0101 1111 000
        assert_eq!(data, [0b1010_0010, 0b1010_1111, 0b1000_0000]);
        Ok(())
    }

    #[test]
    fn shift_left_by_more_than_a_byte() -> Result<(), MutateError> {
        let mut data = [0x12, 0x34, 0x56, 0x78];
        shift_left(&mut data, 0, 32, 12)?;
        assert_eq!(data, [0x45, 0x67, 0x80, 0x00]);

        let mut data = [0xAB, 0x12, 0x34, 0x56, 0x78, 0xCD];
        shift_left(&mut data, 8, 32, 8)?;
        assert_eq!(data, [0xAB, 0x34, 0x56, 0x78, 0x00, 0xCD]);
        Ok(())
    }

    #[test]
    fn shift_left_split_passes_match_single_pass() -> Result<(), MutateError> {
        let src: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();

        let mut once = src.clone();
        shift_left(&mut once, 3, 240, 60)?;

        let mut twice = src.clone();
        shift_left(&mut twice, 3, 240, 30)?;
        shift_left(&mut twice, 3, 240, 30)?;

        assert_eq!(once, twice);
        assert_eq!(once[0] & 0xE0, src[0] & 0xE0);
        assert_eq!(once[30] & 0x1F, src[30] & 0x1F);
        assert_eq!(once[31], src[31]);
        Ok(())
    }

    #[test]
    fn shift_left_full_width_clears_range() -> Result<(), MutateError> {
        let mut data = DATA;
        shift_left(&mut data, 2, 12, 12)?;
        assert_eq!(data, [0b1000_0000, 0b0000_0001, 0b1111_0000]);
        Ok(())
    }

    #[test]
    fn shift_left_rejects_out_of_bounds() {
        let mut data = DATA;
        assert_eq!(
            shift_left(&mut data, 10, 15, 1),
            Err(MutateError::OutOfBounds {
                offset: 10,
                width: 15,
                len: 3
            })
        );
        assert_eq!(data, DATA);
    }
}
