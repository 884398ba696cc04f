//! Presentation signalling.
//!
//! Bitstream versions 0 and 1 describe each presentation together with its
//! substreams ([`ac4_presentation_info`]). Version 2 and later reference
//! substream groups by index ([`ac4_presentation_v2_info`]); the groups
//! themselves follow all presentations in the TOC.
//!
//! Both layouts report `presentation_level`, `b_presentation_id` and
//! `presentation_id` to the sink. These are the fields a presentation
//! rewrite edits.

use log::trace;

use crate::process::parse::{TocReader, TocState};
use crate::structs::emdf::EmdfInfo;
use crate::structs::substream::{
    ac4_hsf_ext_substream_info, ac4_substream_group_info, ac4_substream_info,
};
use crate::structs::toc_element::TocField;
use crate::utils::errors::TocError;

/// `presentation_config` of a presentation made of EMDF substreams only.
pub const PRESENTATION_CONFIG_EMDF_ONLY: u64 = 6;

/// `presentation_config` whose extension data is padded to whole bytes.
const PRESENTATION_CONFIG_PADDED_EXT: u64 = 8;

/// Frame rate indices with an optional 2x/4x frame rate multiplier.
const MULTIPLIER_FRAME_RATES: [u8; 3] = [2, 3, 4];

/// Frame rate factor per `frame_rate_multiplier_bit`.
const MULTIPLIER_FACTORS: [u64; 2] = [2, 4];

/// Frame rate indices with an optional 2x frame rate multiplier.
const DOUBLING_FRAME_RATES: [u8; 5] = [0, 1, 7, 8, 9];

/// Frame rate factor per `b_multiplier`.
const DOUBLING_FACTORS: [u64; 2] = [1, 2];

/// Frame rate indices that may signal a fraction of 2 at factor 1.
const HALF_FRACTION_FRAME_RATES: [u8; 5] = [5, 6, 7, 8, 9];

/// Frame rate indices that may signal a fraction of 2 or 4.
const QUARTER_FRACTION_FRAME_RATES: [u8; 3] = [10, 11, 12];

/// Unary coded presentation version.
pub fn presentation_version(reader: &mut TocReader) -> Result<u64, TocError> {
    let mut version = 0;
    while reader.get()? {
        version += 1;
    }
    Ok(version)
}

/// Sets [`TocState::frame_rate_factor`] for the current presentation.
pub fn frame_rate_multiply_info(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    let index = state.frame_rate_index;

    state.frame_rate_factor = if MULTIPLIER_FRAME_RATES.contains(&index) {
        // b_multiplier
        if reader.get()? {
            MULTIPLIER_FACTORS[reader.get_n(1)? as usize]
        } else {
            1
        }
    } else if DOUBLING_FRAME_RATES.contains(&index) {
        DOUBLING_FACTORS[reader.get_n(1)? as usize]
    } else {
        1
    };

    Ok(())
}

/// Returns the frame rate fraction, 1 when none is signalled.
pub fn frame_rate_fractions_info(state: &TocState, reader: &mut TocReader) -> Result<u64, TocError> {
    let index = state.frame_rate_index;
    let mut fraction = 1;

    if HALF_FRACTION_FRAME_RATES.contains(&index) && state.frame_rate_factor == 1 && reader.get()? {
        fraction = 2;
    }

    if QUARTER_FRACTION_FRAME_RATES.contains(&index) && reader.get()? {
        // b_frame_rate_fraction_is_4
        fraction = if reader.get()? { 4 } else { 2 };
    }

    Ok(fraction)
}

pub fn presentation_config_ext_info(
    state: &TocState,
    reader: &mut TocReader,
    presentation_config: u64,
) -> Result<(), TocError> {
    let mut n_skip_bytes = reader.get_n(5)?;

    // b_more_skip_bytes
    if reader.get()? {
        let more = reader.get_variable_bits(2)?;
        n_skip_bytes = n_skip_bytes.saturating_add(more.checked_shl(5).unwrap_or(u64::MAX));
    }

    let skip_bits = n_skip_bytes.saturating_mul(8);

    if state.bitstream_version >= 1 && presentation_config == PRESENTATION_CONFIG_PADDED_EXT {
        // nothing of the extension is parsed, so all of it is padding
        let read_bits = 0;
        let padding = skip_bits
            .checked_sub(read_bits)
            .ok_or(TocError::NegativePadding {
                skip_bits,
                read_bits,
            })?;
        reader.skip_n(padding)?;
    } else {
        reader.skip_n(skip_bits)?;
    }

    Ok(())
}

/// `presentation_config` with its escape extension, reported to the sink.
#[inline(always)]
fn presentation_config(reader: &mut TocReader) -> Result<u64, TocError> {
    let config = reader.write_uint(TocField::PresentationConfig, 3)?;
    Ok(reader.extend_if_escaped(config, 3, 2)?)
}

#[inline(always)]
fn presentation_id(reader: &mut TocReader) -> Result<Option<u64>, TocError> {
    if reader.write_uint(TocField::BPresentationId, 1)? == 1 {
        Ok(Some(reader.traced_variable_bits(TocField::PresentationId, 2)?))
    } else {
        Ok(None)
    }
}

fn add_emdf_substreams(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    let mut n_add_emdf_substreams = reader.get_n(2)?;
    if n_add_emdf_substreams == 0 {
        n_add_emdf_substreams = reader.get_variable_bits(2)?.saturating_add(4);
    }

    for _ in 0..n_add_emdf_substreams {
        reader.ensure_in_bounds()?;
        EmdfInfo::read(state, reader)?;
    }

    Ok(())
}

/// Presentation of bitstream versions 0 and 1.
pub fn ac4_presentation_info(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    let b_single_substream = reader.get()?;
    let config = if b_single_substream {
        None
    } else {
        Some(presentation_config(reader)?)
    };

    let version = presentation_version(reader)?;

    let b_add_emdf_substreams = if config == Some(PRESENTATION_CONFIG_EMDF_ONLY) {
        true
    } else {
        let level = reader.write_uint(TocField::PresentationLevel, 3)?;
        let id = presentation_id(reader)?;
        trace!(
            "presentation {}: version {version}, level {level}, id {id:?}",
            state.presentation_index
        );

        frame_rate_multiply_info(state, reader)?;
        EmdfInfo::read(state, reader)?;

        match config {
            None => ac4_substream_info(state, reader)?,
            Some(config) => {
                let b_hsf_ext = reader.get()?;

                match config {
                    0..=5 => {
                        ac4_substream_info(state, reader)?;
                        if b_hsf_ext {
                            ac4_hsf_ext_substream_info(state, reader, true)?;
                        }

                        // dialog, associated or both in addition to the main substream
                        let n_additional = match config {
                            0..=2 => 1,
                            3 | 4 => 2,
                            _ => 0,
                        };
                        for _ in 0..n_additional {
                            ac4_substream_info(state, reader)?;
                        }
                    }
                    _ => presentation_config_ext_info(state, reader, config)?,
                }
            }
        }

        reader.get()?; // b_pre_virtualized
        reader.get()?
    };

    if b_add_emdf_substreams {
        add_emdf_substreams(state, reader)?;
    }

    Ok(())
}

/// Substream group specifier of one presentation.
pub fn ac4_sgi_specifier(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    if state.bitstream_version == 1 {
        let group = state.group_cursor;
        ac4_substream_group_info(state, reader, group)?;
        state.group_cursor += 1;
    } else {
        let group = reader.get_n_extended(3, 2)?;
        state.current_presentation_groups().push(group);
        let factor = state.frame_rate_factor;
        state.set_group_frame_rate_factor(group, factor)?;
    }

    Ok(())
}

pub fn ac4_presentation_substream_info(
    state: &mut TocState,
    reader: &mut TocReader,
) -> Result<(), TocError> {
    reader.get()?; // b_alternative
    reader.get()?; // b_iframe_pres

    let index = reader.get_n_extended(2, 2)?;
    state.reference_substream(index);

    Ok(())
}

/// Presentation of bitstream versions 2 and later.
pub fn ac4_presentation_v2_info(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    state.current_presentation_groups().clear();

    let b_single_substream_group = reader.get()?;
    let config = if b_single_substream_group {
        None
    } else {
        Some(presentation_config(reader)?)
    };

    let version = if state.bitstream_version != 1 {
        presentation_version(reader)?
    } else {
        0
    };

    let b_add_emdf_substreams = if config == Some(PRESENTATION_CONFIG_EMDF_ONLY) {
        true
    } else {
        let level = if state.bitstream_version != 1 {
            Some(reader.write_uint(TocField::PresentationLevel, 3)?)
        } else {
            None
        };
        let id = presentation_id(reader)?;

        frame_rate_multiply_info(state, reader)?;
        let fraction = frame_rate_fractions_info(state, reader)?;
        trace!(
            "presentation {}: version {version}, level {level:?}, id {id:?}, frame rate x{}/{fraction}",
            state.presentation_index,
            state.frame_rate_factor
        );

        EmdfInfo::read(state, reader)?;

        // b_presentation_filter
        if reader.get()? {
            reader.get()?; // b_enable_presentation
        }

        match config {
            None => ac4_sgi_specifier(state, reader)?,
            Some(config) => {
                reader.get()?; // b_multi_pid

                let n_substream_groups = match config {
                    0..=2 => Some(2),
                    3 | 4 => Some(3),
                    5 => Some(reader.get_n_extended_plus(2, 2, 2)?),
                    _ => None,
                };

                match n_substream_groups {
                    Some(n) => {
                        for _ in 0..n {
                            reader.ensure_in_bounds()?;
                            ac4_sgi_specifier(state, reader)?;
                        }
                    }
                    None => presentation_config_ext_info(state, reader, config)?,
                }
            }
        }

        reader.get()?; // b_pre_virtualized
        let b_add_emdf_substreams = reader.get()?;
        ac4_presentation_substream_info(state, reader)?;
        b_add_emdf_substreams
    };

    if b_add_emdf_substreams {
        add_emdf_substreams(state, reader)?;
    }

    Ok(())
}
