//! Substream and substream group signalling.
//!
//! Covers the channel coded, object coded and A-JOC substream infos of both
//! TOC layouts, the substream groups that bundle them and the auxiliary
//! HSF extension and OAMD substreams.
//!
//! Every substream carrying audio is recorded in
//! [`TocState::substreams`]; only the substream indices feed back into the
//! parse, through the substream index table check.

use log::trace;

use crate::process::parse::{TocReader, TocState};
use crate::structs::channel_mode::{
    ADD_CH_BASE_MODES, BACK_CHANNEL_MODES, CH_MODES_WITH_LFE, ChannelMode, extended_channel_mode,
};
use crate::utils::errors::TocError;

/// `bitrate_indicator` values complete after the first 3 bits.
const BITRATE_SHORT_CODES: [u64; 4] = [0, 2, 4, 6];

/// Non-LFE channel count per `n_objects_code`.
const OBJECT_CODE_CHANNELS: [u32; 8] = [0, 1, 2, 3, 5, 0, 0, 0];

/// Bed object count per `bed_chan_assign_code`.
const BED_CHAN_ASSIGN_OBJECTS: [u32; 8] = [2, 3, 6, 8, 10, 8, 10, 12];

/// Channel count of each bit of `std_bed_channel_assignment_mask`.
const STD_BED_MASK_CHANNELS: [u32; 10] = [2, 1, 1, 2, 2, 2, 2, 2, 2, 1];

/// `bed_chan_assign_code` values whose layout includes an LFE.
const LFE_BED_CHAN_ASSIGN_CODES: [u64; 6] = [2, 3, 4, 5, 6, 7];

/// Bits of `std_bed_channel_assignment_mask` that carry an LFE.
const STD_BED_LFE_BITS: [u32; 2] = [2, 9];

/// Bits of `nonstd_bed_channel_assignment_mask` that carry an LFE.
const NONSTD_BED_LFE_BITS: [u32; 2] = [3, 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstreamCoding {
    Channel(ChannelMode),
    Object,
    Ajoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstreamSummary {
    pub index: u64,
    /// `false` when the index was assigned implicitly.
    pub signalled: bool,
    pub coding: SubstreamCoding,
    pub lfe: bool,
}

/// Returns the raw code word, 3 or 5 bits long.
pub fn bitrate_indicator(reader: &mut TocReader) -> Result<u64, TocError> {
    let code = reader.get_n(3)?;
    if BITRATE_SHORT_CODES.contains(&code) {
        return Ok(code);
    }

    Ok((code << 2) + reader.get_n(2)?)
}

pub fn content_type(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    state.content_classifier = reader.get_n(3)? as u8;

    // b_language_indicator
    if reader.get()? {
        // b_serialized_language_tag
        if reader.get()? {
            reader.get()?; // b_start_tag
            reader.get_n(16)?; // language_tag_chunk
        } else {
            let n_language_tag_bytes = reader.get_n(6)?;
            reader.skip_n(n_language_tag_bytes * 8)?;
        }
    }

    Ok(())
}

#[inline(always)]
fn sf_multiplier(state: &TocState, reader: &mut TocReader) -> Result<(), TocError> {
    if state.fs_index == 1 && reader.get()? {
        reader.get()?;
    }
    Ok(())
}

#[inline(always)]
fn bitrate_info(reader: &mut TocReader) -> Result<(), TocError> {
    if reader.get()? {
        bitrate_indicator(reader)?;
    }
    Ok(())
}

#[inline(always)]
fn substream_index(state: &mut TocState, reader: &mut TocReader, present: bool) -> Result<u64, TocError> {
    if present {
        Ok(reader.get_n_extended(2, 2)?)
    } else {
        Ok(state.next_backup_index())
    }
}

/// A substream spans one index per frame of a frame rate factor group.
#[inline(always)]
fn reference_frames(state: &mut TocState, index: u64, present: bool) {
    if present {
        for i in 0..state.frame_rate_factor {
            state.reference_substream(index.saturating_add(i));
        }
    }
}

/// Substream info of the version 0/1 presentation layout.
pub fn ac4_substream_info(state: &mut TocState, reader: &mut TocReader) -> Result<(), TocError> {
    let mode = ChannelMode(extended_channel_mode(reader)?);

    sf_multiplier(state, reader)?;
    bitrate_info(reader)?;

    if ADD_CH_BASE_MODES.contains(&mode.0) {
        reader.get()?;
    }

    // b_content_type
    if reader.get()? {
        content_type(state, reader)?;
    }

    reader.skip_n(state.frame_rate_factor)?; // b_iframe per frame

    let index = reader.get_n_extended(2, 2)?;
    reference_frames(state, index, true);

    state.substreams.push(SubstreamSummary {
        index,
        signalled: true,
        coding: SubstreamCoding::Channel(mode),
        lfe: mode.contains_lfe(),
    });

    Ok(())
}

pub fn ac4_substream_info_chan(
    state: &mut TocState,
    reader: &mut TocReader,
    group_index: u64,
    present: bool,
) -> Result<(), TocError> {
    let mode = ChannelMode(extended_channel_mode(reader)?);

    let lfe = if BACK_CHANNEL_MODES.contains(&mode.0) {
        reader.get()?; // b_4_back_channels_present
        reader.get()?; // b_centre_present
        reader.get_n(2)?; // top_channels_present
        CH_MODES_WITH_LFE.contains(&mode.ch_mode()?)
    } else {
        mode.contains_lfe()
    };

    sf_multiplier(state, reader)?;
    bitrate_info(reader)?;

    if ADD_CH_BASE_MODES.contains(&mode.0) {
        reader.get()?;
    }

    state.frame_rate_factor = state.group_frame_rate_factor(group_index);
    reader.skip_n(state.frame_rate_factor)?;

    let index = substream_index(state, reader, present)?;
    reference_frames(state, index, present);

    state.substreams.push(SubstreamSummary {
        index,
        signalled: present,
        coding: SubstreamCoding::Channel(mode),
        lfe,
    });

    Ok(())
}

pub fn ac4_hsf_ext_substream_info(
    state: &mut TocState,
    reader: &mut TocReader,
    present: bool,
) -> Result<(), TocError> {
    let index = substream_index(state, reader, present)?;
    if present {
        state.reference_substream(index);
    }
    Ok(())
}

pub fn oamd_substream_info(
    state: &mut TocState,
    reader: &mut TocReader,
    present: bool,
) -> Result<(), TocError> {
    reader.get()?; // b_iframe_oamd

    let index = substream_index(state, reader, present)?;
    if present {
        state.reference_substream(index);
    }
    Ok(())
}

pub fn oamd_common_data(reader: &mut TocReader) -> Result<(), TocError> {
    // b_default_screen_size_ratio
    if !reader.get()? {
        reader.get_n(5)?; // master_screen_size_ratio_code
    }

    reader.get()?; // b_bed_object_chan_distribute

    // b_additional_data
    if reader.get()? {
        let add_data_bytes = reader.get_n_extended_plus(1, 2, 1)?;
        let declared_bits = add_data_bytes.saturating_mul(8);

        // nothing inside the additional data is parsed
        let used_bits = 0;
        let add_data_bits = declared_bits
            .checked_sub(used_bits)
            .ok_or(TocError::NegativeAdditionalData {
                declared_bits,
                used_bits,
            })?;

        reader.skip_n(add_data_bits)?;
    }

    Ok(())
}

/// Returns whether the assignment signals an LFE.
pub fn bed_dyn_obj_assignment(reader: &mut TocReader, n_signals: u64) -> Result<bool, TocError> {
    // b_dyn_objects_only
    if reader.get()? {
        return Ok(false);
    }

    // b_isf
    if reader.get()? {
        reader.get_n(3)?; // isf_config
        return Ok(false);
    }

    // b_ch_assign_code
    if reader.get()? {
        let bed_chan_assign_code = reader.get_n(3)?;
        return Ok(LFE_BED_CHAN_ASSIGN_CODES.contains(&bed_chan_assign_code));
    }

    // b_chan_assign_mask
    if reader.get()? {
        // b_nonstd_bed_channel_assignment
        let (mask, lfe_bits) = if reader.get()? {
            (reader.get_n(17)?, &NONSTD_BED_LFE_BITS)
        } else {
            (reader.get_n(10)?, &STD_BED_LFE_BITS)
        };

        return Ok(lfe_bits.iter().any(|bit| (mask >> bit) & 1 == 1));
    }

    let n_bed_signals = if n_signals > 1 {
        let n_bed_signals_minus1 = reader.get_n(ceil_log2(n_signals))?;
        reader.checked_add(n_bed_signals_minus1, 1)?
    } else {
        1
    };

    // signal counts matching an LFE bit position also flag LFE
    let mut lfe_signalled = NONSTD_BED_LFE_BITS
        .iter()
        .any(|&bit| n_bed_signals == bit as u64);
    for _ in 0..n_bed_signals {
        reader.ensure_in_bounds()?;
        let nonstd_bed_channel_assignment = reader.get_n(4)?;
        lfe_signalled |= nonstd_bed_channel_assignment == NONSTD_BED_LFE_BITS[0] as u64;
    }

    Ok(lfe_signalled)
}

#[inline(always)]
fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        return 0;
    }
    u64::BITS - (n - 1).leading_zeros()
}

pub fn ac4_substream_info_ajoc(
    state: &mut TocState,
    reader: &mut TocReader,
    group_index: u64,
    present: bool,
) -> Result<(), TocError> {
    let lfe = reader.get()?;

    // b_static_dmx
    if !reader.get()? {
        let n_fullband_dmx_signals = reader.get_n(4)? + 1;
        bed_dyn_obj_assignment(reader, n_fullband_dmx_signals)?;
    }

    // b_oamd_common_data_present
    if reader.get()? {
        oamd_common_data(reader)?;
    }

    let n_fullband_upmix_signals = reader.get_n_extended_plus(4, 3, 1)?;
    let upmix_lfe = bed_dyn_obj_assignment(reader, n_fullband_upmix_signals)?;
    trace!("A-JOC upmix: {n_fullband_upmix_signals} signal(s), LFE signalled: {upmix_lfe}");

    sf_multiplier(state, reader)?;
    bitrate_info(reader)?;

    state.frame_rate_factor = state.group_frame_rate_factor(group_index);
    reader.skip_n(state.frame_rate_factor)?;

    let index = substream_index(state, reader, present)?;
    reference_frames(state, index, present);

    state.substreams.push(SubstreamSummary {
        index,
        signalled: present,
        coding: SubstreamCoding::Ajoc,
        lfe,
    });

    Ok(())
}

pub fn ac4_substream_info_obj(
    state: &mut TocState,
    reader: &mut TocReader,
    group_index: u64,
    present: bool,
) -> Result<(), TocError> {
    let n_objects_code = reader.get_n(3)? as usize;
    let num_channels = OBJECT_CODE_CHANNELS[n_objects_code];

    let lfe = if reader.get()? {
        // b_dynamic_objects
        let lfe = reader.get()?;
        state.b_bed_objects_prev = false;
        lfe
    } else if reader.get()? {
        // b_bed_objects
        bed_objects(state, reader)?
    } else {
        state.b_bed_objects_prev = false;

        // b_isf
        if reader.get()? {
            // b_isf_start
            if reader.get()? {
                reader.get_n(3)?; // isf_config
            }
        } else {
            let res_bytes = reader.get_n(4)?;
            reader.skip_n(res_bytes * 8)?;

            if num_channels == 0 {
                return Err(TocError::ReservedObjectWithoutChannels);
            }
        }
        false
    };

    sf_multiplier(state, reader)?;
    bitrate_info(reader)?;

    state.frame_rate_factor = state.group_frame_rate_factor(group_index);
    reader.skip_n(state.frame_rate_factor)?;

    let index = substream_index(state, reader, present)?;
    reference_frames(state, index, present);

    state.substreams.push(SubstreamSummary {
        index,
        signalled: present,
        coding: SubstreamCoding::Object,
        lfe,
    });

    Ok(())
}

fn bed_objects(state: &mut TocState, reader: &mut TocReader) -> Result<bool, TocError> {
    // an LFE-only bed following a bed with two LFEs
    let mut lfe = state.b_bed_objects_prev && state.num_lfe == 2;
    state.b_bed_objects_prev = true;
    state.num_lfe = 0;

    // b_bed_start
    if !reader.get()? {
        return Ok(lfe);
    }

    let mut n_objects = 0;

    // b_ch_assign_code
    if reader.get()? {
        let bed_chan_assign_code = reader.get_n(3)?;
        n_objects += BED_CHAN_ASSIGN_OBJECTS[bed_chan_assign_code as usize];
        if bed_chan_assign_code >= 2 {
            lfe = true;
        }
    } else {
        // b_nonstd_bed_channel_assignment
        if reader.get()? {
            let mask = reader.get_n(17)?;
            for bit in (0..17u32).filter(|bit| (mask >> bit) & 1 == 1) {
                if NONSTD_BED_LFE_BITS.contains(&bit) {
                    state.num_lfe += 1;
                }
                n_objects += 1;
            }
        } else {
            let mask = reader.get_n(10)?;
            for bit in (0..10u32).filter(|bit| (mask >> bit) & 1 == 1) {
                let channels = STD_BED_MASK_CHANNELS[bit as usize];
                if STD_BED_LFE_BITS.contains(&bit) {
                    state.num_lfe += channels;
                }
                n_objects += channels;
            }
        }

        if state.num_lfe > 0 {
            lfe = true;
        }
    }

    trace!("bed with {n_objects} object(s), {} LFE", state.num_lfe);

    Ok(lfe)
}

pub fn ac4_substream_group_info(
    state: &mut TocState,
    reader: &mut TocReader,
    group_index: u64,
) -> Result<(), TocError> {
    let present = reader.get()?;
    let b_hsf_ext = reader.get()?;

    // b_single_substream
    let n_lf_substreams = if reader.get()? {
        1
    } else {
        reader.get_n_extended_plus(2, 2, 2)?
    };

    // b_channel_coded
    if reader.get()? {
        for _ in 0..n_lf_substreams {
            reader.ensure_in_bounds()?;

            if state.bitstream_version == 1 {
                reader.get()?; // sus_ver
            }

            ac4_substream_info_chan(state, reader, group_index, present)?;

            if b_hsf_ext {
                ac4_hsf_ext_substream_info(state, reader, present)?;
            }
        }
    } else {
        // b_oamd_substream
        if reader.get()? {
            oamd_substream_info(state, reader, present)?;
        }

        state.b_bed_objects_prev = false;

        for _ in 0..n_lf_substreams {
            reader.ensure_in_bounds()?;

            // b_ajoc
            if reader.get()? {
                ac4_substream_info_ajoc(state, reader, group_index, present)?;
            } else {
                ac4_substream_info_obj(state, reader, group_index, present)?;
            }

            if b_hsf_ext {
                ac4_hsf_ext_substream_info(state, reader, present)?;
            }
        }
    }

    // b_content_type
    if reader.get()? {
        content_type(state, reader)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::process::fixtures::Bits;
    use crate::structs::channel_mode::{CHANNEL_MODE_51, CHANNEL_MODE_714};
    use crate::structs::sink::NullSink;

    fn with_reader<T>(
        bits: Bits,
        state: &mut TocState,
        rule: impl FnOnce(&mut TocState, &mut TocReader) -> Result<T, TocError>,
    ) -> Result<(T, u64), TocError> {
        let data = bits.finish();
        let mut sink = NullSink;
        let mut reader = TocReader::new(&data, &mut sink);
        let value = rule(state, &mut reader)?;
        Ok((value, reader.position()))
    }

    #[test]
    fn bitrate_indicator_codes() -> Result<(), TocError> {
        let mut state = TocState::default();

        let mut bits = Bits::default();
        bits.put(3, 4);
        let (value, len) = with_reader(bits, &mut state, |_, r| bitrate_indicator(r))?;
        assert_eq!((value, len), (4, 3));

        let mut bits = Bits::default();
        bits.put(3, 0b101).put(2, 0b11);
        let (value, len) = with_reader(bits, &mut state, |_, r| bitrate_indicator(r))?;
        assert_eq!((value, len), (0b10111, 5));
        Ok(())
    }

    #[test]
    fn content_type_skips_language_tag() -> Result<(), TocError> {
        let mut bits = Bits::default();
        bits.put(3, 4).flag(true).flag(false).put(6, 2).put(16, 0x656E);
        let expected = bits.len();

        let mut state = TocState::default();
        let ((), len) = with_reader(bits, &mut state, content_type)?;
        assert_eq!(len, expected);
        assert_eq!(state.content_classifier, 4);
        Ok(())
    }

    #[test]
    fn chan_substream_with_back_channels() -> Result<(), TocError> {
        let mut state = TocState {
            fs_index: 1,
            ..Default::default()
        };
        state.set_group_frame_rate_factor(0, 2)?;

        let mut bits = Bits::default();
        bits.put(8, 0b1111_1101); // 7.1.4
        bits.flag(true).flag(false).put(2, 1); // back, centre, top channels
        bits.flag(true).flag(true); // sf multiplier
        bits.flag(false); // no bitrate
        bits.flag(true).flag(false); // two iframe flags
        bits.substream_index(4);
        let expected = bits.len();

        let ((), len) = with_reader(bits, &mut state, |s, r| {
            ac4_substream_info_chan(s, r, 0, true)
        })?;

        assert_eq!(len, expected);
        assert_eq!(state.referenced_substreams, [4, 5]);
        assert_eq!(state.last_referenced_substream, Some(5));
        assert_eq!(
            state.substreams,
            [SubstreamSummary {
                index: 4,
                signalled: true,
                coding: SubstreamCoding::Channel(ChannelMode(CHANNEL_MODE_714)),
                lfe: true,
            }]
        );
        Ok(())
    }

    #[test]
    fn implicit_indices_are_not_referenced() -> Result<(), TocError> {
        let mut state = TocState::default();
        state.set_group_frame_rate_factor(1, 1)?;

        let mut bits = Bits::default();
        bits.put(4, 0b1110); // 5.1
        bits.flag(false); // no bitrate
        bits.flag(false); // iframe

        let ((), _) = with_reader(bits, &mut state, |s, r| {
            ac4_substream_info_chan(s, r, 1, false)
        })?;

        assert!(state.referenced_substreams.is_empty());
        assert_eq!(state.substreams[0].index, 100);
        assert_eq!(
            state.substreams[0].coding,
            SubstreamCoding::Channel(ChannelMode(CHANNEL_MODE_51))
        );
        assert!(state.substreams[0].lfe);
        assert_eq!(state.next_backup_index(), 101);
        Ok(())
    }

    #[test]
    fn reserved_object_without_channels() {
        let mut state = TocState::default();

        let mut bits = Bits::default();
        bits.put(3, 0); // n_objects_code: no channels
        bits.flag(false).flag(false).flag(false); // not dynamic, not bed, not isf
        bits.put(4, 1).put(8, 0xFF); // one reserved byte

        let result = with_reader(bits, &mut state, |s, r| ac4_substream_info_obj(s, r, 0, true));
        assert!(matches!(result, Err(TocError::ReservedObjectWithoutChannels)));
    }

    #[test]
    fn bed_objects_track_lfe() -> Result<(), TocError> {
        let mut state = TocState::default();
        state.set_group_frame_rate_factor(0, 1)?;

        let mut bits = Bits::default();
        bits.put(3, 4); // 5 channels
        bits.flag(false).flag(true); // bed objects
        bits.flag(true).flag(false).flag(false); // bed start, mask, standard
        bits.put(10, 1 << 2 | 1 << 9 | 1); // L/R, LFE, LFE2
        bits.flag(false); // no bitrate
        bits.flag(false); // iframe
        bits.substream_index(0);
        let expected = bits.len();

        let ((), len) = with_reader(bits, &mut state, |s, r| ac4_substream_info_obj(s, r, 0, true))?;

        assert_eq!(len, expected);
        assert_eq!(state.num_lfe, 2);
        assert!(state.b_bed_objects_prev);
        assert!(state.substreams[0].lfe);
        Ok(())
    }

    #[test]
    fn bed_dyn_obj_assignment_signal_list() -> Result<(), TocError> {
        let mut state = TocState::default();

        // 5 signals: 3 bits of n_bed_signals_minus1, then 4 bits per signal
        let mut bits = Bits::default();
        bits.flag(false).flag(false).flag(false).flag(false);
        bits.put(3, 1);
        bits.put(4, 0).put(4, 3);
        let expected = bits.len();

        let (lfe, len) = with_reader(bits, &mut state, |_, r| bed_dyn_obj_assignment(r, 5))?;
        assert_eq!(len, expected);
        assert!(lfe);

        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(9), 4);
        Ok(())
    }

    #[test]
    fn bed_signal_count_flags_lfe() -> Result<(), TocError> {
        let mut state = TocState::default();

        // 3 signals, none assigned to an LFE position
        let mut bits = Bits::default();
        bits.flag(false).flag(false).flag(false).flag(false);
        bits.put(2, 2);
        bits.put(4, 0).put(4, 1).put(4, 2);
        let expected = bits.len();

        let (lfe, len) = with_reader(bits, &mut state, |_, r| bed_dyn_obj_assignment(r, 3))?;
        assert_eq!(len, expected);
        assert!(lfe);

        // 2 signals of the same kind do not
        let mut bits = Bits::default();
        bits.flag(false).flag(false).flag(false).flag(false);
        bits.put(2, 1);
        bits.put(4, 0).put(4, 1);

        let (lfe, _) = with_reader(bits, &mut state, |_, r| bed_dyn_obj_assignment(r, 3))?;
        assert!(!lfe);
        Ok(())
    }

    fn assert_overflow<T: std::fmt::Debug>(result: Result<T, TocError>) {
        assert!(
            matches!(result, Err(TocError::Io(ref e)) if e.kind() == io::ErrorKind::InvalidData),
            "{result:?}"
        );
    }

    #[test]
    fn saturated_upmix_signal_count() {
        let mut state = TocState::default();

        let mut bits = Bits::default();
        bits.flag(false); // lfe
        bits.flag(true); // static downmix
        bits.flag(false); // no oamd common data
        bits.put(4, 15).variable_bits(3, u64::MAX - 15);

        assert_overflow(with_reader(bits, &mut state, |s, r| {
            ac4_substream_info_ajoc(s, r, 0, true)
        }));
    }

    #[test]
    fn saturated_additional_data_size() {
        let mut state = TocState::default();

        let mut bits = Bits::default();
        bits.flag(true).flag(false); // default screen ratio, chan distribute
        bits.flag(true).put(1, 1).variable_bits(2, u64::MAX - 1);

        assert_overflow(with_reader(bits, &mut state, |_, r| oamd_common_data(r)));
    }

    #[test]
    fn saturated_group_substream_count() {
        let mut state = TocState::default();

        let mut bits = Bits::default();
        bits.flag(true).flag(false); // present, no hsf extension
        bits.flag(false).put(2, 3).variable_bits(2, u64::MAX - 3);

        assert_overflow(with_reader(bits, &mut state, |s, r| {
            ac4_substream_group_info(s, r, 0)
        }));
    }

    #[test]
    fn ajoc_substream() -> Result<(), TocError> {
        let mut state = TocState::default();
        state.set_group_frame_rate_factor(0, 1)?;

        let mut bits = Bits::default();
        bits.flag(true); // lfe
        bits.flag(true); // static downmix
        bits.flag(true); // oamd common data
        bits.flag(true).flag(false); // default screen ratio, chan distribute
        bits.flag(true).put(1, 0); // one additional byte
        bits.put(8, 0x42);
        bits.put(4, 15).variable_bits(3, 2); // 18 upmix signals
        bits.flag(true); // dynamic objects only
        bits.flag(false); // no bitrate
        bits.flag(true); // iframe
        bits.substream_index(1);
        let expected = bits.len();

        let ((), len) = with_reader(bits, &mut state, |s, r| ac4_substream_info_ajoc(s, r, 0, true))?;

        assert_eq!(len, expected);
        assert_eq!(state.substreams[0].coding, SubstreamCoding::Ajoc);
        assert!(state.substreams[0].lfe);
        assert_eq!(state.last_referenced_substream, Some(1));
        Ok(())
    }

    #[test]
    fn object_group_with_oamd_and_hsf() -> Result<(), TocError> {
        let mut state = TocState {
            bitstream_version: 2,
            ..Default::default()
        };
        state.set_group_frame_rate_factor(0, 1)?;

        let mut bits = Bits::default();
        bits.flag(true); // substreams present
        bits.flag(true); // hsf extension
        bits.flag(false).put(2, 0); // two substreams
        bits.flag(false); // object coded
        bits.flag(true).flag(false).substream_index(0); // oamd substream

        for index in [1, 3] {
            bits.flag(false); // not A-JOC
            bits.put(3, 2).flag(true).flag(false); // dynamic, no lfe
            bits.flag(false).flag(true); // no bitrate, iframe
            bits.substream_index(index);
            bits.substream_index(index + 1); // hsf extension
        }
        bits.flag(false); // no content type
        let expected = bits.len();

        let ((), len) = with_reader(bits, &mut state, |s, r| ac4_substream_group_info(s, r, 0))?;

        assert_eq!(len, expected);
        assert_eq!(state.referenced_substreams, [0, 1, 2, 3, 4]);
        assert_eq!(state.substreams.len(), 2);
        Ok(())
    }
}
