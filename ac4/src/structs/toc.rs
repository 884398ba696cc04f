//! Top level TOC syntax: `raw_ac4_frame()` up to the end of `ac4_toc()`.

use crate::process::parse::{TocReader, TocState};
use crate::structs::presentation::{ac4_presentation_info, ac4_presentation_v2_info};
use crate::structs::substream::{SubstreamSummary, ac4_substream_group_info};
use crate::structs::toc_element::TocField;
use crate::utils::errors::TocError;

/// `frame_rate_index` signalling 2048 samples per frame, the only rate
/// allowed at 44.1 kHz.
pub const FRAME_RATE_INDEX_44K: u8 = 13;

/// Frame length in samples per `frame_rate_index`.
pub const FRAME_LEN_BASE: [u32; 14] = [
    1920, 1920, 2048, 1536, 1536, 960, 960, 1024, 768, 768, 512, 384, 384, 2048,
];

/// `frame_size()` escape value announcing a 24-bit frame size.
pub const FRAME_SIZE_ESCAPE: u64 = 0xFFFF;

/// What a TOC walk leaves behind besides the sink events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocSummary {
    pub bitstream_version: u64,
    pub sequence_counter: u64,
    pub fs_index: u8,
    pub frame_rate_index: u8,
    pub frame_len_base: u32,
    pub n_presentations: u64,
    pub short_program_id: Option<u64>,
    pub n_substreams: u64,
    pub substream_sizes: Vec<u64>,
    pub substreams: Vec<SubstreamSummary>,
    /// Bit position right after the byte alignment of the TOC.
    pub toc_end: u64,
}

pub fn raw_ac4_frame_toc_only(
    state: &mut TocState,
    reader: &mut TocReader,
) -> Result<TocSummary, TocError> {
    let mut summary = ac4_toc(state, reader)?;

    summary.toc_end = reader.position();
    reader.mark_position(TocField::Ac4TocEnd);

    summary.frame_len_base = FRAME_LEN_BASE[summary.frame_rate_index as usize];
    summary.substreams = std::mem::take(&mut state.substreams);

    Ok(summary)
}

pub fn ac4_toc(state: &mut TocState, reader: &mut TocReader) -> Result<TocSummary, TocError> {
    let mut summary = TocSummary::default();

    let version = reader.write_uint(TocField::BitstreamVersion, 2)?;
    state.bitstream_version = reader.extend_if_escaped(version, 2, 2)?;
    summary.bitstream_version = state.bitstream_version;

    summary.sequence_counter = reader.write_uint(TocField::SequenceCounter, 10)?;

    // b_wait_frames
    if reader.get()? {
        let wait_frames = reader.get_n(3)?;
        if wait_frames > 0 {
            reader.get_n(2)?; // reserved
        }
    }

    state.fs_index = reader.write_uint(TocField::FsIndex, 1)? as u8;
    state.frame_rate_index = reader.write_uint(TocField::FrameRateIndex, 4)? as u8;

    if state.frame_rate_index > FRAME_RATE_INDEX_44K {
        return Err(TocError::FrameRateIndexOutOfRange(state.frame_rate_index as u32));
    }
    if state.fs_index == 0 && state.frame_rate_index != FRAME_RATE_INDEX_44K {
        return Err(TocError::IllegalFrameRateFor44k(state.frame_rate_index as u32));
    }
    summary.fs_index = state.fs_index;
    summary.frame_rate_index = state.frame_rate_index;

    reader.get()?; // b_iframe_global

    let n_presentations = if reader.write_uint(TocField::BSinglePresentation, 1)? == 1 {
        1
    } else if reader.get()? {
        // b_more_presentations
        reader.get_variable_bits(2)?.saturating_add(2)
    } else {
        0
    };
    summary.n_presentations = n_presentations;

    // b_payload_base
    if reader.get()? {
        let payload_base_minus1 = reader.write_uint(TocField::PayloadBaseMinus1, 5)?;
        // payload_base is only needed to locate the substreams
        reader.extend_if_escaped(payload_base_minus1, 5, 3)?;
    }

    if state.bitstream_version <= 1 {
        state.group_cursor = 0;
        for i in 0..n_presentations {
            reader.ensure_in_bounds()?;
            state.presentation_index = i as usize;
            ac4_presentation_info(state, reader)?;
        }
    } else {
        // b_program_id
        if reader.get()? {
            summary.short_program_id = Some(reader.write_uint(TocField::ShortProgramId, 16)?);

            // b_program_uuid_present
            if reader.get()? {
                reader.skip_n(16 * 8)?; // program_uuid
            }
        }

        let mut total_n_substream_groups = 0;
        for i in 0..n_presentations {
            reader.ensure_in_bounds()?;
            state.presentation_index = i as usize;
            ac4_presentation_v2_info(state, reader)?;

            if let Some(&max) = state.current_presentation_groups().iter().max() {
                total_n_substream_groups = total_n_substream_groups.max(max + 1);
            }
        }

        for group in 0..total_n_substream_groups {
            reader.ensure_in_bounds()?;
            ac4_substream_group_info(state, reader, group)?;
        }
    }

    substream_index_table(state, reader, &mut summary)?;

    reader.byte_align()?;
    reader.ensure_in_bounds()?;

    Ok(summary)
}

pub fn substream_index_table(
    state: &TocState,
    reader: &mut TocReader,
    summary: &mut TocSummary,
) -> Result<(), TocError> {
    let mut n_substreams = reader.write_uint(TocField::NSubstreams, 2)?;
    if n_substreams == 0 {
        n_substreams = reader.get_variable_bits(2)?.saturating_add(4);
    }
    summary.n_substreams = n_substreams;

    if let Some(last_referenced) = state.last_referenced_substream
        && n_substreams - 1 < last_referenced
    {
        return Err(TocError::SubstreamCountTooSmall {
            n_substreams,
            last_referenced,
        });
    }

    let b_size_present = if n_substreams == 1 { reader.get()? } else { true };

    if b_size_present {
        for _ in 0..n_substreams {
            reader.ensure_in_bounds()?;

            let b_more_bits = reader.get()?;
            let mut substream_size = reader.get_n(10)?;
            if b_more_bits {
                let more = reader.get_variable_bits(2)?;
                substream_size = substream_size.saturating_add(more.checked_shl(10).unwrap_or(u64::MAX));
            }
            summary.substream_sizes.push(substream_size);
        }
    }

    Ok(())
}

/// `frame_size()` of an AC-4 sync frame, in bytes.
pub fn frame_size(reader: &mut TocReader) -> Result<u64, TocError> {
    let frame_size = reader.get_n(16)?;
    if frame_size == FRAME_SIZE_ESCAPE {
        return Ok(reader.get_n(24)?);
    }
    Ok(frame_size)
}
