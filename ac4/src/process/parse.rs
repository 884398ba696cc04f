use std::io;

use log::trace;

use crate::structs::sink::{FilteringSink, TocEventSink};
use crate::structs::substream::SubstreamSummary;
use crate::structs::toc::{self, TocSummary};
use crate::structs::toc_element::{FieldSet, TocElement, TocField};
use crate::utils::bitstream_io::BitSource;
use crate::utils::errors::TocError;

/// Largest substream or group index used to size a lookup table.
pub const MAX_TABLE_INDEX: u64 = 1 << 16;

/// Index assigned to the first substream whose index is not transmitted.
pub const BACKUP_SUBSTREAM_INDEX_START: u64 = 100;

/// Walks the TOC of one raw AC-4 frame and reports events to a sink.
pub struct TocParser<'s> {
    sink: &'s mut dyn TocEventSink,
}

impl<'s> TocParser<'s> {
    pub fn new(sink: &'s mut dyn TocEventSink) -> Self {
        Self { sink }
    }

    /// Parses the TOC at the start of `sample`.
    ///
    /// A fresh [`TocState`] is used for every call; nothing carries over
    /// between samples.
    pub fn parse(&mut self, sample: &[u8]) -> Result<TocSummary, TocError> {
        let mut state = TocState::default();
        let mut reader = TocReader::new(sample, &mut *self.sink);

        let summary = toc::raw_ac4_frame_toc_only(&mut state, &mut reader)?;

        trace!(
            "TOC: version {}, {} presentation(s), {} substream(s), ends at bit {}",
            summary.bitstream_version,
            summary.n_presentations,
            summary.n_substreams,
            summary.toc_end
        );

        Ok(summary)
    }
}

/// Parses the TOC of `sample` and returns the events for `fields` in bit order.
pub fn extract_toc_elements(sample: &[u8], fields: FieldSet) -> Result<Vec<TocElement>, TocError> {
    let mut elements = Vec::new();
    let mut sink = FilteringSink::new(fields, |element| elements.push(element));

    TocParser::new(&mut sink).parse(sample)?;

    Ok(elements)
}

/// Parser context shared by every grammar rule of one TOC.
#[derive(Debug)]
pub struct TocState {
    pub bitstream_version: u64,
    pub fs_index: u8,
    pub frame_rate_index: u8,
    pub frame_rate_factor: u64,

    /// Highest substream index referenced so far.
    pub last_referenced_substream: Option<u64>,
    pub referenced_substreams: Vec<u64>,
    pub bk_substream_index: u64,

    pub presentation_index: usize,
    /// Next substream group read in place by a version 1 group specifier.
    pub group_cursor: u64,
    pub presentation_to_groups: Vec<Vec<u64>>,
    pub group_frame_rate_factor: Vec<u64>,

    pub b_bed_objects_prev: bool,
    pub num_lfe: u32,
    pub content_classifier: u8,

    pub substreams: Vec<SubstreamSummary>,
}

impl Default for TocState {
    fn default() -> Self {
        Self {
            bitstream_version: 0,
            fs_index: 0,
            frame_rate_index: 0,
            frame_rate_factor: 0,
            last_referenced_substream: None,
            referenced_substreams: Vec::new(),
            bk_substream_index: BACKUP_SUBSTREAM_INDEX_START,
            presentation_index: 0,
            group_cursor: 0,
            presentation_to_groups: Vec::new(),
            group_frame_rate_factor: Vec::new(),
            b_bed_objects_prev: false,
            num_lfe: 0,
            content_classifier: 0,
            substreams: Vec::new(),
        }
    }
}

impl TocState {
    pub fn reference_substream(&mut self, index: u64) {
        self.last_referenced_substream = Some(match self.last_referenced_substream {
            Some(last) => last.max(index),
            None => index,
        });
        self.referenced_substreams.push(index);
    }

    /// Hands out the next implicit substream index.
    pub fn next_backup_index(&mut self) -> u64 {
        let index = self.bk_substream_index;
        self.bk_substream_index += 1;
        index
    }

    /// Frame rate factor recorded for `group`, 0 when none was recorded.
    pub fn group_frame_rate_factor(&self, group: u64) -> u64 {
        usize::try_from(group)
            .ok()
            .and_then(|group| self.group_frame_rate_factor.get(group))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_group_frame_rate_factor(&mut self, group: u64, factor: u64) -> Result<(), TocError> {
        let slot = table_index(group)?;
        if self.group_frame_rate_factor.len() <= slot {
            self.group_frame_rate_factor.resize(slot + 1, 0);
        }
        self.group_frame_rate_factor[slot] = factor;
        Ok(())
    }

    pub fn current_presentation_groups(&mut self) -> &mut Vec<u64> {
        let index = self.presentation_index;
        if self.presentation_to_groups.len() <= index {
            self.presentation_to_groups.resize_with(index + 1, Vec::new);
        }
        &mut self.presentation_to_groups[index]
    }
}

#[inline(always)]
fn table_index(index: u64) -> Result<usize, TocError> {
    if index >= MAX_TABLE_INDEX {
        return Err(TocError::SubstreamIndexOverflow(index));
    }
    Ok(index as usize)
}

/// Bit source paired with the event sink of one parse.
pub struct TocReader<'a, 's> {
    bits: BitSource<'a>,
    sink: &'s mut dyn TocEventSink,
}

impl<'a, 's> TocReader<'a, 's> {
    pub fn new(sample: &'a [u8], sink: &'s mut dyn TocEventSink) -> Self {
        Self {
            bits: BitSource::from_slice(sample),
            sink,
        }
    }

    #[inline(always)]
    pub fn get_n(&mut self, n: u32) -> io::Result<u64> {
        self.bits.get_n(n)
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bits.get()
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u64) -> io::Result<()> {
        self.bits.skip_n(n)
    }

    #[inline(always)]
    pub fn get_variable_bits(&mut self, n: u32) -> io::Result<u64> {
        self.bits.get_variable_bits(n)
    }

    /// Reads `n` bits and, when all of them are set, adds `variable_bits(ext)`.
    #[inline(always)]
    pub fn get_n_extended(&mut self, n: u32, ext: u32) -> io::Result<u64> {
        let value = self.get_n(n)?;
        self.extend_if_escaped(value, n, ext)
    }

    #[inline(always)]
    pub fn extend_if_escaped(&mut self, value: u64, n: u32, ext: u32) -> io::Result<u64> {
        if value != (1 << n) - 1 {
            return Ok(value);
        }
        let extension = self.get_variable_bits(ext)?;
        self.checked_add(value, extension)
    }

    /// `get_n_extended(n, ext)` plus a fixed offset, as used for counts coded
    /// minus one or two.
    #[inline(always)]
    pub fn get_n_extended_plus(&mut self, n: u32, ext: u32, offset: u64) -> io::Result<u64> {
        let value = self.get_n_extended(n, ext)?;
        self.checked_add(value, offset)
    }

    /// Adds two decoded quantities, failing instead of wrapping.
    #[inline(always)]
    pub fn checked_add(&self, value: u64, offset: u64) -> io::Result<u64> {
        value.checked_add(offset).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Extended value overflows 64 bits at {}", self.position()),
            )
        })
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.bits.position()
    }

    /// Reads a fixed-width field and reports it.
    pub fn write_uint(&mut self, field: TocField, n: u32) -> io::Result<u64> {
        let value = self.get_n(n)?;
        self.sink.write_uint(field, n, value, self.bits.position());
        Ok(value)
    }

    /// Reads `variable_bits(n)` and reports it as a call to a helper.
    pub fn traced_variable_bits(&mut self, field: TocField, n: u32) -> io::Result<u64> {
        self.sink.before_call(field, &[n], self.bits.position());
        let value = self.get_variable_bits(n)?;
        self.sink.after_call(field, value, self.bits.position());
        Ok(value)
    }

    /// Reads the padding up to the next byte boundary and reports it.
    pub fn byte_align(&mut self) -> io::Result<()> {
        let width = ((8 - self.position() % 8) % 8) as u32;
        let value = self.bits.get_align(width)?;
        self.sink.write_align(width, value, self.bits.position());
        Ok(())
    }

    pub fn mark_position(&mut self, field: TocField) {
        self.sink.after_position(field, self.bits.position());
    }

    /// Fails once the grammar has consumed more bits than the sample holds.
    #[inline(always)]
    pub fn ensure_in_bounds(&self) -> Result<(), TocError> {
        if self.bits.is_past_end() {
            return Err(TocError::Truncated {
                position: self.bits.position(),
                len: self.bits.len_bits(),
            });
        }
        Ok(())
    }
}
