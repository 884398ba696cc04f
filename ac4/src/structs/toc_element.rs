//! TOC field tags and the elements reported for them.
//!
//! Every instrumented point of the TOC grammar is identified by a
//! [`TocField`]. Consumers select the fields they care about with a
//! [`FieldSet`] and receive one [`TocElement`] per matching event.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TocField {
    PresentationLevel,
    BPresentationId,
    PresentationId,
    PayloadBaseMinus1,
    /// Padding that completes the TOC to a byte boundary.
    ByteAlignment,
    /// Position marker for the end of the TOC.
    Ac4TocEnd,

    BitstreamVersion,
    SequenceCounter,
    FsIndex,
    FrameRateIndex,
    BSinglePresentation,
    ShortProgramId,
    PresentationConfig,
    NSubstreams,
}

impl TocField {
    pub const ALL: [TocField; 14] = [
        TocField::PresentationLevel,
        TocField::BPresentationId,
        TocField::PresentationId,
        TocField::PayloadBaseMinus1,
        TocField::ByteAlignment,
        TocField::Ac4TocEnd,
        TocField::BitstreamVersion,
        TocField::SequenceCounter,
        TocField::FsIndex,
        TocField::FrameRateIndex,
        TocField::BSinglePresentation,
        TocField::ShortProgramId,
        TocField::PresentationConfig,
        TocField::NSubstreams,
    ];

    /// Syntax element name as written in the bitstream syntax tables.
    pub const fn name(self) -> &'static str {
        match self {
            TocField::PresentationLevel => "presentation_level",
            TocField::BPresentationId => "b_presentation_id",
            TocField::PresentationId => "presentation_id",
            TocField::PayloadBaseMinus1 => "payload_base_minus1",
            TocField::ByteAlignment => "byte_alignment",
            TocField::Ac4TocEnd => "ac4_toc_end",
            TocField::BitstreamVersion => "bitstream_version",
            TocField::SequenceCounter => "sequence_counter",
            TocField::FsIndex => "fs_index",
            TocField::FrameRateIndex => "frame_rate_index",
            TocField::BSinglePresentation => "b_single_presentation",
            TocField::ShortProgramId => "short_program_id",
            TocField::PresentationConfig => "presentation_config",
            TocField::NSubstreams => "n_substreams",
        }
    }

    const fn mask(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for TocField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of [`TocField`]s, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet(u32);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);

    /// Fields the presentation rewriter needs.
    pub const REWRITE: FieldSet = FieldSet::of(&[
        TocField::PresentationLevel,
        TocField::BPresentationId,
        TocField::PresentationId,
        TocField::PayloadBaseMinus1,
        TocField::ByteAlignment,
        TocField::Ac4TocEnd,
    ]);

    /// Rewrite fields plus the informational header fields.
    pub const INFO: FieldSet = FieldSet::REWRITE
        .with(TocField::BitstreamVersion)
        .with(TocField::SequenceCounter)
        .with(TocField::FsIndex)
        .with(TocField::FrameRateIndex)
        .with(TocField::BSinglePresentation)
        .with(TocField::ShortProgramId)
        .with(TocField::PresentationConfig)
        .with(TocField::NSubstreams);

    pub const fn of(fields: &[TocField]) -> Self {
        let mut mask = 0;
        let mut i = 0;
        while i < fields.len() {
            mask |= fields[i].mask();
            i += 1;
        }
        FieldSet(mask)
    }

    pub const fn all() -> Self {
        FieldSet::of(&TocField::ALL)
    }

    #[must_use]
    pub const fn with(self, field: TocField) -> Self {
        FieldSet(self.0 | field.mask())
    }

    #[inline(always)]
    pub const fn contains(self, field: TocField) -> bool {
        self.0 & field.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = TocField> {
        TocField::ALL
            .into_iter()
            .filter(move |&field| self.contains(field))
    }
}

impl FromIterator<TocField> for FieldSet {
    fn from_iter<T: IntoIterator<Item = TocField>>(iter: T) -> Self {
        iter.into_iter().fold(FieldSet::EMPTY, FieldSet::with)
    }
}

/// Which sink hook produced an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BeforeCall,
    AfterCall,
    WriteUint,
    WriteAlign,
    AfterPosition,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::BeforeCall => "before_call",
            EventKind::AfterCall => "after_call",
            EventKind::WriteUint => "write_uint",
            EventKind::WriteAlign => "write_align",
            EventKind::AfterPosition => "after_position",
        };
        f.write_str(name)
    }
}

/// One reported TOC event.
///
/// `position` is the bit position at the time of the event. For
/// [`EventKind::WriteUint`] and [`EventKind::WriteAlign`] that is the position
/// after the field; [`TocElement::start`] gives the first bit of the field.
/// [`EventKind::BeforeCall`] carries the position before the helper runs and
/// [`EventKind::AfterCall`] the position after it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocElement {
    pub name: TocField,
    pub value: Option<u64>,
    pub width: Option<u32>,
    pub position: u64,
    pub kind: EventKind,
}

impl TocElement {
    #[inline(always)]
    pub fn start(&self) -> u64 {
        self.position - self.width.unwrap_or(0) as u64
    }
}
