//! Presentation selection by rewriting the TOC of a sample in place.
//!
//! Every presentation other than the selected one gets the undecodable
//! `presentation_level`. All `presentation_id` fields are then removed: their
//! `b_presentation_id` flags are cleared and the TOC following each id is
//! shifted left over it. `payload_base_minus1` grows by the whole bytes this
//! frees, so the substream payload stays at its original byte position and
//! the sample keeps its length.
//!
//! A sample the selection does not apply to is left untouched and reported
//! as [`Outcome::Unmodified`] with the reason.

use std::fmt::Display;

use log::trace;

use crate::process::parse::extract_toc_elements;
use crate::structs::toc_element::{EventKind, FieldSet, TocElement, TocField};
use crate::utils::bit_ops::{check_bounds, check_value, set_bits, shift_left};
use crate::utils::errors::{MutateError, RewriteError};

/// `presentation_level` that no decoder selects.
pub const UNDECODABLE_PRESENTATION_LEVEL: u64 = 7;

/// `payload_base_minus1` value announcing a `variable_bits(3)` extension.
pub const PAYLOAD_BASE_MINUS1_ESCAPE: u64 = 31;

const MIN_PRESENTATIONS: usize = 2;

/// Location of one compressed sample inside a segment buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDescriptor {
    pub byte_offset: usize,
    pub byte_size: usize,
}

/// A TOC field as found by the parser: first bit, width and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub offset: u64,
    pub width: u32,
    pub value: u64,
}

impl BitField {
    fn from_element(element: &TocElement) -> Self {
        Self {
            offset: element.start(),
            width: element.width.unwrap_or(0),
            value: element.value.unwrap_or(0),
        }
    }
}

/// One presentation of a TOC: its level and the id that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationSlot {
    pub level: BitField,
    pub id: Option<BitField>,
}

/// The rewrite relevant fields of one TOC, in bit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocLayout {
    pub slots: Vec<PresentationSlot>,
    pub b_presentation_ids: Vec<BitField>,
    pub payload_base_minus1: Option<BitField>,
    /// Width of the padding that ends the TOC.
    pub byte_alignment: u32,
    pub toc_end: u64,
}

impl TocLayout {
    /// Parses `sample` and collects its layout.
    pub fn parse(sample: &[u8]) -> Result<Self, RewriteError> {
        let elements = extract_toc_elements(sample, FieldSet::REWRITE)?;
        Self::from_elements(&elements)
    }

    /// Groups the elements of [`FieldSet::REWRITE`] into presentation slots.
    ///
    /// Every `presentation_id` must belong to the last seen
    /// `presentation_level`, and a level carries at most one id.
    pub fn from_elements(elements: &[TocElement]) -> Result<Self, RewriteError> {
        let mut layout = TocLayout::default();
        let mut id_start = None;

        for element in elements {
            match (element.name, element.kind) {
                (TocField::PresentationLevel, _) => {
                    layout.slots.push(PresentationSlot {
                        level: BitField::from_element(element),
                        id: None,
                    });
                    id_start = None;
                }
                (TocField::BPresentationId, _) => {
                    layout.b_presentation_ids.push(BitField::from_element(element));
                }
                (TocField::PresentationId, EventKind::BeforeCall) => {
                    match layout.slots.last() {
                        Some(slot) if slot.id.is_none() => id_start = Some(element.position),
                        _ => {
                            return Err(RewriteError::OrphanPresentationId {
                                position: element.position,
                            });
                        }
                    }
                }
                (TocField::PresentationId, EventKind::AfterCall) => {
                    let (Some(slot), Some(start)) = (layout.slots.last_mut(), id_start.take()) else {
                        return Err(RewriteError::OrphanPresentationId {
                            position: element.position,
                        });
                    };
                    slot.id = Some(BitField {
                        offset: start,
                        width: (element.position - start) as u32,
                        value: element.value.unwrap_or(0),
                    });
                }
                (TocField::PayloadBaseMinus1, _) => {
                    layout.payload_base_minus1 = Some(BitField::from_element(element));
                }
                (TocField::ByteAlignment, _) => {
                    layout.byte_alignment = element.width.unwrap_or(0);
                }
                (TocField::Ac4TocEnd, _) => layout.toc_end = element.position,
                _ => {}
            }
        }

        Ok(layout)
    }

    /// Ids of the presentations, in TOC order.
    pub fn presentation_ids(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.slots.iter().map(|slot| slot.id.map(|id| id.value))
    }
}

/// Why a sample was left as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NoSelection,
    NoPayloadBase,
    TooFewPresentations(usize),
    MissingPresentationId,
    ActiveIdNotFound(u64),
    /// The grown `payload_base_minus1` does not fit its 5-bit field.
    PayloadBaseEscape,
}

impl Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skip::NoSelection => write!(f, "no presentation selected"),
            Skip::NoPayloadBase => write!(f, "TOC has no payload_base_minus1"),
            Skip::TooFewPresentations(n) => write!(f, "TOC has {n} presentation(s)"),
            Skip::MissingPresentationId => write!(f, "not every presentation carries an id"),
            Skip::ActiveIdNotFound(id) => write!(f, "presentation id {id} not in TOC"),
            Skip::PayloadBaseEscape => write!(f, "payload_base_minus1 would need an extension"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rewritten { muted: usize, freed_bytes: u64 },
    Unmodified(Skip),
}

impl Outcome {
    pub fn is_modified(&self) -> bool {
        matches!(self, Outcome::Rewritten { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    SetBits { offset: u64, width: u32, value: u64 },
    ShiftLeft { offset: u64, width: u64, shift: u32 },
}

impl Edit {
    fn check(&self, data: &[u8]) -> Result<(), MutateError> {
        match *self {
            Edit::SetBits {
                offset,
                width,
                value,
            } => {
                check_value(width, value)?;
                check_bounds(data, offset, width as u64)
            }
            Edit::ShiftLeft { offset, width, .. } => check_bounds(data, offset, width),
        }
    }

    fn apply(&self, data: &mut [u8]) -> Result<(), MutateError> {
        match *self {
            Edit::SetBits {
                offset,
                width,
                value,
            } => set_bits(data, offset, width, value),
            Edit::ShiftLeft {
                offset,
                width,
                shift,
            } => shift_left(data, offset, width, shift),
        }
    }
}

/// The mutations selecting one presentation of one sample.
///
/// All offsets refer to the sample as parsed. Field writes come first and
/// the shifts follow in descending offset order, so no edit moves a bit a
/// later edit still has to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    edits: Vec<Edit>,
    muted: usize,
    freed_bytes: u64,
}

impl EditPlan {
    pub fn new(layout: &TocLayout, active_id: u64) -> Result<Self, Skip> {
        let Some(payload_base_minus1) = layout.payload_base_minus1 else {
            return Err(Skip::NoPayloadBase);
        };

        if layout.slots.len() < MIN_PRESENTATIONS {
            return Err(Skip::TooFewPresentations(layout.slots.len()));
        }

        let mut ids = Vec::with_capacity(layout.slots.len());
        for slot in &layout.slots {
            ids.push(slot.id.ok_or(Skip::MissingPresentationId)?);
        }

        if ids.iter().all(|id| id.value != active_id) {
            return Err(Skip::ActiveIdNotFound(active_id));
        }

        let freed_bits = ids
            .iter()
            .fold(layout.byte_alignment as u64, |acc, id| acc + id.width as u64);
        let freed_bytes = freed_bits >> 3;

        let payload_base = payload_base_minus1.value + freed_bytes;
        if payload_base_minus1.value == PAYLOAD_BASE_MINUS1_ESCAPE
            || payload_base >= PAYLOAD_BASE_MINUS1_ESCAPE
        {
            return Err(Skip::PayloadBaseEscape);
        }

        let mut edits = Vec::new();
        let mut muted = 0;

        for (slot, id) in layout.slots.iter().zip(&ids) {
            if id.value != active_id {
                edits.push(Edit::SetBits {
                    offset: slot.level.offset,
                    width: slot.level.width,
                    value: UNDECODABLE_PRESENTATION_LEVEL,
                });
                muted += 1;
            }
        }

        edits.push(Edit::SetBits {
            offset: payload_base_minus1.offset,
            width: payload_base_minus1.width,
            value: payload_base,
        });

        edits.extend(layout.b_presentation_ids.iter().map(|flag| Edit::SetBits {
            offset: flag.offset,
            width: flag.width,
            value: 0,
        }));

        edits.extend(ids.iter().rev().map(|id| Edit::ShiftLeft {
            offset: id.offset,
            width: layout.toc_end.saturating_sub(id.offset),
            shift: id.width,
        }));

        Ok(Self {
            edits,
            muted,
            freed_bytes,
        })
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Checks every edit against `data` without writing anything.
    pub fn validate(&self, data: &[u8]) -> Result<(), MutateError> {
        self.edits.iter().try_for_each(|edit| edit.check(data))
    }

    /// Applies the plan. `data` is unchanged if any edit is out of range.
    pub fn apply(&self, data: &mut [u8]) -> Result<Outcome, MutateError> {
        self.validate(data)?;

        for edit in &self.edits {
            edit.apply(data)?;
        }

        Ok(Outcome::Rewritten {
            muted: self.muted,
            freed_bytes: self.freed_bytes,
        })
    }
}

/// Makes `active_id` the only decodable presentation of `sample`.
///
/// On error the sample is left unmodified.
pub fn rewrite_sample(sample: &mut [u8], active_id: Option<u64>) -> Result<Outcome, RewriteError> {
    let Some(active_id) = active_id else {
        return Ok(Outcome::Unmodified(Skip::NoSelection));
    };

    let layout = TocLayout::parse(sample)?;

    let plan = match EditPlan::new(&layout, active_id) {
        Ok(plan) => plan,
        Err(skip) => return Ok(Outcome::Unmodified(skip)),
    };

    let outcome = plan.apply(sample)?;
    trace!(
        "Selected presentation {active_id}: {} edit(s), {outcome:?}",
        plan.edits().len()
    );

    Ok(outcome)
}

/// Returns whether `sample` was modified.
pub fn select_presentation(sample: &mut [u8], active_id: Option<u64>) -> Result<bool, RewriteError> {
    Ok(rewrite_sample(sample, active_id)?.is_modified())
}

/// Rewrites every sample of `segment` independently.
///
/// A failing sample is left unmodified and does not stop the others.
pub fn select_presentation_in_samples(
    segment: &mut [u8],
    samples: &[SampleDescriptor],
    active_id: Option<u64>,
) -> Vec<Result<Outcome, RewriteError>> {
    samples
        .iter()
        .map(|sample| {
            let range = sample
                .byte_offset
                .checked_add(sample.byte_size)
                .filter(|&end| end <= segment.len())
                .map(|end| sample.byte_offset..end)
                .ok_or(MutateError::OutOfBounds {
                    offset: (sample.byte_offset as u64) << 3,
                    width: (sample.byte_size as u64) << 3,
                    len: segment.len(),
                })?;

            rewrite_sample(&mut segment[range], active_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fixtures::{Presentation, TocBuilder};
    use crate::process::parse::TocParser;
    use crate::structs::sink::NullSink;
    use crate::utils::errors::TocError;

    fn two_presentations() -> TocBuilder {
        TocBuilder::v2()
            .presentation(Presentation::new(1, Some(4)))
            .presentation(Presentation::new(2, Some(7)))
    }

    fn levels(sample: &[u8]) -> Result<Vec<u64>, RewriteError> {
        Ok(TocLayout::parse(sample)?
            .slots
            .iter()
            .map(|slot| slot.level.value)
            .collect())
    }

    /// Byte offset of the substream payload.
    fn payload_start(sample: &[u8]) -> Result<u64, RewriteError> {
        let layout = TocLayout::parse(sample)?;
        let payload_base = layout.payload_base_minus1.map_or(0, |field| field.value + 1);
        Ok(layout.toc_end / 8 + payload_base)
    }

    #[test]
    fn single_presentation_is_untouched() -> Result<(), RewriteError> {
        let mut sample = TocBuilder::v2()
            .presentation(Presentation::new(0, Some(5)))
            .build();
        let original = sample.clone();

        assert!(!select_presentation(&mut sample, Some(5))?);
        assert_eq!(sample, original);
        assert_eq!(
            rewrite_sample(&mut sample, Some(5))?,
            Outcome::Unmodified(Skip::TooFewPresentations(1))
        );
        Ok(())
    }

    #[test]
    fn second_presentation_selected() -> Result<(), RewriteError> {
        let mut sample = two_presentations().build();
        let original = sample.clone();
        let layout = TocLayout::parse(&sample)?;

        // variable_bits(2) of 4 and 7 are 6 bits each
        let freed_bytes = (layout.byte_alignment as u64 + 12) / 8;

        let outcome = rewrite_sample(&mut sample, Some(7))?;
        assert_eq!(outcome, Outcome::Rewritten { muted: 1, freed_bytes });
        assert_eq!(sample.len(), original.len());

        let rewritten = TocLayout::parse(&sample)?;
        assert_eq!(levels(&sample)?, [UNDECODABLE_PRESENTATION_LEVEL, 2]);
        assert_eq!(rewritten.presentation_ids().collect::<Vec<_>>(), [None, None]);
        assert_eq!(
            rewritten.payload_base_minus1.map(|field| field.value),
            Some(freed_bytes)
        );
        assert_eq!(rewritten.toc_end + freed_bytes * 8, layout.toc_end);

        // the substream payload does not move
        assert_eq!(payload_start(&sample)?, payload_start(&original)?);
        let start = payload_start(&original)? as usize;
        assert_eq!(sample[start..], original[start..]);
        Ok(())
    }

    #[test]
    fn first_presentation_selected_in_v1() -> Result<(), RewriteError> {
        let builder = TocBuilder::v1()
            .presentation(Presentation::new(0, Some(1)))
            .presentation(Presentation::new(3, Some(2)))
            .presentation(Presentation::new(1, Some(20)));
        let mut sample = builder.build();
        let original = sample.clone();

        assert!(select_presentation(&mut sample, Some(1))?);
        assert_eq!(levels(&sample)?, [0, 7, 7]);
        assert_eq!(payload_start(&sample)?, payload_start(&original)?);

        let mut sink = NullSink;
        let summary = TocParser::new(&mut sink).parse(&sample)?;
        assert_eq!(summary.n_presentations, 3);
        Ok(())
    }

    #[test]
    fn rewriting_twice_changes_nothing() -> Result<(), RewriteError> {
        let mut sample = two_presentations().build();
        assert!(select_presentation(&mut sample, Some(4))?);
        let once = sample.clone();

        assert_eq!(
            rewrite_sample(&mut sample, Some(4))?,
            Outcome::Unmodified(Skip::MissingPresentationId)
        );
        assert_eq!(sample, once);
        assert_eq!(levels(&sample)?, [1, UNDECODABLE_PRESENTATION_LEVEL]);
        Ok(())
    }

    #[test]
    fn inapplicable_selections() -> Result<(), RewriteError> {
        let mut sample = two_presentations().build();
        let original = sample.clone();

        assert_eq!(
            rewrite_sample(&mut sample, None)?,
            Outcome::Unmodified(Skip::NoSelection)
        );
        assert_eq!(
            rewrite_sample(&mut sample, Some(9))?,
            Outcome::Unmodified(Skip::ActiveIdNotFound(9))
        );
        assert_eq!(sample, original);

        let mut sample = two_presentations().payload_base_minus1(None).build();
        assert_eq!(
            rewrite_sample(&mut sample, Some(4))?,
            Outcome::Unmodified(Skip::NoPayloadBase)
        );

        let mut sample = TocBuilder::v2()
            .presentation(Presentation::new(1, Some(4)))
            .presentation(Presentation::new(2, None))
            .build();
        assert_eq!(
            rewrite_sample(&mut sample, Some(4))?,
            Outcome::Unmodified(Skip::MissingPresentationId)
        );
        Ok(())
    }

    #[test]
    fn payload_base_without_room() -> Result<(), RewriteError> {
        for value in [30, 31] {
            let mut sample = two_presentations().payload_base_minus1(Some(value)).build();
            let original = sample.clone();

            assert_eq!(
                rewrite_sample(&mut sample, Some(7))?,
                Outcome::Unmodified(Skip::PayloadBaseEscape)
            );
            assert_eq!(sample, original);
        }
        Ok(())
    }

    #[test]
    fn plan_orders_writes_before_shifts() -> Result<(), RewriteError> {
        let builder = TocBuilder::v2()
            .presentation(Presentation::new(1, Some(4)))
            .presentation(Presentation::new(2, Some(7)))
            .presentation(Presentation::new(3, Some(30)));
        let layout = TocLayout::parse(&builder.build())?;

        let plan = match EditPlan::new(&layout, 30) {
            Ok(plan) => plan,
            Err(skip) => panic!("unexpected skip: {skip}"),
        };

        let first_shift = plan
            .edits()
            .iter()
            .position(|edit| matches!(edit, Edit::ShiftLeft { .. }));
        assert_eq!(first_shift, Some(2 + 1 + 3));

        let shift_offsets: Vec<u64> = plan
            .edits()
            .iter()
            .filter_map(|edit| match edit {
                Edit::ShiftLeft { offset, width, .. } => {
                    assert_eq!(offset + width, layout.toc_end);
                    Some(*offset)
                }
                Edit::SetBits { .. } => None,
            })
            .collect();
        assert_eq!(shift_offsets.len(), 3);
        assert!(shift_offsets.windows(2).all(|pair| pair[0] > pair[1]));
        Ok(())
    }

    #[test]
    fn orphan_presentation_id() {
        let elements = [TocElement {
            name: TocField::PresentationId,
            value: None,
            width: None,
            position: 40,
            kind: EventKind::BeforeCall,
        }];

        assert!(matches!(
            TocLayout::from_elements(&elements),
            Err(RewriteError::OrphanPresentationId { position: 40 })
        ));
    }

    #[test]
    fn failed_edit_leaves_sample_intact() {
        let layout = TocLayout {
            slots: vec![
                PresentationSlot {
                    level: BitField {
                        offset: 0,
                        width: 3,
                        value: 0,
                    },
                    id: Some(BitField {
                        offset: 4,
                        width: 3,
                        value: 1,
                    }),
                },
                PresentationSlot {
                    level: BitField {
                        offset: 8,
                        width: 3,
                        value: 0,
                    },
                    id: Some(BitField {
                        offset: 12,
                        width: 3,
                        value: 2,
                    }),
                },
            ],
            b_presentation_ids: Vec::new(),
            payload_base_minus1: Some(BitField {
                offset: 16,
                width: 5,
                value: 0,
            }),
            byte_alignment: 2,
            toc_end: 64,
        };

        let plan = match EditPlan::new(&layout, 2) {
            Ok(plan) => plan,
            Err(skip) => panic!("unexpected skip: {skip}"),
        };

        // the shifts reach bit 64, past this buffer
        let mut data = [0xA5u8; 4];
        assert!(matches!(
            plan.apply(&mut data),
            Err(MutateError::OutOfBounds { .. })
        ));
        assert_eq!(data, [0xA5; 4]);
    }

    #[test]
    fn samples_are_independent() {
        let sample = two_presentations().build();
        let len = sample.len();

        let mut segment = Vec::new();
        segment.extend_from_slice(&sample);
        segment.extend_from_slice(&[0u8; 8]);
        segment.extend_from_slice(&sample);

        let samples = [
            SampleDescriptor {
                byte_offset: 0,
                byte_size: len,
            },
            SampleDescriptor {
                byte_offset: len,
                byte_size: 8,
            },
            SampleDescriptor {
                byte_offset: len + 8,
                byte_size: len,
            },
            SampleDescriptor {
                byte_offset: len + 8,
                byte_size: len + 1,
            },
        ];

        let results = select_presentation_in_samples(&mut segment, &samples, Some(7));
        assert_eq!(results.len(), 4);
        assert!(matches!(results[0], Ok(Outcome::Rewritten { muted: 1, .. })));
        assert!(matches!(results[1], Err(RewriteError::Toc(TocError::IllegalFrameRateFor44k(0)))));
        assert!(matches!(results[2], Ok(Outcome::Rewritten { muted: 1, .. })));
        assert!(matches!(
            results[3],
            Err(RewriteError::Mutate(MutateError::OutOfBounds { .. }))
        ));

        assert_eq!(segment[len..len + 8], [0u8; 8]);
        assert_eq!(segment[..len], segment[len + 8..]);
    }

    #[test]
    fn damaged_samples_fail_without_writing() -> Result<(), RewriteError> {
        let valid = two_presentations().build();
        let toc_bytes = (TocLayout::parse(&valid)?.toc_end / 8) as usize;

        // (sample, must fail)
        let mut cases: Vec<(Vec<u8>, bool)> = Vec::new();
        for cut in 0..valid.len() {
            cases.push((valid[..cut].to_vec(), cut < toc_bytes));
        }
        for index in 0..toc_bytes {
            let mut sample = valid.clone();
            sample[index] = 0xFF;
            cases.push((sample, false));
        }
        // every escape saturates before the data runs out
        cases.push((vec![0xFF; 16], true));
        cases.push((vec![0xFF; 64], true));

        let mut segment = Vec::new();
        let mut samples = Vec::new();
        for (sample, _) in &cases {
            samples.push(SampleDescriptor {
                byte_offset: segment.len(),
                byte_size: sample.len(),
            });
            segment.extend_from_slice(sample);
        }

        let results = select_presentation_in_samples(&mut segment, &samples, Some(7));
        assert_eq!(results.len(), cases.len());

        for (((original, must_fail), sample), result) in cases.iter().zip(&samples).zip(&results) {
            let bytes = &segment[sample.byte_offset..sample.byte_offset + sample.byte_size];
            if *must_fail {
                assert!(result.is_err(), "{original:02X?}: {result:?}");
            }
            if !matches!(result, Ok(Outcome::Rewritten { .. })) {
                assert_eq!(bytes, &original[..], "{result:?}");
            }
        }
        Ok(())
    }
}
