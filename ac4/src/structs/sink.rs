//! Parse-time event sinks.
//!
//! The grammar reports its instrumented fields through [`TocEventSink`]. All
//! hooks default to doing nothing, so a sink only implements the moments it
//! is interested in.

use log::trace;

use crate::structs::toc_element::{EventKind, FieldSet, TocElement, TocField};

pub trait TocEventSink {
    /// A variable-width helper is about to read `field`.
    fn before_call(&mut self, _field: TocField, _params: &[u32], _position: u64) {}

    /// The helper reading `field` returned `value`.
    fn after_call(&mut self, _field: TocField, _value: u64, _position: u64) {}

    /// A fixed-width field was read. `position` is the bit after the field.
    fn write_uint(&mut self, _field: TocField, _width: u32, _value: u64, _position: u64) {}

    /// Byte-alignment padding was read. `position` is the bit after the padding.
    fn write_align(&mut self, _width: u32, _value: u64, _position: u64) {}

    /// An explicit position capture with no value.
    fn after_position(&mut self, _field: TocField, _position: u64) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TocEventSink for NullSink {}

/// Forwards events for a chosen set of fields to a callback as
/// [`TocElement`]s.
pub struct FilteringSink<F>
where
    F: FnMut(TocElement),
{
    fields: FieldSet,
    callback: F,
}

impl<F> FilteringSink<F>
where
    F: FnMut(TocElement),
{
    pub fn new(fields: FieldSet, callback: F) -> Self {
        Self { fields, callback }
    }

    #[inline(always)]
    fn report(
        &mut self,
        name: TocField,
        value: Option<u64>,
        width: Option<u32>,
        position: u64,
        kind: EventKind,
    ) {
        if self.fields.contains(name) {
            (self.callback)(TocElement {
                name,
                value,
                width,
                position,
                kind,
            });
        }
    }
}

impl<F> TocEventSink for FilteringSink<F>
where
    F: FnMut(TocElement),
{
    fn before_call(&mut self, field: TocField, params: &[u32], position: u64) {
        if self.fields.contains(field) {
            trace!("{field}: before_call{params:?} at bit {position}");
        }
        self.report(field, None, None, position, EventKind::BeforeCall);
    }

    fn after_call(&mut self, field: TocField, value: u64, position: u64) {
        self.report(field, Some(value), None, position, EventKind::AfterCall);
    }

    fn write_uint(&mut self, field: TocField, width: u32, value: u64, position: u64) {
        self.report(field, Some(value), Some(width), position, EventKind::WriteUint);
    }

    fn write_align(&mut self, width: u32, value: u64, position: u64) {
        self.report(
            TocField::ByteAlignment,
            Some(value),
            Some(width),
            position,
            EventKind::WriteAlign,
        );
    }

    fn after_position(&mut self, field: TocField, position: u64) {
        self.report(field, None, None, position, EventKind::AfterPosition);
    }
}

/// Records every event unfiltered.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub elements: Vec<TocElement>,
}

impl CollectingSink {
    pub fn into_elements(self) -> Vec<TocElement> {
        self.elements
    }
}

impl TocEventSink for CollectingSink {
    fn before_call(&mut self, field: TocField, _params: &[u32], position: u64) {
        self.elements.push(TocElement {
            name: field,
            value: None,
            width: None,
            position,
            kind: EventKind::BeforeCall,
        });
    }

    fn after_call(&mut self, field: TocField, value: u64, position: u64) {
        self.elements.push(TocElement {
            name: field,
            value: Some(value),
            width: None,
            position,
            kind: EventKind::AfterCall,
        });
    }

    fn write_uint(&mut self, field: TocField, width: u32, value: u64, position: u64) {
        self.elements.push(TocElement {
            name: field,
            value: Some(value),
            width: Some(width),
            position,
            kind: EventKind::WriteUint,
        });
    }

    fn write_align(&mut self, width: u32, value: u64, position: u64) {
        self.elements.push(TocElement {
            name: TocField::ByteAlignment,
            value: Some(value),
            width: Some(width),
            position,
            kind: EventKind::WriteAlign,
        });
    }

    fn after_position(&mut self, field: TocField, position: u64) {
        self.elements.push(TocElement {
            name: field,
            value: None,
            width: None,
            position,
            kind: EventKind::AfterPosition,
        });
    }
}
