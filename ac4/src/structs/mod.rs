//! TOC data model and grammar rules.

/// Normative channel mode tables.
pub mod channel_mode;
pub mod emdf;
/// `ac4_presentation_info()` and `ac4_presentation_v2_info()`.
pub mod presentation;
/// Event sinks receiving the instrumented fields.
pub mod sink;
pub mod substream;
/// `raw_ac4_frame()` and `ac4_toc()`.
pub mod toc;
pub mod toc_element;
