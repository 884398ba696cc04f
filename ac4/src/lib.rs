#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Every raw AC-4 frame starts with a table of contents (TOC) listing the
//! presentations of the frame, the substreams they reference and where the
//! substream payload begins.
//!
//! ### Parsing
//!
//! The TOC grammar is walked bit by bit for bitstream versions 0 to 2. The
//! parser reports instrumented fields to a [`structs::sink::TocEventSink`];
//! [`structs::sink::FilteringSink`] turns them into
//! [`structs::toc_element::TocElement`]s for a chosen field set.
//!
//! ### Rewriting
//!
//! [`process::rewrite`] keeps one presentation decodable. The others are
//! marked with `presentation_level` 7 and every `presentation_id` is removed
//! from the TOC. `payload_base_minus1` absorbs the freed bytes, so the
//! sample length and the payload position do not change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ac4::process::extract::Extractor;
//! use ac4::process::rewrite::select_presentation;
//!
//! let mut extractor = Extractor::default();
//! extractor.push_bytes(&std::fs::read("stream.ac4")?);
//!
//! for frame in extractor.by_ref() {
//!     let Ok(mut frame) = frame else { continue };
//!     if select_presentation(frame.raw_frame_mut(), Some(2))? {
//!         println!("Rewrote frame at offset {}", frame.offset);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Stream processing.
///
/// 1. **Extraction** ([`process::extract`]): sync frames from elementary streams.
/// 2. **Parsing** ([`process::parse`]): TOC walk and element collection.
/// 3. **Rewriting** ([`process::rewrite`]): presentation selection in place.
pub mod process;

/// Data structures and grammar rules of the TOC.
///
/// - **Elements** ([`structs::toc_element`]): field tags and field sets
/// - **Sinks** ([`structs::sink`]): event consumers
/// - **TOC** ([`structs::toc`]): top level syntax
/// - **Presentations** ([`structs::presentation`]): presentation info
/// - **Substreams** ([`structs::substream`]): substream and group info
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): bit-level reading
/// - **Bit Operations** ([`utils::bit_ops`]): in-place bit field edits
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
