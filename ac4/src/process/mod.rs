/// Sync-frame extraction from AC-4 elementary streams.
///
/// Provides the [`Extractor`](extract::Extractor) yielding
/// [`SyncFrame`](extract::SyncFrame)s from continuous stream data.
pub mod extract;

/// TOC parsing.
///
/// Provides the [`TocParser`](parse::TocParser) walking one TOC and
/// [`extract_toc_elements`](parse::extract_toc_elements) collecting the
/// events for a [`FieldSet`](crate::structs::toc_element::FieldSet).
pub mod parse;

/// In-place presentation selection.
pub mod rewrite;

#[cfg(test)]
pub(crate) mod fixtures;
