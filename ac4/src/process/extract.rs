use std::collections::VecDeque;
use std::ops::Range;

use log::{debug, warn};

use crate::structs::toc::FRAME_SIZE_ESCAPE;
use crate::utils::errors::ExtractError;

/// Sync word of a frame without a trailing CRC word.
pub const SYNC_WORD: u16 = 0xAC40;

/// Sync word of a frame followed by a 16-bit CRC word.
pub const SYNC_WORD_CRC: u16 = 0xAC41;

/// Smallest `frame_size()` accepted as a raw AC-4 frame.
pub const MIN_RAW_FRAME_LEN: usize = 3;

const CRC_LEN: usize = 2;
const SHORT_HEADER_LEN: usize = 4;
const LONG_HEADER_LEN: usize = 7;

/// Extracts AC-4 sync frames from an elementary stream.
///
/// Bytes between frames are skipped by searching for the next sync word.
///
/// # Example
///
/// ```rust,no_run
/// use ac4::process::extract::Extractor;
///
/// let mut extractor = Extractor::default();
/// extractor.push_bytes(&std::fs::read("stream.ac4")?);
///
/// for frame in extractor.by_ref().filter_map(Result::ok) {
///     println!(
///         "Frame at {} with {} raw bytes",
///         frame.offset,
///         frame.raw_frame().len()
///     );
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Extractor {
    buffer: VecDeque<u8>,
    locked: bool,
    io_counter: usize,
    /// Stream offset of the first buffered byte.
    offset: u64,
    skipped_bytes: u64,
    frames_processed: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            buffer: VecDeque::with_capacity(64 * 1024),
            locked: false,
            io_counter: 0,
            offset: 0,
            skipped_bytes: 0,
            frames_processed: 0,
        }
    }
}

impl Extractor {
    /// Adds stream bytes to the internal buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
        self.io_counter += 1;
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Bytes dropped while searching for sync words.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    fn resync(&mut self) -> Result<(), ExtractError> {
        self.locked = false;

        let found = self
            .buffer
            .iter()
            .zip(self.buffer.iter().skip(1))
            .position(|(&hi, &lo)| is_sync_word(u16::from_be_bytes([hi, lo])));

        let Some(start) = found else {
            // a trailing 0xAC may start the next sync word
            let keep = usize::from(self.buffer.back() == Some(&0xAC));
            let skip = self.buffer.len() - keep;
            if skip > 0 {
                debug!("No sync word in {skip} buffered bytes");
                self.consume_front(skip);
                self.skipped_bytes += skip as u64;
            }
            return self.insufficient();
        };

        if start > 0 {
            warn!(
                "Skipped {start} bytes before sync word at offset {}",
                self.offset + start as u64
            );
            self.consume_front(start);
            self.skipped_bytes += start as u64;
        }

        self.locked = true;
        Ok(())
    }

    fn consume_front(&mut self, cnt: usize) {
        self.buffer.drain(..cnt);
        self.offset += cnt as u64;
    }

    fn be_bytes(&self, range: Range<usize>) -> Option<usize> {
        range
            .map(|i| self.buffer.get(i).copied())
            .try_fold(0usize, |acc, byte| Some(acc << 8 | byte? as usize))
    }

    fn insufficient(&mut self) -> Result<(), ExtractError> {
        self.io_counter = self.io_counter.saturating_sub(1);
        Err(ExtractError::InsufficientData)
    }

    fn iter_insufficient(&mut self) -> Option<Result<SyncFrame, ExtractError>> {
        self.io_counter = self.io_counter.saturating_sub(1);
        Some(Err(ExtractError::InsufficientData))
    }
}

#[inline(always)]
fn is_sync_word(word: u16) -> bool {
    word == SYNC_WORD || word == SYNC_WORD_CRC
}

impl Iterator for Extractor {
    type Item = Result<SyncFrame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        if !self.locked && self.resync().is_err() {
            return None;
        }

        let Some(sync_word) = self.be_bytes(0..2).map(|word| word as u16) else {
            return self.iter_insufficient();
        };

        if !is_sync_word(sync_word) {
            self.locked = false;
            return Some(Err(ExtractError::InvalidSyncWord(sync_word)));
        }

        let Some(mut frame_size) = self.be_bytes(2..SHORT_HEADER_LEN) else {
            return self.iter_insufficient();
        };

        let mut header_len = SHORT_HEADER_LEN;
        if frame_size as u64 == FRAME_SIZE_ESCAPE {
            let Some(size) = self.be_bytes(SHORT_HEADER_LEN..LONG_HEADER_LEN) else {
                return self.iter_insufficient();
            };
            frame_size = size;
            header_len = LONG_HEADER_LEN;
        }

        if frame_size < MIN_RAW_FRAME_LEN {
            self.consume_front(2);
            self.locked = false;
            return Some(Err(ExtractError::FrameTooShort(frame_size)));
        }

        let has_crc = sync_word == SYNC_WORD_CRC;
        let total_len = header_len + frame_size + if has_crc { CRC_LEN } else { 0 };
        if self.buffer.len() < total_len {
            return self.iter_insufficient();
        }

        let offset = self.offset;
        let data = self.buffer.drain(..total_len).collect::<Vec<_>>();
        self.offset += total_len as u64;
        self.frames_processed += 1;

        Some(Ok(SyncFrame {
            offset,
            sync_word,
            header_len,
            frame_size,
            data,
        }))
    }
}

/// One `ac4_syncframe()`: header, raw AC-4 frame and the optional CRC word.
///
/// The raw frame starts with the TOC and can be rewritten in place through
/// [`SyncFrame::raw_frame_mut`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFrame {
    /// Stream offset of the sync word.
    pub offset: u64,
    pub sync_word: u16,
    /// Sync word plus `frame_size()`, 4 or 7 bytes.
    pub header_len: usize,
    pub frame_size: usize,
    pub data: Vec<u8>,
}

impl AsRef<[u8]> for SyncFrame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl SyncFrame {
    pub fn has_crc(&self) -> bool {
        self.sync_word == SYNC_WORD_CRC
    }

    /// Range of the raw frame within [`SyncFrame::data`].
    pub fn raw_range(&self) -> Range<usize> {
        self.header_len..self.header_len + self.frame_size
    }

    pub fn raw_frame(&self) -> &[u8] {
        &self.data[self.raw_range()]
    }

    pub fn raw_frame_mut(&mut self) -> &mut [u8] {
        let range = self.raw_range();
        &mut self.data[range]
    }
}

#[cfg(test)]
fn sync_frame(sync_word: u16, raw: &[u8]) -> Vec<u8> {
    let mut frame = sync_word.to_be_bytes().to_vec();
    if raw.len() < FRAME_SIZE_ESCAPE as usize {
        frame.extend_from_slice(&(raw.len() as u16).to_be_bytes());
    } else {
        frame.extend_from_slice(&[0xFF, 0xFF]);
        frame.extend_from_slice(&(raw.len() as u32).to_be_bytes()[1..]);
    }
    frame.extend_from_slice(raw);
    if sync_word == SYNC_WORD_CRC {
        frame.extend_from_slice(&[0x12, 0x34]);
    }
    frame
}

#[cfg(test)]
fn raw_frame() -> Vec<u8> {
    use crate::process::fixtures::{Presentation, TocBuilder};

    TocBuilder::v2()
        .presentation(Presentation::new(1, Some(4)))
        .presentation(Presentation::new(2, Some(7)))
        .build()
}

#[test]
fn back_to_back_frames() {
    let raw = raw_frame();
    let mut stream = sync_frame(SYNC_WORD, &raw);
    stream.extend(sync_frame(SYNC_WORD_CRC, &raw));
    stream.extend(sync_frame(SYNC_WORD, &raw));

    let mut extractor = Extractor::default();
    extractor.push_bytes(&stream);

    let frames: Vec<_> = extractor.by_ref().filter_map(Result::ok).collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(extractor.frames_processed(), 3);
    assert_eq!(extractor.skipped_bytes(), 0);

    assert!(!frames[0].has_crc());
    assert!(frames[1].has_crc());
    assert_eq!(frames[1].offset, raw.len() as u64 + 4);
    assert_eq!(frames[1].as_ref().len(), raw.len() + 6);
    assert_eq!(frames[2].offset, 2 * raw.len() as u64 + 10);

    for frame in &frames {
        assert_eq!(frame.header_len, 4);
        assert_eq!(frame.raw_frame(), raw.as_slice());
    }
}

#[test]
fn escaped_frame_size() {
    let mut raw = raw_frame();
    raw.resize(0x1_0010, 0x5A);

    let mut extractor = Extractor::default();
    extractor.push_bytes(&sync_frame(SYNC_WORD, &raw));

    let Some(Ok(frame)) = extractor.next() else {
        panic!("no frame extracted");
    };
    assert_eq!(frame.header_len, 7);
    assert_eq!(frame.frame_size, 0x1_0010);
    assert_eq!(frame.raw_range(), 7..7 + 0x1_0010);
}

#[test]
fn skip_invalid_data() {
    let raw = raw_frame();
    let mut stream = vec![0x00, 0xAC, 0x00];
    stream.extend(sync_frame(SYNC_WORD, &raw));
    stream.extend_from_slice(&[0xFF; 5]);
    stream.extend(sync_frame(SYNC_WORD, &raw));

    let mut extractor = Extractor::default();
    extractor.push_bytes(&stream);

    let mut frame_count = 0;
    let mut invalid_sync = None;
    let mut end_with_insufficient_data = false;
    for result in &mut extractor {
        match result {
            Ok(_) => frame_count += 1,
            Err(ExtractError::InvalidSyncWord(word)) => invalid_sync = Some(word),
            Err(ExtractError::InsufficientData) => end_with_insufficient_data = true,
            Err(_) => continue,
        }
    }

    assert_eq!(frame_count, 2);
    assert_eq!(invalid_sync, Some(0xFFFF));
    assert_eq!(extractor.skipped_bytes(), 3 + 5);
    assert!(end_with_insufficient_data);
}

#[test]
fn frame_split_across_pushes() {
    let raw = raw_frame();
    let stream = sync_frame(SYNC_WORD_CRC, &raw);
    let (head, tail) = stream.split_at(stream.len() / 2);

    let mut extractor = Extractor::default();
    extractor.push_bytes(head);
    assert!(matches!(extractor.next(), Some(Err(ExtractError::InsufficientData))));
    assert!(extractor.next().is_none());

    extractor.push_bytes(tail);
    let Some(Ok(frame)) = extractor.next() else {
        panic!("no frame extracted");
    };
    assert_eq!(frame.data, stream);
    assert_eq!(frame.offset, 0);
}

#[test]
fn too_short_frame_size() {
    let raw = raw_frame();
    let mut stream = vec![0xAC, 0x40, 0x00, 0x02, 0x00, 0x00];
    stream.extend(sync_frame(SYNC_WORD, &raw));

    let mut extractor = Extractor::default();
    extractor.push_bytes(&stream);

    assert!(matches!(extractor.next(), Some(Err(ExtractError::FrameTooShort(2)))));

    let Some(Ok(frame)) = extractor.next() else {
        panic!("no frame extracted");
    };
    assert_eq!(frame.offset, 6);
    assert_eq!(frame.raw_frame(), raw.as_slice());
}

#[test]
fn rewrite_inside_sync_frame() -> Result<(), crate::utils::errors::RewriteError> {
    use crate::process::rewrite::select_presentation;

    let mut extractor = Extractor::default();
    extractor.push_bytes(&sync_frame(SYNC_WORD, &raw_frame()));

    let Some(Ok(mut frame)) = extractor.next() else {
        panic!("no frame extracted");
    };
    let len = frame.data.len();
    assert!(select_presentation(frame.raw_frame_mut(), Some(7))?);
    assert_eq!(frame.data.len(), len);
    assert_eq!(frame.data[..4], sync_frame(SYNC_WORD, &raw_frame())[..4]);
    Ok(())
}
