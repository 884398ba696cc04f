use std::io;

#[derive(thiserror::Error, Debug)]
pub enum TocError {
    #[error("protection_length_primary == 0 is reserved")]
    ReservedProtectionLength,

    #[error("frame_rate_index must be in range 0..13. Read {0}")]
    FrameRateIndexOutOfRange(u32),

    #[error("44.1kHz sampling rate requires frame_rate_index 13. Read {0}")]
    IllegalFrameRateFor44k(u32),

    #[error(
        "n_substreams ({n_substreams}) indicated by substream_index_table does not cover last referenced substream {last_referenced}"
    )]
    SubstreamCountTooSmall {
        n_substreams: u64,
        last_referenced: u64,
    },

    #[error("No non-LFE objects (of OAMD_OBJECT_TYPE_RESERVED) in substream")]
    ReservedObjectWithoutChannels,

    #[error("Unknown channel mode: {0}")]
    UnknownChannelMode(u32),

    #[error("Cannot convert extended channel mode {0} to ch_mode")]
    ExtendedChannelModeUnmapped(u32),

    #[error("Wrong add_data_bytes_minus1 size indication: {declared_bits} bits declared, {used_bits} used")]
    NegativeAdditionalData { declared_bits: u64, used_bits: u64 },

    #[error("Negative padding in presentation_config_ext_info: {skip_bits} bits to skip, {read_bits} read")]
    NegativePadding { skip_bits: u64, read_bits: u64 },

    #[error("Substream index {0} exceeds the supported range")]
    SubstreamIndexOverflow(u64),

    #[error("TOC runs past the end of the sample: bit {position} of {len}")]
    Truncated { position: u64, len: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MutateError {
    #[error("Bit range out of bounds: offset {offset}, width {width}, buffer length {len} bytes")]
    OutOfBounds { offset: u64, width: u64, len: usize },

    #[error("Value {value:#X} does not fit in {width} bits")]
    ValueTooWide { value: u64, width: u32 },

    #[error("Bit field widths are limited to 64 bits. Got {0}")]
    WidthTooLarge(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum RewriteError {
    #[error("TOC parse failed: {0}")]
    Toc(#[from] TocError),

    #[error("Edit rejected: {0}")]
    Mutate(#[from] MutateError),

    #[error("Encountered a presentation_id without a presentation at bit {position}")]
    OrphanPresentationId { position: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Invalid sync word: {0:#06X}")]
    InvalidSyncWord(u16),

    #[error("Insufficient buffer data for frame extraction")]
    InsufficientData,

    #[error("Sync frame declares {0} bytes, too short for a raw AC-4 frame")]
    FrameTooShort(usize),
}
