//! Channel modes and the tables keyed by them.
//!
//! `channel_mode()` is a prefix code. The decoded value is the code word
//! itself, e.g. `0b1110` for 5.1, which is also the key used by the tables
//! below.

use std::fmt::Display;

use crate::process::parse::TocReader;
use crate::utils::errors::TocError;

pub const CHANNEL_MODE_MONO: u32 = 0;
pub const CHANNEL_MODE_STEREO: u32 = 2;
pub const CHANNEL_MODE_30: u32 = 12;
pub const CHANNEL_MODE_50: u32 = 13;
pub const CHANNEL_MODE_51: u32 = 14;
pub const CHANNEL_MODE_70_34: u32 = 120;
pub const CHANNEL_MODE_71_34: u32 = 121;
pub const CHANNEL_MODE_70_52: u32 = 122;
pub const CHANNEL_MODE_71_52: u32 = 123;
pub const CHANNEL_MODE_70_322: u32 = 124;
pub const CHANNEL_MODE_71_322: u32 = 125;
pub const CHANNEL_MODE_704: u32 = 252;
pub const CHANNEL_MODE_714: u32 = 253;
pub const CHANNEL_MODE_904: u32 = 508;
pub const CHANNEL_MODE_914: u32 = 509;
pub const CHANNEL_MODE_222: u32 = 510;

/// Escape code word; the actual mode follows as `variable_bits(2)`.
pub const CHANNEL_MODE_ESCAPE: u32 = 511;

/// Channel modes signalling the 4 back channels, center and top channel flags.
pub const BACK_CHANNEL_MODES: [u32; 4] = [
    CHANNEL_MODE_704,
    CHANNEL_MODE_714,
    CHANNEL_MODE_904,
    CHANNEL_MODE_914,
];

/// 7.x channel modes carrying an `add_ch_base` flag.
pub const ADD_CH_BASE_MODES: [u32; 4] = [
    CHANNEL_MODE_70_52,
    CHANNEL_MODE_71_52,
    CHANNEL_MODE_70_322,
    CHANNEL_MODE_71_322,
];

/// `ch_mode` indices of the layouts with an LFE channel.
pub const CH_MODES_WITH_LFE: [u32; 6] = [4, 6, 8, 10, 12, 14];

/// Channel counts indexed by the extended `ch_mode`.
const NUM_CHANNELS: [u32; 16] = [1, 2, 3, 5, 6, 7, 8, 7, 8, 7, 8, 11, 12, 13, 14, 24];

/// Reads a `channel_mode()` code word.
///
/// The two 7.x 3/4 code words collapse to stereo, as the core channel mode of
/// those streams is stereo.
pub fn channel_mode(reader: &mut TocReader) -> Result<u32, TocError> {
    let mut value = reader.get_n(1)? as u32;

    if value == 1 {
        value = (value << 1) + reader.get_n(1)? as u32;

        if value == 3 {
            value = (value << 2) + reader.get_n(2)? as u32;

            if value == 15 {
                value = (value << 3) + reader.get_n(3)? as u32;

                if value == CHANNEL_MODE_70_34 || value == CHANNEL_MODE_71_34 {
                    value = CHANNEL_MODE_STEREO;
                }
                if value == 126 {
                    value = (value << 1) + reader.get_n(1)? as u32;
                }
                if value == 127 {
                    value = (value << 2) + reader.get_n(2)? as u32;
                }
            }
        }
    }

    Ok(value)
}

/// `channel_mode()` followed by the escape extension a substream carries.
pub fn extended_channel_mode(reader: &mut TocReader) -> Result<u32, TocError> {
    let mut mode = channel_mode(reader)?;

    if mode == CHANNEL_MODE_ESCAPE {
        let extension = reader.get_variable_bits(2)?;
        mode = u32::try_from(extension)
            .ok()
            .and_then(|extension| mode.checked_add(extension))
            .ok_or(TocError::UnknownChannelMode(u32::MAX))?;
    }

    Ok(mode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMode(pub u32);

impl ChannelMode {
    /// Index of the mode among the known layouts, mono first.
    pub fn ch_mode(self) -> Result<u32, TocError> {
        let ch_mode = match self.0 {
            CHANNEL_MODE_MONO => 0,
            CHANNEL_MODE_STEREO => 1,
            CHANNEL_MODE_30 => 2,
            CHANNEL_MODE_50 => 3,
            CHANNEL_MODE_51 => 4,
            CHANNEL_MODE_70_34 => 5,
            CHANNEL_MODE_71_34 => 6,
            CHANNEL_MODE_70_52 => 7,
            CHANNEL_MODE_71_52 => 8,
            CHANNEL_MODE_70_322 => 9,
            CHANNEL_MODE_71_322 => 10,
            CHANNEL_MODE_704 => 11,
            CHANNEL_MODE_714 => 12,
            CHANNEL_MODE_904 => 13,
            CHANNEL_MODE_914 => 14,
            other => return Err(TocError::UnknownChannelMode(other)),
        };
        Ok(ch_mode)
    }

    /// Like [`Self::ch_mode`], extended with 22.2 as index 15.
    pub fn extended_ch_mode(self) -> Result<u32, TocError> {
        match self.0 {
            CHANNEL_MODE_222 => Ok(15),
            other => ChannelMode(other)
                .ch_mode()
                .map_err(|_| TocError::ExtendedChannelModeUnmapped(other)),
        }
    }

    /// Channel count including LFE channels.
    pub fn num_channels(self) -> Result<u32, TocError> {
        Ok(NUM_CHANNELS[self.extended_ch_mode()? as usize])
    }

    pub fn contains_lfe(self) -> bool {
        matches!(
            self.0,
            CHANNEL_MODE_51 | CHANNEL_MODE_71_34 | CHANNEL_MODE_71_52 | CHANNEL_MODE_71_322
        )
    }
}

impl Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            CHANNEL_MODE_MONO => "1.0",
            CHANNEL_MODE_STEREO => "2.0",
            CHANNEL_MODE_30 => "3.0",
            CHANNEL_MODE_50 => "5.0",
            CHANNEL_MODE_51 => "5.1",
            CHANNEL_MODE_70_34 => "7.0 (3/4/0)",
            CHANNEL_MODE_71_34 => "7.1 (3/4/0.1)",
            CHANNEL_MODE_70_52 => "7.0 (5/2/0)",
            CHANNEL_MODE_71_52 => "7.1 (5/2/0.1)",
            CHANNEL_MODE_70_322 => "7.0 (3/2/2)",
            CHANNEL_MODE_71_322 => "7.1 (3/2/2.1)",
            CHANNEL_MODE_704 => "7.0.4",
            CHANNEL_MODE_714 => "7.1.4",
            CHANNEL_MODE_904 => "9.0.4",
            CHANNEL_MODE_914 => "9.1.4",
            CHANNEL_MODE_222 => "22.2",
            other => return write!(f, "reserved ({other})"),
        };
        f.write_str(name)
    }
}
