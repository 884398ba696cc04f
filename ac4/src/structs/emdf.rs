//! EMDF signalling inside the TOC.
//!
//! Only the framing is walked: version and key id, the optional payload
//! substream reference and the protection bits that follow.

use crate::process::parse::{TocReader, TocState};
use crate::utils::errors::TocError;

/// Protection bit counts indexed by `protection_length_secondary`. The primary
/// length uses the same table with code 0 reserved.
const PROTECTION_BITS: [u64; 4] = [0, 8, 32, 128];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmdfInfo {
    pub version: u64,
    pub key_id: u64,
    pub substream_index: Option<u64>,
}

impl EmdfInfo {
    pub fn read(state: &mut TocState, reader: &mut TocReader) -> Result<Self, TocError> {
        let version = reader.get_n_extended(2, 2)?;
        let key_id = reader.get_n_extended(3, 3)?;

        let substream_index = if reader.get()? {
            Some(emdf_payloads_substream_info(state, reader)?)
        } else {
            None
        };

        emdf_protection(reader)?;

        Ok(Self {
            version,
            key_id,
            substream_index,
        })
    }
}

pub fn emdf_payloads_substream_info(
    state: &mut TocState,
    reader: &mut TocReader,
) -> Result<u64, TocError> {
    let substream_index = reader.get_n_extended(2, 2)?;
    state.reference_substream(substream_index);
    Ok(substream_index)
}

pub fn emdf_protection(reader: &mut TocReader) -> Result<(), TocError> {
    let protection_length_primary = reader.get_n(2)? as usize;
    let protection_length_secondary = reader.get_n(2)? as usize;

    if protection_length_primary == 0 {
        return Err(TocError::ReservedProtectionLength);
    }

    reader.skip_n(PROTECTION_BITS[protection_length_primary])?;
    reader.skip_n(PROTECTION_BITS[protection_length_secondary])?;

    Ok(())
}
