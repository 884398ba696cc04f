//! Synthetic TOCs for unit tests.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

/// Big-endian bit writer that counts what it wrote.
pub struct Bits {
    writer: BitWriter<Vec<u8>, BigEndian>,
    len: u64,
}

impl Default for Bits {
    fn default() -> Self {
        Self {
            writer: BitWriter::endian(Vec::new(), BigEndian),
            len: 0,
        }
    }
}

impl Bits {
    pub fn put(&mut self, n: u32, value: u64) -> &mut Self {
        if n > 0 {
            self.writer.write_unsigned_var(n, value).unwrap();
            self.len += n as u64;
        }
        self
    }

    pub fn flag(&mut self, bit: bool) -> &mut Self {
        self.writer.write_bit(bit).unwrap();
        self.len += 1;
        self
    }

    /// Writes `value` in the escape coding read back by `variable_bits(n)`.
    pub fn variable_bits(&mut self, n: u32, value: u64) -> &mut Self {
        let mask = (1 << n) - 1;
        let mut groups = Vec::new();
        let mut rest = value;
        loop {
            groups.push(rest & mask);
            rest >>= n;
            if rest == 0 {
                break;
            }
            rest -= 1;
        }

        let last = groups.len() - 1;
        for (i, group) in groups.into_iter().rev().enumerate() {
            self.put(n, group);
            self.flag(i != last);
        }
        self
    }

    /// 2-bit substream index, escaped with `variable_bits(2)` from 3 on.
    pub fn substream_index(&mut self, index: u64) -> &mut Self {
        if index < 3 {
            self.put(2, index)
        } else {
            self.put(2, 3).variable_bits(2, index - 3)
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.writer.byte_align().unwrap();
        self.writer.into_writer()
    }
}

#[derive(Debug, Clone)]
pub struct Presentation {
    pub level: u8,
    pub id: Option<u64>,
}

impl Presentation {
    pub fn new(level: u8, id: Option<u64>) -> Self {
        Self { level, id }
    }
}

/// Builds one raw AC-4 frame: a TOC for single-substream presentations
/// followed by filler payload bytes.
#[derive(Debug, Clone)]
pub struct TocBuilder {
    pub version: u64,
    pub fs_index: u8,
    pub frame_rate_index: u8,
    pub payload_base_minus1: Option<u8>,
    pub program_id: Option<u16>,
    pub n_substreams: Option<u64>,
    pub presentations: Vec<Presentation>,
    pub payload: Vec<u8>,
}

impl TocBuilder {
    pub fn v1() -> Self {
        Self {
            version: 1,
            fs_index: 1,
            frame_rate_index: 13,
            payload_base_minus1: Some(0),
            program_id: None,
            n_substreams: None,
            presentations: Vec::new(),
            payload: vec![0x5A; 6],
        }
    }

    pub fn v2() -> Self {
        Self {
            version: 2,
            ..Self::v1()
        }
    }

    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentations.push(presentation);
        self
    }

    pub fn payload_base_minus1(mut self, value: Option<u8>) -> Self {
        self.payload_base_minus1 = value;
        self
    }

    /// Bit length of the TOC before byte alignment.
    pub fn toc_bits(&self) -> u64 {
        self.write_toc().len()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut sample = self.write_toc().finish();
        sample.extend_from_slice(&self.payload);
        sample
    }

    fn write_toc(&self) -> Bits {
        let mut bits = Bits::default();
        let n = self.presentations.len() as u64;

        if self.version < 3 {
            bits.put(2, self.version);
        } else {
            bits.put(2, 3).variable_bits(2, self.version - 3);
        }
        bits.put(10, 0x2A5); // sequence_counter
        bits.flag(false); // b_wait_frames
        bits.put(1, self.fs_index as u64);
        bits.put(4, self.frame_rate_index as u64);
        bits.flag(true); // b_iframe_global

        match n {
            1 => {
                bits.flag(true);
            }
            0 => {
                bits.flag(false).flag(false);
            }
            _ => {
                bits.flag(false).flag(true).variable_bits(2, n - 2);
            }
        }

        match self.payload_base_minus1 {
            Some(value) => {
                bits.flag(true).put(5, value as u64);
                if value == 31 {
                    bits.variable_bits(3, 0);
                }
            }
            None => {
                bits.flag(false);
            }
        }

        let n_substreams = if self.version <= 1 {
            for (i, presentation) in self.presentations.iter().enumerate() {
                Self::write_presentation_v1(&mut bits, presentation, i as u64);
            }
            n
        } else {
            match self.program_id {
                Some(id) => {
                    bits.flag(true).put(16, id as u64).flag(false);
                }
                None => {
                    bits.flag(false);
                }
            }
            for (i, presentation) in self.presentations.iter().enumerate() {
                Self::write_presentation_v2(&mut bits, presentation, i as u64, n + i as u64);
            }
            for group in 0..n {
                Self::write_channel_group(&mut bits, group);
            }
            2 * n
        };

        Self::write_substream_index_table(&mut bits, self.n_substreams.unwrap_or(n_substreams.max(1)));
        bits
    }

    fn write_level_and_id(bits: &mut Bits, presentation: &Presentation) {
        bits.put(3, presentation.level as u64);
        match presentation.id {
            Some(id) => {
                bits.flag(true).variable_bits(2, id);
            }
            None => {
                bits.flag(false);
            }
        }
    }

    pub fn write_emdf_info(bits: &mut Bits) {
        bits.put(2, 0); // emdf_version
        bits.put(3, 0); // key_id
        bits.flag(false); // b_emdf_payloads_substream_info
        bits.put(2, 1).put(2, 0); // protection lengths: 8 bits, none
        bits.put(8, 0xC3);
    }

    fn write_presentation_v1(bits: &mut Bits, presentation: &Presentation, substream: u64) {
        bits.flag(true); // b_single_substream
        bits.flag(false); // presentation_version
        Self::write_level_and_id(bits, presentation);
        Self::write_emdf_info(bits);

        // ac4_substream_info: mono, no multiplier, no bitrate, no content type
        bits.flag(false).flag(false).flag(false).flag(false);
        bits.flag(true); // b_iframe
        bits.substream_index(substream);

        bits.flag(false); // b_pre_virtualized
        bits.flag(false); // b_add_emdf_substreams
    }

    fn write_presentation_v2(bits: &mut Bits, presentation: &Presentation, group: u64, substream: u64) {
        bits.flag(true); // b_single_substream_group
        bits.flag(false); // presentation_version
        Self::write_level_and_id(bits, presentation);
        Self::write_emdf_info(bits);
        bits.flag(false); // b_presentation_filter
        bits.put(3, group);
        bits.flag(false); // b_pre_virtualized
        bits.flag(false); // b_add_emdf_substreams

        // ac4_presentation_substream_info
        bits.flag(false).flag(false).substream_index(substream);
    }

    fn write_channel_group(bits: &mut Bits, group: u64) {
        bits.flag(true); // b_substreams_present
        bits.flag(false); // b_hsf_ext
        bits.flag(true); // b_single_substream
        bits.flag(true); // b_channel_coded

        // ac4_substream_info_chan: mono, no multiplier, no bitrate, one iframe flag
        bits.flag(false).flag(false).flag(false).flag(true);
        bits.substream_index(group);

        bits.flag(false); // b_content_type
    }

    fn write_substream_index_table(bits: &mut Bits, n_substreams: u64) {
        if (1..4).contains(&n_substreams) {
            bits.put(2, n_substreams);
        } else {
            bits.put(2, 0).variable_bits(2, n_substreams - 4);
        }

        if n_substreams == 1 {
            bits.flag(false); // b_size_present
            return;
        }

        for _ in 0..n_substreams {
            bits.flag(false).put(10, 1);
        }
    }
}

#[test]
fn variable_bits_writer_matches_reader() -> std::io::Result<()> {
    use crate::utils::bitstream_io::BitSource;

    for value in [0, 1, 3, 4, 10, 19, 20, 123_456] {
        let mut bits = Bits::default();
        bits.variable_bits(2, value);
        let len = bits.len();
        let data = bits.finish();

        let mut source = BitSource::from_slice(&data);
        assert_eq!(source.get_variable_bits(2)?, value);
        assert_eq!(source.position(), len);
    }
    Ok(())
}
