//! Tier-2 packet header parsing and writing (Annex B.10).

use super::bit_io::{J2kBitReader, J2kBitWriter};
use super::tag_tree::TagTree;

/// Per-precinct tag-tree state: inclusion, leading zero bit-planes, and the
/// Lblock (code-block length increment) trees, one leaf per code-block, kept
/// separately per subband so a single packet can carry several subbands'
/// code-blocks (as it does for every resolution beyond the LL-only one).
pub struct PrecinctState {
    pub inclusion_trees: Vec<TagTree>,
    pub zero_bp_trees: Vec<TagTree>,
    pub lblock_trees: Vec<TagTree>,
}

impl PrecinctState {
    pub fn new(w: usize, h: usize) -> Self {
        Self::with_subbands(w, h, 1)
    }

    pub fn with_subbands(w: usize, h: usize, num_subbands: usize) -> Self {
        let num_subbands = num_subbands.max(1);
        let mut state = Self {
            inclusion_trees: (0..num_subbands).map(|_| TagTree::new(w, h)).collect(),
            zero_bp_trees: (0..num_subbands).map(|_| TagTree::new(w, h)).collect(),
            lblock_trees: (0..num_subbands).map(|_| TagTree::new(w, h)).collect(),
        };
        state.reset();
        state
    }

    pub fn reset(&mut self) {
        for t in &mut self.inclusion_trees {
            t.reset();
        }
        for t in &mut self.zero_bp_trees {
            t.reset();
        }
        for t in &mut self.lblock_trees {
            t.reset();
        }
    }
}

pub struct PacketHeader {
    pub packet_seq_num: u32,
    pub empty: bool,
    pub layer_index: u32,
    pub included_cblks: Vec<CodeBlockInfo>,
}

#[derive(Debug, Clone)]
pub struct CodeBlockInfo {
    pub x: usize,
    pub y: usize,
    pub subband_index: u8,
    pub included: bool,
    pub num_passes: u8,
    pub data_len: u32,
    pub zero_bp: u8,
}

/// Minimum Lblock length (Annex B.10.3): code-block data length is always
/// coded as `lblock + bits-in-comma-coded-pass-count` bits.
const INITIAL_LBLOCK: u32 = 3;

/// Reads the comma-coded pass count: a run of `1` bits terminated by a `0`
/// bit gives the number of additional coding passes beyond the first.
fn read_pass_count(reader: &mut J2kBitReader) -> Result<u8, ()> {
    let mut passes = 1u32;
    loop {
        let bit = reader.read_bit()?;
        if bit == 0 {
            break;
        }
        passes += 1;
        if passes >= 164 {
            break;
        }
    }
    Ok(passes as u8)
}

fn write_pass_count(writer: &mut J2kBitWriter, num_passes: u8) {
    for _ in 1..num_passes {
        writer.write_bit(1);
    }
    writer.write_bit(0);
}

fn needed_bits(value: u32) -> u32 {
    32 - value.leading_zeros()
}

impl PacketHeader {
    /// Reads a packet header from the bit stream. `num_subbands` is 1 for the
    /// LL-only resolution and 3 (HL, LH, HH) for every later resolution.
    pub fn read(
        reader: &mut J2kBitReader,
        state: &mut PrecinctState,
        layer: u32,
        grid_width: usize,
        grid_height: usize,
    ) -> Result<Self, ()> {
        Self::read_subbands(reader, state, layer, grid_width, grid_height, 1)
    }

    pub fn read_subbands(
        reader: &mut J2kBitReader,
        state: &mut PrecinctState,
        layer: u32,
        grid_width: usize,
        grid_height: usize,
        num_subbands: usize,
    ) -> Result<Self, ()> {
        let mut header = PacketHeader {
            packet_seq_num: 0,
            empty: false,
            layer_index: layer,
            included_cblks: Vec::new(),
        };

        let bit = reader.read_bit()?;
        if bit == 0 {
            header.empty = true;
            return Ok(header);
        }

        let threshold = (layer + 1) as i32;
        for sb in 0..num_subbands.max(1) {
            for y in 0..grid_height {
                for x in 0..grid_width {
                    let not_included_yet =
                        state.inclusion_trees[sb].decode(reader, x, y, threshold)?;
                    let included = !not_included_yet;
                    if !included {
                        continue;
                    }

                    // A code-block's leading zero bit-planes are only sent once,
                    // on the layer where it is first included. `PrecinctState`
                    // is scoped per packet call here rather than persisted
                    // across layers, so this always (re-)reads it; see DESIGN.md.
                    let mut zero_bp = 0u8;
                    while state.zero_bp_trees[sb].decode(reader, x, y, (zero_bp + 1) as i32)? {
                        zero_bp += 1;
                        if zero_bp >= 32 {
                            break;
                        }
                    }

                    let num_passes = read_pass_count(reader)?;

                    let mut lblock = INITIAL_LBLOCK;
                    loop {
                        let bit = reader.read_bit()?;
                        if bit == 0 {
                            break;
                        }
                        lblock += 1;
                    }
                    let length_bits =
                        lblock + (32 - (num_passes.max(1) as u32).leading_zeros()) - 1;
                    let data_len = reader.read_bits(length_bits.clamp(1, 31) as u8)?;

                    header.included_cblks.push(CodeBlockInfo {
                        x,
                        y,
                        subband_index: sb as u8,
                        included,
                        num_passes,
                        data_len,
                        zero_bp,
                    });
                }
            }
        }

        Ok(header)
    }

    /// Writes a packet header to the bit stream.
    pub fn write(
        &self,
        writer: &mut J2kBitWriter,
        state: &mut PrecinctState,
        grid_width: usize,
        grid_height: usize,
        num_subbands: usize,
    ) {
        if self.empty {
            writer.write_bit(0);
            return;
        }
        writer.write_bit(1);

        let threshold = (self.layer_index + 1) as i32;
        for sb in 0..num_subbands.max(1) {
            for y in 0..grid_height {
                for x in 0..grid_width {
                    let cb_info = self
                        .included_cblks
                        .iter()
                        .find(|c| c.x == x && c.y == y && c.subband_index as usize == sb);
                    if let Some(cb) = cb_info {
                        state.inclusion_trees[sb].set_value(x, y, self.layer_index as i32);
                        state.inclusion_trees[sb].encode(writer, x, y, threshold);

                        state.zero_bp_trees[sb].set_value(x, y, cb.zero_bp as i32);
                        for t in 0..=cb.zero_bp as i32 {
                            state.zero_bp_trees[sb].encode(writer, x, y, t + 1);
                        }

                        write_pass_count(writer, cb.num_passes);

                        let mut lblock = INITIAL_LBLOCK;
                        let length_bits =
                            lblock + (32 - (cb.num_passes.max(1) as u32).leading_zeros()) - 1;
                        while length_bits.clamp(1, 31) < needed_bits(cb.data_len) {
                            lblock += 1;
                            writer.write_bit(1);
                        }
                        writer.write_bit(0);
                        let length_bits =
                            lblock + (32 - (cb.num_passes.max(1) as u32).leading_zeros()) - 1;
                        writer.write_bits(cb.data_len, length_bits.clamp(1, 31) as u8);
                    } else {
                        state.inclusion_trees[sb].encode(writer, x, y, threshold);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_read_empty() {
        let data = vec![0x00];
        let mut reader = J2kBitReader::new(&data);
        let mut state = PrecinctState::new(2, 2);

        let header = PacketHeader::read(&mut reader, &mut state, 0, 2, 2).unwrap();
        assert!(header.empty);
    }

    #[test]
    fn empty_packet_roundtrip() {
        let header = PacketHeader {
            packet_seq_num: 0,
            empty: true,
            layer_index: 0,
            included_cblks: Vec::new(),
        };
        let mut writer = J2kBitWriter::new();
        let mut state = PrecinctState::new(1, 1);
        header.write(&mut writer, &mut state, 1, 1, 1);
        let bytes = writer.finish();

        let mut reader = J2kBitReader::new(&bytes);
        let mut state = PrecinctState::new(1, 1);
        let decoded = PacketHeader::read(&mut reader, &mut state, 0, 1, 1).unwrap();
        assert!(decoded.empty);
    }

    #[test]
    fn single_codeblock_packet_roundtrip() {
        let header = PacketHeader {
            packet_seq_num: 0,
            empty: false,
            layer_index: 0,
            included_cblks: vec![CodeBlockInfo {
                x: 0,
                y: 0,
                subband_index: 0,
                included: true,
                num_passes: 3,
                data_len: 42,
                zero_bp: 2,
            }],
        };
        let mut writer = J2kBitWriter::new();
        let mut state = PrecinctState::new(1, 1);
        header.write(&mut writer, &mut state, 1, 1, 1);
        let bytes = writer.finish();

        let mut reader = J2kBitReader::new(&bytes);
        let mut state = PrecinctState::new(1, 1);
        let decoded = PacketHeader::read(&mut reader, &mut state, 0, 1, 1).unwrap();
        assert!(!decoded.empty);
        assert_eq!(decoded.included_cblks.len(), 1);
        assert_eq!(decoded.included_cblks[0].num_passes, 3);
        assert_eq!(decoded.included_cblks[0].data_len, 42);
    }

    #[test]
    fn three_subband_packet_roundtrip() {
        let header = PacketHeader {
            packet_seq_num: 0,
            empty: false,
            layer_index: 0,
            included_cblks: vec![
                CodeBlockInfo {
                    x: 0,
                    y: 0,
                    subband_index: 0,
                    included: true,
                    num_passes: 1,
                    data_len: 5,
                    zero_bp: 0,
                },
                CodeBlockInfo {
                    x: 0,
                    y: 0,
                    subband_index: 2,
                    included: true,
                    num_passes: 4,
                    data_len: 100,
                    zero_bp: 1,
                },
            ],
        };
        let mut writer = J2kBitWriter::new();
        let mut state = PrecinctState::with_subbands(1, 1, 3);
        header.write(&mut writer, &mut state, 1, 1, 3);
        let bytes = writer.finish();

        let mut reader = J2kBitReader::new(&bytes);
        let mut state = PrecinctState::with_subbands(1, 1, 3);
        let decoded = PacketHeader::read_subbands(&mut reader, &mut state, 0, 1, 1, 3).unwrap();
        assert_eq!(decoded.included_cblks.len(), 2);
        assert!(
            decoded
                .included_cblks
                .iter()
                .any(|c| c.subband_index == 0 && c.data_len == 5)
        );
        assert!(
            decoded
                .included_cblks
                .iter()
                .any(|c| c.subband_index == 2 && c.data_len == 100)
        );
    }
}
