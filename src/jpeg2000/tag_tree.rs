//! Incremental quad-tree coding of per-leaf integers (Annex B.10.2).
//!
//! Used by packet headers to code code-block inclusion, the number of
//! leading all-zero bit-planes, and Lblock length increments: each leaf
//! holds a monotonically non-decreasing value, and decoding a leaf against
//! a `threshold` only ever needs to transmit the bits that distinguish
//! "value < threshold" from "value >= threshold" once, even across many
//! calls with increasing thresholds (successive layers).

use super::bit_io::{J2kBitReader, J2kBitWriter};

#[derive(Clone, Copy)]
struct TagNode {
    /// True minimum value for this node (only meaningful while encoding).
    value: i32,
    /// Lower bound communicated/received so far.
    low: i32,
    /// Whether `low` has been confirmed equal to `value`.
    known: bool,
}

impl Default for TagNode {
    fn default() -> Self {
        Self {
            value: i32::MAX,
            low: 0,
            known: false,
        }
    }
}

pub struct TagTree {
    levels: Vec<Vec<TagNode>>,
    widths: Vec<usize>,
    heights: Vec<usize>,
}

impl TagTree {
    pub fn new(width: usize, height: usize) -> Self {
        let mut widths = vec![width.max(1)];
        let mut heights = vec![height.max(1)];
        while *widths.last().unwrap() > 1 || *heights.last().unwrap() > 1 {
            let w = *widths.last().unwrap();
            let h = *heights.last().unwrap();
            widths.push(w.div_ceil(2));
            heights.push(h.div_ceil(2));
        }
        let levels = widths
            .iter()
            .zip(heights.iter())
            .map(|(&w, &h)| vec![TagNode::default(); w * h])
            .collect();
        Self {
            levels,
            widths,
            heights,
        }
    }

    /// Resets the transmission state (`low`/`known`) for a new precinct,
    /// keeping any leaf values set via [`Self::set_value`].
    pub fn reset(&mut self) {
        for level in &mut self.levels {
            for node in level.iter_mut() {
                node.low = 0;
                node.known = false;
            }
        }
    }

    /// Sets the true value of a leaf and recomputes every ancestor's value
    /// as the min over its children. Only needed on the encode side.
    pub fn set_value(&mut self, x: usize, y: usize, value: i32) {
        let idx = y * self.widths[0] + x;
        self.levels[0][idx].value = value;
        for l in 0..self.levels.len() - 1 {
            let w = self.widths[l];
            let h = self.heights[l];
            let pw = self.widths[l + 1];
            for py in 0..self.heights[l + 1] {
                for px in 0..pw {
                    let mut m = i32::MAX;
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let cx = px * 2 + dx;
                            let cy = py * 2 + dy;
                            if cx < w && cy < h {
                                m = m.min(self.levels[l][cy * w + cx].value);
                            }
                        }
                    }
                    self.levels[l + 1][py * pw + px].value = m;
                }
            }
        }
    }

    /// (level, index) pairs from the root down to the leaf at (x, y).
    fn path(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut path = Vec::with_capacity(self.levels.len());
        let (mut cx, mut cy) = (x, y);
        for l in 0..self.levels.len() {
            let w = self.widths[l];
            path.push((l, cy * w + cx));
            cx /= 2;
            cy /= 2;
        }
        path.reverse();
        path
    }

    /// Returns true if the leaf's value is **not** yet known to be below
    /// `threshold` (i.e. still "not included" for an inclusion tree).
    pub fn decode(
        &mut self,
        reader: &mut J2kBitReader,
        x: usize,
        y: usize,
        threshold: i32,
    ) -> Result<bool, ()> {
        let path = self.path(x, y);
        let mut parent_low = 0;
        let mut leaf_low = 0;
        for (level, idx) in path {
            let node = &mut self.levels[level][idx];
            if node.low < parent_low {
                node.low = parent_low;
            }
            while !node.known && node.low < threshold {
                let bit = reader.read_bit()?;
                if bit == 1 {
                    node.known = true;
                } else {
                    node.low += 1;
                }
            }
            parent_low = node.low;
            leaf_low = node.low;
        }
        Ok(leaf_low >= threshold)
    }

    /// Encodes the leaf's transmission state against `threshold`. Requires
    /// `set_value` to have been called for every leaf beforehand.
    pub fn encode(&mut self, writer: &mut J2kBitWriter, x: usize, y: usize, threshold: i32) {
        let path = self.path(x, y);
        let mut parent_low = 0;
        for (level, idx) in path {
            let node = &mut self.levels[level][idx];
            if node.low < parent_low {
                node.low = parent_low;
            }
            while !node.known && node.low < threshold {
                if node.low < node.value {
                    node.low += 1;
                    writer.write_bit(0);
                } else {
                    node.known = true;
                    writer.write_bit(1);
                }
            }
            parent_low = node.low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_roundtrip() {
        let mut enc = TagTree::new(1, 1);
        enc.set_value(0, 0, 2);

        let mut writer = J2kBitWriter::new();
        for threshold in 0..4 {
            enc.encode(&mut writer, 0, 0, threshold);
        }
        let bytes = writer.finish();

        let mut dec = TagTree::new(1, 1);
        let mut reader = J2kBitReader::new(&bytes);
        let mut first_included_at = None;
        for threshold in 0..4 {
            let not_yet = dec.decode(&mut reader, 0, 0, threshold).unwrap();
            if !not_yet && first_included_at.is_none() {
                first_included_at = Some(threshold);
            }
        }
        assert_eq!(first_included_at, Some(2));
    }

    #[test]
    fn grid_roundtrip_picks_correct_minimum() {
        let mut enc = TagTree::new(2, 2);
        enc.set_value(0, 0, 3);
        enc.set_value(1, 0, 1);
        enc.set_value(0, 1, 5);
        enc.set_value(1, 1, 2);

        let mut writer = J2kBitWriter::new();
        for threshold in 0..6 {
            for y in 0..2 {
                for x in 0..2 {
                    enc.encode(&mut writer, x, y, threshold);
                }
            }
        }
        let bytes = writer.finish();

        let mut dec = TagTree::new(2, 2);
        let mut reader = J2kBitReader::new(&bytes);
        let expected = [[3, 1], [5, 2]];
        let mut found = [[None; 2]; 2];
        for threshold in 0..6 {
            for y in 0..2 {
                for x in 0..2 {
                    let not_yet = dec.decode(&mut reader, x, y, threshold).unwrap();
                    if !not_yet && found[y][x].is_none() {
                        found[y][x] = Some(threshold);
                    }
                }
            }
        }
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(found[y][x], Some(expected[y][x]));
            }
        }
    }
}
