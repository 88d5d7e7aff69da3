//! JPEG 2000 Decoder.
//!
//! Orchestrates codestream parsing and dispatches packet data to the
//! Tier-1 (MQ/bit-plane) and Tier-2 (packet header) decoders, assembling
//! the result into a [`J2kImage`] ready for [`J2kImage::reconstruct_pixels`].

use super::bit_io::J2kBitReader;
use super::bit_plane_coder::BitPlaneCoder;
use super::image::{
    J2kCodeBlock, J2kImage, J2kResolution, J2kSubband, J2kTile, J2kTileComponent,
    SubbandOrientation,
};
use super::packet::{PacketHeader, PrecinctState};
use super::parser::J2kParser;
use crate::JpeglsError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::JpegStreamReader;

/// High-level JPEG 2000 decoder: parses the codestream, decodes every
/// tile-part's packets, and assembles the subband/code-block hierarchy.
pub struct J2kDecoder<'a, 'b> {
    parser: J2kParser<'a, 'b>,
}

impl<'a, 'b> J2kDecoder<'a, 'b> {
    pub fn new(reader: &'b mut JpegStreamReader<'a>) -> Self {
        Self {
            parser: J2kParser::new(reader),
        }
    }

    /// Decodes the JPEG 2000 codestream, returning the assembled image.
    pub fn decode(&mut self) -> Result<&J2kImage, JpeglsError> {
        let last_marker = self.parser.parse_main_header()?;

        let cod = self
            .parser
            .image
            .cod
            .clone()
            .ok_or(JpeglsError::InvalidData)?;

        allocate_tile_skeleton(&mut self.parser.image, &cod);

        let mut marker = last_marker;
        loop {
            if marker == JpegMarkerCode::EndOfImage {
                break;
            }
            if marker == JpegMarkerCode::StartOfTile {
                let (psot, _isot) = self.parser.parse_tile_part_header()?;
                self.decode_tile_data(&cod)?;
                if psot == 0 {
                    break;
                }
                marker = self.find_next_marker()?;
            } else {
                break;
            }
        }

        Ok(&self.parser.image)
    }

    /// Scans forward for the next SOT or EOC marker.
    fn find_next_marker(&mut self) -> Result<JpegMarkerCode, JpeglsError> {
        loop {
            match self.parser.reader.read_u8() {
                Ok(0xFF) => {
                    let b2 = self.parser.reader.read_u8()?;
                    if b2 == 0x90 {
                        return Ok(JpegMarkerCode::StartOfTile);
                    } else if b2 == 0xD9 {
                        return Ok(JpegMarkerCode::EndOfImage);
                    }
                }
                Ok(_) => continue,
                Err(_) => return Err(JpeglsError::InvalidData),
            }
        }
    }

    /// Decodes every packet of the current tile-part in the COD's
    /// progression order, writing decoded coefficients into the tile
    /// skeleton allocated by [`allocate_tile_skeleton`].
    fn decode_tile_data(&mut self, cod: &super::image::J2kCod) -> Result<(), JpeglsError> {
        let num_layers = (cod.number_of_layers as usize).max(1);
        let num_resolutions = (cod.decomposition_levels + 1) as usize;
        let num_components = self.parser.image.component_count as usize;

        match cod.progression_order {
            2 => {
                // RPCL
                for r in 0..num_resolutions {
                    for c in 0..num_components {
                        for l in 0..num_layers {
                            if self.parser.reader.remaining_data().is_empty() {
                                return Ok(());
                            }
                            self.decode_packet(l, r, c, cod)?;
                        }
                    }
                }
            }
            _ => {
                // LRCP (default / fallback)
                for l in 0..num_layers {
                    for r in 0..num_resolutions {
                        for c in 0..num_components {
                            if self.parser.reader.remaining_data().is_empty() {
                                return Ok(());
                            }
                            self.decode_packet(l, r, c, cod)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_packet(
        &mut self,
        layer: usize,
        res: usize,
        comp: usize,
        cod: &super::image::J2kCod,
    ) -> Result<(), JpeglsError> {
        let num_subbands = if res == 0 { 1 } else { 3 };

        // Every code-block grid is a single precinct spanning the whole
        // subband (no precinct partitioning); grid dims come from the
        // largest subband at this resolution for this component.
        let (grid_w, grid_h) = {
            let tile = self.parser.image.tiles.first();
            let tc = tile.and_then(|t| t.components.get(comp));
            let resolution = tc.and_then(|tc| tc.resolutions.get(res));
            resolution
                .map(|r| {
                    r.subbands
                        .iter()
                        .map(|b| codeblock_grid(b.width as usize, b.height as usize, cod))
                        .fold((1usize, 1usize), |acc, (w, h)| (acc.0.max(w), acc.1.max(h)))
                })
                .unwrap_or((1, 1))
        };

        let mut state = PrecinctState::with_subbands(grid_w, grid_h, num_subbands);
        let header;
        let consumed;
        {
            let remaining = self.parser.reader.remaining_data();
            if remaining.is_empty() {
                return Ok(());
            }
            let mut bit_reader = J2kBitReader::new(remaining);
            header = PacketHeader::read_subbands(
                &mut bit_reader,
                &mut state,
                layer as u32,
                grid_w,
                grid_h,
                num_subbands,
            )
            .map_err(|_| JpeglsError::InvalidData)?;
            consumed = bit_reader.bytes_consumed();
        }
        self.parser.reader.advance(consumed);

        let depth = self
            .parser
            .image
            .components
            .get(comp)
            .map(|c| c.depth)
            .unwrap_or(8);

        for cb_info in &header.included_cblks {
            if cb_info.data_len == 0 {
                continue;
            }
            let data_len = cb_info.data_len as usize;
            let mut data = vec![0u8; data_len];
            for item in &mut data {
                *item = self.parser.reader.read_u8()?;
            }

            let cb_w = 1usize << (cod.codeblock_width_exp as usize + 2);
            let cb_h = 1usize << (cod.codeblock_height_exp as usize + 2);
            let max_bit_plane = (depth as i32 + 2 - cb_info.zero_bp as i32 - 1).max(1) as u8;

            let mut bpc = BitPlaneCoder::new(cb_w as u32, cb_h as u32, &[]);
            let coefficients = bpc
                .decode_codeblock(&data, cb_w as u32, cb_h as u32, max_bit_plane)
                .unwrap_or_default();

            store_codeblock(
                &mut self.parser.image,
                comp,
                res,
                cb_info.subband_index as usize,
                cb_info,
                cb_w,
                cb_h,
                coefficients,
            );
        }

        let current = self.parser.image.decoded_layers;
        if (layer as u32 + 1) > current {
            self.parser.image.decoded_layers = (layer + 1) as u32;
        }

        Ok(())
    }
}

fn codeblock_grid(sb_w: usize, sb_h: usize, cod: &super::image::J2kCod) -> (usize, usize) {
    let cb_w = 1usize << (cod.codeblock_width_exp as usize + 2);
    let cb_h = 1usize << (cod.codeblock_height_exp as usize + 2);
    (sb_w.div_ceil(cb_w).max(1), sb_h.div_ceil(cb_h).max(1))
}

/// Per-resolution pre-split sizes: `sizes[0]` is the full image size,
/// `sizes[i]` is `sizes[i-1]` halved (ceil), down to `sizes[levels]` which
/// is the final LL band's size.
fn subband_step_sizes(width: usize, height: usize, levels: usize) -> Vec<(usize, usize)> {
    let mut sizes = Vec::with_capacity(levels + 1);
    sizes.push((width, height));
    for _ in 0..levels {
        let (w, h) = *sizes.last().unwrap();
        sizes.push((w.div_ceil(2), h.div_ceil(2)));
    }
    sizes
}

/// Builds the empty tile/component/resolution/subband skeleton (with
/// correct geometry but no coefficients yet) that packet decoding fills in.
fn allocate_tile_skeleton(image: &mut J2kImage, cod: &super::image::J2kCod) {
    let levels = cod.decomposition_levels as usize;
    let sizes = subband_step_sizes(image.width as usize, image.height as usize, levels);

    let mut components = Vec::with_capacity(image.component_count as usize);
    for comp_idx in 0..image.component_count {
        let mut resolutions = Vec::with_capacity(levels + 1);

        let (ll_w, ll_h) = sizes[levels];
        resolutions.push(J2kResolution {
            level: 0,
            width: ll_w as u32,
            height: ll_h as u32,
            subbands: vec![J2kSubband {
                orientation: SubbandOrientation::LL,
                width: ll_w as u32,
                height: ll_h as u32,
                codeblocks: Vec::new(),
                data: Vec::new(),
            }],
        });

        for res in 1..=levels {
            let (cur_w, cur_h) = sizes[levels - res];
            let hl_w = cur_w / 2;
            let lh_h = cur_h / 2;
            let this_ll_w = cur_w.div_ceil(2);
            let this_ll_h = cur_h.div_ceil(2);
            let band = |o: SubbandOrientation, w: usize, h: usize| J2kSubband {
                orientation: o,
                width: w as u32,
                height: h as u32,
                codeblocks: Vec::new(),
                data: Vec::new(),
            };
            resolutions.push(J2kResolution {
                level: res as u8,
                width: cur_w as u32,
                height: cur_h as u32,
                subbands: vec![
                    band(SubbandOrientation::HL, hl_w, this_ll_h),
                    band(SubbandOrientation::LH, this_ll_w, lh_h),
                    band(SubbandOrientation::HH, hl_w, lh_h),
                ],
            });
        }

        components.push(J2kTileComponent {
            component_index: comp_idx,
            resolutions,
        });
    }

    image.tiles = vec![J2kTile {
        index: 0,
        components,
    }];
}

#[allow(clippy::too_many_arguments)]
fn store_codeblock(
    image: &mut J2kImage,
    comp: usize,
    res: usize,
    subband_idx: usize,
    cb_info: &super::packet::CodeBlockInfo,
    cb_w: usize,
    cb_h: usize,
    coefficients: Vec<i32>,
) {
    let Some(tile) = image.tiles.first_mut() else {
        return;
    };
    let Some(tc) = tile.components.get_mut(comp) else {
        return;
    };
    let Some(resolution) = tc.resolutions.get_mut(res) else {
        return;
    };
    let Some(band) = resolution.subbands.get_mut(subband_idx) else {
        return;
    };

    if band.data.is_empty() {
        band.data = vec![0i32; band.width as usize * band.height as usize];
    }

    let ox = cb_info.x * cb_w;
    let oy = cb_info.y * cb_h;
    let bw = band.width as usize;
    let bh = band.height as usize;
    for y in 0..cb_h {
        for x in 0..cb_w {
            let dst_x = ox + x;
            let dst_y = oy + y;
            if dst_x < bw && dst_y < bh {
                let v = coefficients.get(y * cb_w + x).copied().unwrap_or(0);
                band.data[dst_y * bw + dst_x] = v;
            }
        }
    }

    band.codeblocks.push(J2kCodeBlock {
        x: cb_info.x as u32,
        y: cb_info.y as u32,
        width: cb_w as u32,
        height: cb_h as u32,
        compressed_data: Vec::new(),
        zero_bit_planes: cb_info.zero_bp,
        coding_passes: cb_info.num_passes,
        coefficients: Vec::new(),
        decoded: true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subband_step_sizes_halve_each_level() {
        let sizes = subband_step_sizes(16, 16, 2);
        assert_eq!(sizes, vec![(16, 16), (8, 8), (4, 4)]);
    }

    #[test]
    fn allocate_tile_skeleton_builds_expected_resolution_count() {
        let mut image = J2kImage {
            width: 16,
            height: 16,
            component_count: 1,
            ..Default::default()
        };
        let cod = super::super::image::J2kCod {
            decomposition_levels: 2,
            ..Default::default()
        };
        allocate_tile_skeleton(&mut image, &cod);
        let tc = &image.tiles[0].components[0];
        assert_eq!(tc.resolutions.len(), 3);
        assert_eq!(tc.resolutions[0].subbands.len(), 1);
        assert_eq!(tc.resolutions[1].subbands.len(), 3);
        assert_eq!(tc.resolutions[2].subbands.len(), 3);
        // Finest resolution's subbands should roughly cover half the image.
        assert_eq!(tc.resolutions[2].subbands[0].width, 8);
    }
}
