//! In-memory representation of a parsed/decoded JPEG 2000 codestream.

use crate::error::JpeglsError;

use super::dwt::{Dwt53, Dwt97};

/// Per-component geometry/sample-format fields carried by the SIZ marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct J2kComponentInfo {
    pub depth: u8,
    pub is_signed: bool,
    pub dx: u8,
    pub dy: u8,
}

/// Region-of-interest shift (RGN marker), Part-1 implicit/max-shift style only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct J2kRoi {
    pub component_index: u8,
    pub roi_style: u8,
    pub shift_value: u8,
}

#[derive(Debug, Clone, Default)]
pub struct J2kImage {
    pub width: u32,
    pub height: u32,
    pub x_origin: u32,
    pub y_origin: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_origin: u32,
    pub tile_y_origin: u32,
    pub component_count: u32,
    pub components: Vec<J2kComponentInfo>,
    pub cod: Option<J2kCod>,
    pub qcd: Option<J2kQcd>,
    pub roi: Option<J2kRoi>,
    pub tiles: Vec<J2kTile>,
    pub decoded_layers: u32,
}

#[derive(Debug, Clone, Default)]
pub struct J2kTile {
    pub index: u32,
    pub components: Vec<J2kTileComponent>,
}

#[derive(Debug, Clone, Default)]
pub struct J2kTileComponent {
    pub component_index: u32,
    pub resolutions: Vec<J2kResolution>,
}

#[derive(Debug, Clone, Default)]
pub struct J2kResolution {
    pub level: u8,
    pub width: u32,
    pub height: u32,
    pub subbands: Vec<J2kSubband>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubbandOrientation {
    #[default]
    LL,
    HL,
    LH,
    HH,
}

#[derive(Debug, Clone, Default)]
pub struct J2kSubband {
    pub orientation: SubbandOrientation,
    pub width: u32,
    pub height: u32,
    pub codeblocks: Vec<J2kCodeBlock>,
    /// Assembled plane of dequantized coefficients, filled in during reconstruction.
    pub data: Vec<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct J2kCodeBlock {
    /// Position of this code-block within the subband's code-block grid, in pixels.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub compressed_data: Vec<u8>,
    pub zero_bit_planes: u8,
    pub coding_passes: u8,
    /// Decoded (or pre-encode) coefficients, row-major, `width * height` entries.
    pub coefficients: Vec<i32>,
    pub decoded: bool,
}

/// Coding Style Default (COD) marker information.
#[derive(Debug, Clone, Default)]
pub struct J2kCod {
    pub coding_style: u8,
    pub progression_order: u8,
    pub number_of_layers: u16,
    pub mct: u8,
    pub decomposition_levels: u8,
    pub codeblock_width_exp: u8,
    pub codeblock_height_exp: u8,
    /// 0 = 9/7 irreversible, 1 = 5/3 reversible (Table A.20).
    pub transformation: u8,
    pub precinct_sizes: Vec<u8>,
}

/// Quantization Default (QCD) marker information.
#[derive(Debug, Clone, Default)]
pub struct J2kQcd {
    pub quant_style: u8,
    pub step_sizes: Vec<u16>,
}

impl J2kImage {
    /// Reconstructs final integer pixel samples for every tile/component by
    /// running the inverse multi-level DWT, undoing the multiple component
    /// transform (if any), and clamping back into the component's native range.
    ///
    /// The result is packed component-interleaved, one byte per sample for
    /// depths <= 8 and two big-endian bytes per sample otherwise.
    pub fn reconstruct_pixels(&self) -> Result<Vec<u8>, JpeglsError> {
        let tile = self
            .tiles
            .first()
            .ok_or_else(|| JpeglsError::UnsupportedFeature("no tiles decoded".to_string()))?;
        let cod = self
            .cod
            .as_ref()
            .ok_or_else(|| JpeglsError::UnsupportedFeature("missing COD".to_string()))?;

        let mut planes: Vec<Vec<i32>> = Vec::with_capacity(tile.components.len());
        for tc in &tile.components {
            planes.push(self.reconstruct_component_plane(tc, cod)?);
        }

        if cod.mct == 1 && planes.len() >= 3 {
            let (rest, first) = planes.split_at_mut(1);
            let (first0, first1) = first.split_at_mut(1);
            inverse_reversible_color_transform(&mut first0[0], &mut first1[0], &mut rest[0]);
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let mut out = Vec::with_capacity(width * height * planes.len() * 2);
        for i in 0..width * height {
            for (c, plane) in planes.iter().enumerate() {
                let depth = self
                    .components
                    .get(c)
                    .map(|ci| ci.depth)
                    .unwrap_or(8)
                    .max(1);
                let shift = 1i32 << (depth - 1);
                let max_val = (1i32 << depth) - 1;
                let sample = (plane.get(i).copied().unwrap_or(0) + shift).clamp(0, max_val);
                if depth <= 8 {
                    out.push(sample as u8);
                } else {
                    out.push((sample >> 8) as u8);
                    out.push((sample & 0xFF) as u8);
                }
            }
        }
        Ok(out)
    }

    fn reconstruct_component_plane(
        &self,
        tc: &J2kTileComponent,
        cod: &J2kCod,
    ) -> Result<Vec<i32>, JpeglsError> {
        let levels = cod.decomposition_levels as usize;
        let width = self.width as usize;
        let height = self.height as usize;
        let mut full = vec![0i32; width * height];

        // tc.resolutions[0] is the coarsest LL-only resolution; subsequent
        // entries each add one decomposition level's worth of HL/LH/HH detail.
        if let Some(ll_res) = tc.resolutions.first() {
            if let Some(ll_band) = ll_res
                .subbands
                .iter()
                .find(|b| b.orientation == SubbandOrientation::LL)
            {
                place_subband(&mut full, width, ll_band, 0, 0);
            }
        }

        for res in tc.resolutions.iter().skip(1) {
            let cur_w = res.width as usize;
            let cur_h = res.height as usize;
            #[allow(clippy::manual_div_ceil)]
            let ll_w = (cur_w + 1) / 2;
            #[allow(clippy::manual_div_ceil)]
            let ll_h = (cur_h + 1) / 2;
            for band in &res.subbands {
                let (ox, oy) = match band.orientation {
                    SubbandOrientation::LL => (0, 0),
                    SubbandOrientation::HL => (ll_w, 0),
                    SubbandOrientation::LH => (0, ll_h),
                    SubbandOrientation::HH => (ll_w, ll_h),
                };
                place_subband(&mut full, width, band, ox, oy);
            }
        }

        if cod.transformation == 1 {
            Dwt53::inverse_multilevel(&mut full, width, height, levels);
        } else {
            let mut f: Vec<f32> = full.iter().map(|&v| v as f32).collect();
            Dwt97::inverse_multilevel(&mut f, width, height, levels);
            full = f.iter().map(|&v| v.round() as i32).collect();
        }

        Ok(full)
    }
}

fn place_subband(full: &mut [i32], full_width: usize, band: &J2kSubband, ox: usize, oy: usize) {
    let w = band.width as usize;
    let h = band.height as usize;
    for y in 0..h {
        for x in 0..w {
            let src = band.data.get(y * w + x).copied().unwrap_or(0);
            let dst = (oy + y) * full_width + (ox + x);
            if dst < full.len() {
                full[dst] = src;
            }
        }
    }
}

/// Inverse Reversible Color Transform (Part 1, Annex G.2): Y/Cb/Cr -> R/G/B.
fn inverse_reversible_color_transform(y: &mut [i32], cb: &mut [i32], cr: &mut [i32]) {
    for i in 0..y.len().min(cb.len()).min(cr.len()) {
        let g = y[i] - ((cb[i] + cr[i]) >> 2);
        let r = cr[i] + g;
        let b = cb[i] + g;
        y[i] = r;
        cb[i] = g;
        cr[i] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruct_pixels_requires_tile_and_cod() {
        let image = J2kImage::default();
        assert!(image.reconstruct_pixels().is_err());
    }

    #[test]
    fn reconstruct_single_level_lossless_grayscale() {
        // A 4x4 image, single decomposition level, 5/3 reversible, already-flat
        // (all-zero detail subbands) so the LL band round-trips byte-exact.
        let mut image = J2kImage {
            width: 4,
            height: 4,
            component_count: 1,
            components: vec![J2kComponentInfo {
                depth: 8,
                is_signed: false,
                dx: 1,
                dy: 1,
            }],
            cod: Some(J2kCod {
                decomposition_levels: 1,
                transformation: 1,
                ..Default::default()
            }),
            ..Default::default()
        };
        let ll = J2kSubband {
            orientation: SubbandOrientation::LL,
            width: 2,
            height: 2,
            data: vec![0, 0, 0, 0],
            ..Default::default()
        };
        let detail = |o: SubbandOrientation| J2kSubband {
            orientation: o,
            width: 2,
            height: 2,
            data: vec![0, 0, 0, 0],
            ..Default::default()
        };
        image.tiles.push(J2kTile {
            index: 0,
            components: vec![J2kTileComponent {
                component_index: 0,
                resolutions: vec![
                    J2kResolution {
                        level: 0,
                        width: 2,
                        height: 2,
                        subbands: vec![ll],
                    },
                    J2kResolution {
                        level: 1,
                        width: 4,
                        height: 4,
                        subbands: vec![
                            detail(SubbandOrientation::HL),
                            detail(SubbandOrientation::LH),
                            detail(SubbandOrientation::HH),
                        ],
                    },
                ],
            }],
        });

        let pixels = image.reconstruct_pixels().unwrap();
        assert_eq!(pixels.len(), 16);
        assert!(pixels.iter().all(|&p| p == 128));
    }
}
