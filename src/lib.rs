/*!
# jpegexp-rs

`jpegexp-rs` is a pure Rust library for encoding and decoding medical-imaging
grade compressed codestreams. It provides a memory-safe implementation of two
standards commonly layered under DICOM transfer syntaxes:

### JPEG-LS (ISO/IEC 14495-1 / ITU-T T.87)
- Lossless and near-lossless compression, 8-16 bit depth, custom LSE presets.
- Modules: `jpegls`

### JPEG 2000 Part 1 (ISO/IEC 15444-1)
- Tier-1: MQ arithmetic coder, bit-plane context modeling (EBCOT).
- Tier-2: tag-tree coding, packet header parsing/writing.
- Codestream: main/tile header marker segments (SOC, SIZ, COD, QCD, SOT, SOD, EOC).
- DWT: 5/3 reversible and 9/7 irreversible filter banks, multi-level drivers.
- Modules: `jpeg2000`

## Safety
This library is written entirely in safe Rust.
*/

pub mod constants;
pub mod error;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;

pub mod jpeg2000;
pub mod jpegls;

pub use error::JpeglsError;

/// Basic information about an image frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Width of the frame in pixels.
    pub width: u32,
    /// Height of the frame in pixels.
    pub height: u32,
    /// Bits per sample (2-16).
    pub bits_per_sample: i32,
    /// Number of components (e.g., 1 for grayscale, 3 for RGB).
    pub component_count: i32,
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke_test() {
        assert!(true);
    }
}
