//! Four-character codes and the host-facing pixel format descriptor.

use std::fmt;

/// A four-character format identifier as exchanged with the host protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Construct from a 4-byte literal.
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Raw bytes of the code.
    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

/// Recognized uncompressed pixel-format codes.
pub mod pixel {
    use super::FourCc;

    /// YUV 4:2:0 planar, Y/U/V order.
    pub const I420: FourCc = FourCc::new(b"I420");
    /// Alias of I420.
    pub const IYUV: FourCc = FourCc::new(b"IYUV");
    /// YUV 4:2:0 planar, Y/V/U order.
    pub const YV12: FourCc = FourCc::new(b"YV12");
    /// YUV 4:2:2 planar, Y/V/U order.
    pub const YV16: FourCc = FourCc::new(b"YV16");
    /// YUV 4:4:4 planar, Y/V/U order.
    pub const YV24: FourCc = FourCc::new(b"YV24");
    /// YUV 4:2:0, one luma plane and one interleaved chroma plane.
    pub const NV12: FourCc = FourCc::new(b"NV12");
    /// YUV 4:2:2 packed, Y0 U Y1 V order.
    pub const YUYV: FourCc = FourCc::new(b"YUYV");
    /// Alias of YUYV.
    pub const YUY2: FourCc = FourCc::new(b"YUY2");
    /// YUV 4:2:2 packed, U Y0 V Y1 order.
    pub const UYVY: FourCc = FourCc::new(b"UYVY");
    /// BT.709 variant of UYVY; same byte layout.
    pub const HDYC: FourCc = FourCc::new(b"HDYC");
}

/// Recognized compressed bitstream codes.
pub mod bitstream {
    use super::FourCc;

    pub const HEVC: FourCc = FourCc::new(b"HEVC");
    pub const H265_UPPER: FourCc = FourCc::new(b"H265");
    pub const H265_LOWER: FourCc = FourCc::new(b"h265");
    pub const X265_UPPER: FourCc = FourCc::new(b"X265");
    pub const X265_LOWER: FourCc = FourCc::new(b"x265");

    /// All bitstream codes the adapter answers to, preferred first.
    pub const ALL: [FourCc; 5] = [HEVC, H265_UPPER, H265_LOWER, X265_UPPER, X265_LOWER];
}

/// Check whether a code identifies the adapter's compressed bitstream.
pub fn is_bitstream_code(code: FourCc) -> bool {
    bitstream::ALL.contains(&code)
}

/// Container identification for a pixel format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    /// A four-character code.
    FourCc(FourCc),
    /// Uncompressed RGB identified by bit depth (24 or 32).
    Rgb { bit_count: u16 },
}

/// A host-supplied frame format description.
///
/// The height is signed: for RGB formats a negative height declares top-down
/// row order, a positive height bottom-up. YUV formats are top-down
/// regardless of sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Format identification.
    pub tag: FormatTag,
    /// Frame width in pixels.
    pub width: i32,
    /// Frame height in pixels; sign carries RGB orientation.
    pub height: i32,
    /// Declared image buffer size in bytes, zero when unspecified.
    pub image_size: u32,
    /// Side-band configuration payload (decoder configuration record or
    /// parameter sets), when the host attached one.
    pub extra_data: Option<Vec<u8>>,
}

impl PixelFormatDescriptor {
    /// Describe a frame by four-character code.
    pub fn with_four_cc(code: FourCc, width: i32, height: i32) -> Self {
        Self {
            tag: FormatTag::FourCc(code),
            width,
            height,
            image_size: 0,
            extra_data: None,
        }
    }

    /// Describe an uncompressed RGB frame.
    pub fn with_rgb(bit_count: u16, width: i32, height: i32) -> Self {
        Self {
            tag: FormatTag::Rgb { bit_count },
            width,
            height,
            image_size: 0,
            extra_data: None,
        }
    }

    /// Attach a side-band configuration payload.
    pub fn with_extra_data(mut self, data: Vec<u8>) -> Self {
        self.extra_data = Some(data);
        self
    }

    /// Height with the orientation sign stripped.
    pub fn abs_height(&self) -> i32 {
        self.height.abs()
    }
}
