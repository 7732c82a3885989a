//! Color space identification and the pixel format catalog.
//!
//! [`resolve`] maps a host descriptor to a [`ColorSpace`] plus orientation
//! flags. Orientation is deliberately carried out-of-band so that two
//! descriptors for the same sample arrangement compare equal regardless of
//! row order.

use bitflags::bitflags;
use std::fmt;

use crate::fourcc::{pixel, FormatTag, PixelFormatDescriptor};

/// Pixel sample arrangement.
///
/// `Yv12`/`Yv16`/`Yv24` share buffer geometry with their straight-order
/// counterparts; they differ only in chroma plane order, which matters to
/// converters and to the decode-side plane swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Planar YUV 4:2:0, Y/U/V order.
    I420,
    /// Planar YUV 4:2:0, Y/V/U order.
    Yv12,
    /// Planar YUV 4:2:2, Y/U/V order.
    I422,
    /// Planar YUV 4:2:2, Y/V/U order.
    Yv16,
    /// Planar YUV 4:4:4, Y/U/V order.
    I444,
    /// Planar YUV 4:4:4, Y/V/U order.
    Yv24,
    /// Semi-planar YUV 4:2:0, one luma plane and one interleaved UV plane.
    Nv12,
    /// Packed YUV 4:2:2, Y0 U Y1 V byte order.
    Yuyv,
    /// Packed YUV 4:2:2, U Y0 V Y1 byte order.
    Uyvy,
    /// Packed BGR, 24 bits per pixel.
    Bgr24,
    /// Packed BGRA, 32 bits per pixel.
    Bgra32,
}

impl ColorSpace {
    /// Number of planes in a frame buffer of this color space.
    pub fn num_planes(&self) -> usize {
        match self {
            Self::I420 | Self::Yv12 | Self::I422 | Self::Yv16 | Self::I444 | Self::Yv24 => 3,
            Self::Nv12 => 2,
            Self::Yuyv | Self::Uyvy | Self::Bgr24 | Self::Bgra32 => 1,
        }
    }

    /// Check if this is a planar YUV format.
    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            Self::I420 | Self::Yv12 | Self::I422 | Self::Yv16 | Self::I444 | Self::Yv24
        )
    }

    /// Check if this is an RGB-family format.
    pub fn is_rgb(&self) -> bool {
        matches!(self, Self::Bgr24 | Self::Bgra32)
    }

    /// Check if the chroma planes are stored V-before-U.
    pub fn swapped_chroma(&self) -> bool {
        matches!(self, Self::Yv12 | Self::Yv16 | Self::Yv24)
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I420 => write!(f, "i420"),
            Self::Yv12 => write!(f, "yv12"),
            Self::I422 => write!(f, "i422"),
            Self::Yv16 => write!(f, "yv16"),
            Self::I444 => write!(f, "i444"),
            Self::Yv24 => write!(f, "yv24"),
            Self::Nv12 => write!(f, "nv12"),
            Self::Yuyv => write!(f, "yuyv"),
            Self::Uyvy => write!(f, "uyvy"),
            Self::Bgr24 => write!(f, "bgr24"),
            Self::Bgra32 => write!(f, "bgra32"),
        }
    }
}

bitflags! {
    /// Orientation of a resolved format relative to top-down row order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OrientationFlags: u32 {
        /// Rows are stored bottom-up; output must be vertically flipped.
        const VFLIP = 0x0001;
    }
}

/// The result of resolving a host descriptor: a color space plus the
/// orientation it was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub color_space: ColorSpace,
    pub orientation: OrientationFlags,
}

impl ResolvedFormat {
    fn top_down(color_space: ColorSpace) -> Self {
        Self {
            color_space,
            orientation: OrientationFlags::empty(),
        }
    }
}

/// Resolve a host descriptor to an internal color space.
///
/// YUV formats are always top-down regardless of the height sign. For RGB
/// the bitmap convention applies: a non-negative height declares bottom-up
/// storage and sets [`OrientationFlags::VFLIP`]. Unrecognized codes and RGB
/// depths yield `None`; callers must treat that as a format rejection.
pub fn resolve(desc: &PixelFormatDescriptor) -> Option<ResolvedFormat> {
    match desc.tag {
        FormatTag::FourCc(code) => {
            let cs = match code {
                c if c == pixel::I420 || c == pixel::IYUV => ColorSpace::I420,
                c if c == pixel::YV12 => ColorSpace::Yv12,
                c if c == pixel::YV16 => ColorSpace::Yv16,
                c if c == pixel::YV24 => ColorSpace::Yv24,
                c if c == pixel::NV12 => ColorSpace::Nv12,
                c if c == pixel::YUYV || c == pixel::YUY2 => ColorSpace::Yuyv,
                c if c == pixel::UYVY || c == pixel::HDYC => ColorSpace::Uyvy,
                _ => return None,
            };
            Some(ResolvedFormat::top_down(cs))
        }
        FormatTag::Rgb { bit_count } => {
            let cs = match bit_count {
                24 => ColorSpace::Bgr24,
                32 => ColorSpace::Bgra32,
                _ => return None,
            };
            let orientation = if desc.height < 0 {
                OrientationFlags::empty()
            } else {
                OrientationFlags::VFLIP
            };
            Some(ResolvedFormat { color_space: cs, orientation })
        }
    }
}
