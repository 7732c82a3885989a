//! Frame buffer geometry.
//!
//! [`FrameBufferLayout::compute`] derives plane count, per-plane stride and
//! byte offset, and total buffer size from a color space and frame
//! dimensions. It is a pure function: identical inputs always produce
//! identical layouts, and it never allocates pixel storage — callers own
//! allocation against [`FrameBufferLayout::total_size`].

use crate::colorspace::ColorSpace;
use crate::error::{Error, Result};

/// Maximum number of planes in any supported color space.
pub const MAX_PLANES: usize = 3;

/// Geometry of a single plane within a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneLayout {
    /// Bytes per row.
    pub stride: usize,
    /// Byte offset of the plane within the buffer.
    pub offset: usize,
    /// Total plane size in bytes.
    pub size: usize,
}

/// Complete buffer geometry for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferLayout {
    planes: [PlaneLayout; MAX_PLANES],
    plane_count: usize,
    total_size: usize,
}

/// Round up to the nearest even value.
fn round_up_even(v: usize) -> usize {
    (v + 1) & !1
}

impl FrameBufferLayout {
    /// Compute the layout for a color space at the given dimensions.
    ///
    /// Width and height are rounded up to even wherever the format requires
    /// 2x2 or 2x1 chroma alignment; the caller sees the resulting strides,
    /// not the rounded dimensions. Zero dimensions are rejected.
    pub fn compute(color_space: ColorSpace, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Layout(format!(
                "degenerate dimensions {}x{}",
                width, height
            )));
        }

        let w = width as usize;
        let h = height as usize;

        let mut planes = [PlaneLayout::default(); MAX_PLANES];
        let plane_count;

        match color_space {
            ColorSpace::I420 | ColorSpace::Yv12 => {
                let w = round_up_even(w);
                let h = round_up_even(h);
                plane_count = 3;
                planes[0] = PlaneLayout { stride: w, offset: 0, size: w * h };
                planes[1].stride = w / 2;
                planes[1].size = (w / 2) * (h / 2);
                planes[2].stride = w / 2;
                planes[2].size = (w / 2) * (h / 2);
            }
            ColorSpace::I422 | ColorSpace::Yv16 => {
                let w = round_up_even(w);
                plane_count = 3;
                planes[0] = PlaneLayout { stride: w, offset: 0, size: w * h };
                planes[1].stride = w / 2;
                planes[1].size = (w / 2) * h;
                planes[2].stride = w / 2;
                planes[2].size = (w / 2) * h;
            }
            ColorSpace::I444 | ColorSpace::Yv24 => {
                plane_count = 3;
                for plane in planes.iter_mut() {
                    plane.stride = w;
                    plane.size = w * h;
                }
            }
            ColorSpace::Nv12 => {
                let w = round_up_even(w);
                let h = round_up_even(h);
                plane_count = 2;
                planes[0] = PlaneLayout { stride: w, offset: 0, size: w * h };
                planes[1].stride = w;
                planes[1].size = w * (h / 2);
            }
            ColorSpace::Yuyv | ColorSpace::Uyvy => {
                let w = round_up_even(w);
                plane_count = 1;
                planes[0] = PlaneLayout { stride: 2 * w, offset: 0, size: 2 * w * h };
            }
            ColorSpace::Bgr24 => {
                // Rows padded to a 4-byte boundary.
                let stride = (3 * w + 3) & !3;
                plane_count = 1;
                planes[0] = PlaneLayout { stride, offset: 0, size: stride * h };
            }
            ColorSpace::Bgra32 => {
                plane_count = 1;
                planes[0] = PlaneLayout { stride: 4 * w, offset: 0, size: 4 * w * h };
            }
        }

        let mut total_size = 0;
        for plane in planes.iter_mut().take(plane_count) {
            plane.offset = total_size;
            total_size += plane.size;
        }

        Ok(Self {
            planes,
            plane_count,
            total_size,
        })
    }

    /// Number of planes.
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Geometry of one plane.
    pub fn plane(&self, index: usize) -> Option<&PlaneLayout> {
        self.planes.get(index).filter(|_| index < self.plane_count)
    }

    /// Stride of one plane, zero when out of range.
    pub fn stride(&self, index: usize) -> usize {
        self.plane(index).map(|p| p.stride).unwrap_or(0)
    }

    /// Total buffer size in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}
