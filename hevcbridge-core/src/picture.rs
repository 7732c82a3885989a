//! Picture buffer carriers.
//!
//! [`PictureBuf`] owns pixel storage laid out by [`FrameBufferLayout`];
//! [`PictureView`] borrows a host-provided buffer with a layout attached;
//! [`DestPicture`] describes destination plane geometry over a caller's
//! output buffer, including the negative-stride form used for vertically
//! flipped RGB output.

use crate::colorspace::ColorSpace;
use crate::error::{Error, Result};
use crate::layout::{FrameBufferLayout, MAX_PLANES};

/// An owned picture buffer.
///
/// Allocated once per session for the conversion target; the layout is fixed
/// at construction.
pub struct PictureBuf {
    color_space: ColorSpace,
    layout: FrameBufferLayout,
    data: Vec<u8>,
    /// Presentation timestamp, incremented by the session per accepted frame.
    pub pts: i64,
}

impl PictureBuf {
    /// Allocate a zeroed picture buffer for the given geometry.
    pub fn new(color_space: ColorSpace, width: u32, height: u32) -> Result<Self> {
        let layout = FrameBufferLayout::compute(color_space, width, height)?;
        let data = vec![0u8; layout.total_size()];
        Ok(Self {
            color_space,
            layout,
            data,
            pts: 0,
        })
    }

    /// Color space of the stored picture.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Buffer geometry.
    pub fn layout(&self) -> &FrameBufferLayout {
        &self.layout
    }

    /// Whole backing buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable backing buffer.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One plane's bytes.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let plane = self.layout.plane(index)?;
        self.data.get(plane.offset..plane.offset + plane.size)
    }

    /// One plane's bytes, mutable.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let plane = *self.layout.plane(index)?;
        self.data.get_mut(plane.offset..plane.offset + plane.size)
    }

    /// Borrow as a read-only view.
    pub fn view(&self) -> PictureView<'_> {
        PictureView {
            color_space: self.color_space,
            layout: &self.layout,
            data: &self.data,
            pts: self.pts,
        }
    }
}

/// A borrowed picture: a layout over bytes the caller owns.
#[derive(Clone, Copy)]
pub struct PictureView<'a> {
    pub color_space: ColorSpace,
    pub layout: &'a FrameBufferLayout,
    pub data: &'a [u8],
    pub pts: i64,
}

impl<'a> PictureView<'a> {
    /// Attach a layout to a raw frame buffer.
    ///
    /// Fails when the buffer is smaller than the layout demands.
    pub fn new(
        color_space: ColorSpace,
        layout: &'a FrameBufferLayout,
        data: &'a [u8],
    ) -> Result<Self> {
        if data.len() < layout.total_size() {
            return Err(Error::BufferTooSmall {
                needed: layout.total_size(),
                available: data.len(),
            });
        }
        Ok(Self {
            color_space,
            layout,
            data,
            pts: 0,
        })
    }

    /// One plane's bytes.
    pub fn plane(&self, index: usize) -> Option<&'a [u8]> {
        let plane = self.layout.plane(index)?;
        self.data.get(plane.offset..plane.offset + plane.size)
    }
}

/// Destination geometry for one plane of a [`DestPicture`].
///
/// `offset` addresses the first row to write; a negative `stride` walks rows
/// upward from it, which is how bottom-up RGB output is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestPlane {
    pub offset: usize,
    pub stride: isize,
}

/// Destination plane geometry over a caller-owned output buffer.
pub struct DestPicture<'a> {
    data: &'a mut [u8],
    planes: [DestPlane; MAX_PLANES],
    plane_count: usize,
}

impl<'a> DestPicture<'a> {
    /// Build destination geometry from a layout over an output buffer.
    pub fn from_layout(layout: &FrameBufferLayout, data: &'a mut [u8]) -> Result<Self> {
        if data.len() < layout.total_size() {
            return Err(Error::BufferTooSmall {
                needed: layout.total_size(),
                available: data.len(),
            });
        }
        let mut planes = [DestPlane::default(); MAX_PLANES];
        for (i, plane) in planes.iter_mut().enumerate() {
            if let Some(src) = layout.plane(i) {
                plane.offset = src.offset;
                plane.stride = src.stride as isize;
            }
        }
        Ok(Self {
            data,
            planes,
            plane_count: layout.plane_count(),
        })
    }

    /// Swap the second and third plane.
    ///
    /// Used when the destination color space stores chroma V-before-U while
    /// the source is U-before-V.
    pub fn swap_chroma(&mut self) -> Result<()> {
        if self.plane_count < 3 {
            return Err(Error::Layout(
                "chroma swap requires a three-plane destination".into(),
            ));
        }
        self.planes.swap(1, 2);
        Ok(())
    }

    /// Flip the first plane vertically: point at the last row and negate the
    /// stride. Only single-plane RGB destinations can be flipped.
    pub fn vflip(&mut self, height: u32) -> Result<()> {
        if self.plane_count != 1 {
            return Err(Error::Layout(
                "vertical flip only applies to packed RGB destinations".into(),
            ));
        }
        let plane = &mut self.planes[0];
        let stride = plane.stride;
        if stride < 0 {
            return Err(Error::Layout("destination already flipped".into()));
        }
        plane.offset += stride as usize * (height as usize - 1);
        plane.stride = -stride;
        Ok(())
    }

    /// Number of planes.
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Geometry of one plane.
    pub fn plane(&self, index: usize) -> Option<DestPlane> {
        (index < self.plane_count).then(|| self.planes[index])
    }

    /// The whole destination buffer.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Write one row into a plane, honoring a possibly negative stride.
    pub fn write_row(&mut self, plane: usize, row: usize, bytes: &[u8]) -> Result<()> {
        let geom = self.plane(plane).ok_or_else(|| {
            Error::Layout(format!("destination plane {} out of range", plane))
        })?;
        let start = geom.offset as isize + geom.stride * row as isize;
        let start = usize::try_from(start)
            .map_err(|_| Error::Layout("row outside destination buffer".into()))?;
        let end = start + bytes.len();
        let dst = self
            .data
            .get_mut(start..end)
            .ok_or_else(|| Error::Layout("row outside destination buffer".into()))?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}
