//! # hevcbridge Core
//!
//! Core types for the hevcbridge codec adapter.
//!
//! This crate provides the leaf building blocks the session layer is built
//! on:
//! - Error handling types
//! - Four-character codes and the host pixel format descriptor
//! - Color space identification (the pixel format catalog)
//! - Frame buffer geometry (the layout calculator)
//! - Bitstream reframing between length-prefixed and start-code delimiting
//! - Picture buffer carriers

pub mod colorspace;
pub mod error;
pub mod fourcc;
pub mod layout;
pub mod picture;
pub mod reframer;

pub use colorspace::{resolve, ColorSpace, OrientationFlags, ResolvedFormat};
pub use error::{Error, Result};
pub use fourcc::{is_bitstream_code, FormatTag, FourCc, PixelFormatDescriptor};
pub use layout::{FrameBufferLayout, PlaneLayout, MAX_PLANES};
pub use picture::{DestPicture, DestPlane, PictureBuf, PictureView};
pub use reframer::{to_start_code, ReframeOutcome, START_CODE};
