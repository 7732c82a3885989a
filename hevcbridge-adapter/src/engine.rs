//! External engine interfaces.
//!
//! The actual HEVC encode/decode algorithms and the pixel-sample math live
//! behind these traits. This crate supplies buffer geometry and call
//! sequencing; the engines supply the codec.

use hevcbridge_core::{ColorSpace, DestPicture, PictureBuf, PictureView, Result};

use crate::config::EncoderParameters;

/// Bitstream unit types the adapter distinguishes.
///
/// Only keyframe detection and parameter-set identification need named
/// variants; everything else passes through as [`UnitType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Instantaneous decoder refresh, with decodable leading pictures.
    IdrWRadl,
    /// Instantaneous decoder refresh, no leading pictures.
    IdrNLp,
    /// Clean random access.
    Cra,
    /// Video parameter set.
    Vps,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Any other unit type, carried by raw value.
    Other(u8),
}

impl UnitType {
    /// Create from the raw 6-bit unit type value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            v => Self::Other(v),
        }
    }

    /// Get the raw value.
    pub fn to_raw(&self) -> u8 {
        match self {
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Other(v) => *v,
        }
    }

    /// Check if a frame containing this unit is a keyframe.
    pub fn is_keyframe(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp | Self::Cra)
    }

    /// Check if this is a parameter set (VPS, SPS, or PPS).
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}

/// One encoded bitstream unit as emitted by the encoder engine.
///
/// Ownership is transient: the session copies or forwards units before the
/// next engine call.
#[derive(Debug, Clone)]
pub struct BitstreamUnit {
    /// Unit payload including its header byte(s).
    pub payload: Vec<u8>,
    /// Unit type tag, used for keyframe detection.
    pub unit_type: UnitType,
}

impl BitstreamUnit {
    /// Construct a unit.
    pub fn new(unit_type: UnitType, payload: Vec<u8>) -> Self {
        Self { payload, unit_type }
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// A decoded picture in the decoder engine's native representation.
#[derive(Debug, Clone)]
pub struct NativeFrame {
    /// Picture width in pixels.
    pub width: u32,
    /// Picture height in pixels.
    pub height: u32,
    /// Plane data in the engine's native format.
    pub planes: Vec<Vec<u8>>,
    /// Bytes per row, one entry per plane.
    pub strides: Vec<usize>,
}

/// Parameters handed to a decoder engine at open time.
#[derive(Debug, Clone)]
pub struct DecoderParameters {
    /// Coded frame width.
    pub coded_width: u32,
    /// Coded frame height.
    pub coded_height: u32,
    /// Out-of-band configuration bytes, when the host supplied them.
    pub extra_data: Option<Vec<u8>>,
}

/// Geometry for a decode-side scaling context.
#[derive(Debug, Clone, Copy)]
pub struct ScalerSpec {
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    /// Destination sample arrangement.
    pub dst_color_space: ColorSpace,
}

/// An opened encoder engine.
///
/// `encode(None)` signals end-of-stream and drains one step of pipelined
/// output; an empty return means the pipeline is dry.
pub trait EncoderEngine: Send {
    /// Submit a picture (or a drain request) and collect emitted units.
    fn encode(&mut self, picture: Option<&PictureView<'_>>) -> Result<Vec<BitstreamUnit>>;

    /// Retrieve the stream headers (VPS/SPS/PPS) on demand.
    fn headers(&mut self) -> Result<Vec<BitstreamUnit>>;
}

/// An opened decoder engine.
pub trait DecoderEngine: Send {
    /// Submit one compressed payload.
    ///
    /// Returns `None` while the pipeline has not produced a picture yet.
    fn decode(&mut self, payload: &[u8]) -> Result<Option<NativeFrame>>;
}

/// Encode-side pixel conversion into the session's internal color space.
pub trait PixelConverter: Send {
    fn convert(&mut self, src: &PictureView<'_>, dst: &mut PictureBuf) -> Result<()>;
}

/// Decode-side scaling/conversion from the engine's native frame into host
/// destination geometry.
pub trait PixelScaler: Send {
    fn scale(&mut self, src: &NativeFrame, dst: &mut DestPicture<'_>) -> Result<()>;
}

/// Factory for the encode-side collaborators.
pub trait EncoderBackend {
    /// Open an encoder with the derived parameters.
    fn open_encoder(&self, params: &EncoderParameters) -> Result<Box<dyn EncoderEngine>>;

    /// Build the pixel converter matching the derived parameters (internal
    /// color space, matrix coefficients, sample range).
    fn open_converter(&self, params: &EncoderParameters) -> Result<Box<dyn PixelConverter>>;
}

/// Factory for the decode-side collaborators.
pub trait DecoderBackend {
    /// Open a decoder bound to the adapter's fixed codec identity.
    fn open_decoder(&self, params: &DecoderParameters) -> Result<Box<dyn DecoderEngine>>;

    /// Build a scaling context once the source geometry is known.
    fn open_scaler(&self, spec: &ScalerSpec) -> Result<Box<dyn PixelScaler>>;
}

/// Optional sink for encoded output, e.g. a stream recorder.
///
/// Frames drained at session end are forwarded here as well, so a sink sees
/// every emitted frame even when the host has stopped asking for output.
pub trait BitstreamSink: Send {
    fn write_frame(&mut self, payload: &[u8], keyframe: bool) -> Result<()>;
}
