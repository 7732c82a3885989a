//! # hevcbridge Adapter
//!
//! Session layer of the hevcbridge codec adapter: exposes an HEVC
//! encoder/decoder pair through a host-driven media codec protocol.
//!
//! The host negotiates formats through [`FormatNegotiator`], then drives one
//! [`EncodeSession`] or [`DecodeSession`] at a time through its
//! Begin -> Process* -> End lifecycle. The actual codec engines and pixel
//! sample math live behind the traits in [`engine`]; this crate owns format
//! resolution, buffer geometry, bitstream reframing, keyframe
//! classification, and delayed-frame draining.
//!
//! # Example
//!
//! ```rust,ignore
//! use hevcbridge_adapter::{EncodeSession, EncoderConfig, FormatNegotiator};
//!
//! let mut session = EncodeSession::new(FormatNegotiator::default(), EncoderConfig::default());
//! session.begin(&input_desc, &output_desc, &backend)?;
//! for frame in frames {
//!     let outcome = session.process(&input_desc, frame, &mut out)?;
//!     // outcome.bytes_written, outcome.keyframe
//! }
//! session.end(); // drains pipelined output
//! ```

pub mod config;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod host;
pub mod negotiate;

pub use config::{
    EncoderConfig, EncoderParameters, MatrixCoefficients, Preset, Profile, RateControl, Tune,
};
pub use decode::{DecodeOutcome, DecodeSession, INPUT_PADDING};
pub use encode::{EncodeSession, ProcessOutcome};
pub use engine::{
    BitstreamSink, BitstreamUnit, DecoderBackend, DecoderEngine, DecoderParameters,
    EncoderBackend, EncoderEngine, NativeFrame, PixelConverter, PixelScaler, ScalerSpec, UnitType,
};
pub use host::{SessionId, SessionRegistry, Status};
pub use negotiate::{CspPolicy, FormatNegotiator};
