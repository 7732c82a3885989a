//! Decode session lifecycle.
//!
//! One [`DecodeSession`] owns one pass through the external decoder: Begin
//! validates formats, detects the elementary stream's framing convention
//! from the side-band configuration payload and opens the decoder; Process
//! reframes each payload as needed, submits it, and either populates the
//! host's output buffer from the decoded picture or synthesizes a black
//! placeholder while the pipeline is still filling; End releases everything
//! and is safe from any state.

use tracing::debug;

use hevcbridge_core::{
    resolve, to_start_code, ColorSpace, DestPicture, Error, FrameBufferLayout, OrientationFlags,
    PixelFormatDescriptor, ReframeOutcome, Result, START_CODE,
};

use crate::engine::{DecoderBackend, DecoderEngine, DecoderParameters, PixelScaler, ScalerSpec};
use crate::negotiate::FormatNegotiator;

/// Zero bytes appended past the logical payload end so decoders with wire
/// look-ahead never read uninitialized memory.
pub const INPUT_PADDING: usize = 64;

/// What a Process call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A decoded picture was written to the output buffer.
    Decoded,
    /// The decoder has not produced a picture yet; the output buffer holds
    /// a black placeholder frame.
    Placeholder,
}

struct OpenDecoder {
    engine: Box<dyn DecoderEngine>,
    backend: Box<dyn DecoderBackend>,
    /// Built lazily once the first decoded picture reveals the source
    /// geometry.
    scaler: Option<Box<dyn PixelScaler>>,
    /// Reused input buffer; grown as needed, never shrunk.
    scratch: Vec<u8>,
    /// The elementary stream arrived length-prefixed and must be reframed.
    length_prefixed: bool,
    output_color_space: ColorSpace,
    output_layout: FrameBufferLayout,
    swap_chroma: bool,
    vflip: bool,
    width: u32,
    height: u32,
}

/// A decoding session.
pub struct DecodeSession {
    negotiator: FormatNegotiator,
    state: Option<OpenDecoder>,
}

/// Detect the stream's framing convention from the side-band configuration
/// payload, once per session.
///
/// A leading start code marks a start-code stream. The configuration-record
/// pattern (version byte 1 with the reserved bit masks at offsets 4 and 5)
/// marks a length-prefixed stream. Anything else is treated as start-code.
fn detect_length_prefixed(extra_data: Option<&[u8]>) -> bool {
    match extra_data {
        Some(buf) if buf.len() >= 4 && buf[..4] == START_CODE => false,
        Some(buf)
            if buf.len() >= 7
                && buf[0] == 0x01
                && buf[4] & 0xFC == 0xFC
                && buf[5] & 0xE0 == 0xE0 =>
        {
            true
        }
        _ => false,
    }
}

/// Fill an output buffer with the black pattern for a color space.
///
/// Planar and semi-planar YUV get broadcast black luma (0x10) and neutral
/// chroma (0x80); packed 4:2:2 gets the equivalent 16-bit pattern; RGB and
/// anything else gets zeros.
fn fill_black(out: &mut [u8], color_space: ColorSpace, layout: &FrameBufferLayout) {
    let total = layout.total_size();
    let region = &mut out[..total];
    match color_space {
        ColorSpace::I420
        | ColorSpace::Yv12
        | ColorSpace::I422
        | ColorSpace::Yv16
        | ColorSpace::I444
        | ColorSpace::Yv24
        | ColorSpace::Nv12 => {
            let luma = layout.plane(0).map(|p| p.size).unwrap_or(total);
            region[..luma].fill(0x10);
            region[luma..].fill(0x80);
        }
        ColorSpace::Yuyv => {
            for pair in region.chunks_exact_mut(2) {
                pair[0] = 0x10;
                pair[1] = 0x80;
            }
        }
        ColorSpace::Uyvy => {
            for pair in region.chunks_exact_mut(2) {
                pair[0] = 0x80;
                pair[1] = 0x10;
            }
        }
        ColorSpace::Bgr24 | ColorSpace::Bgra32 => region.fill(0x00),
    }
}

impl DecodeSession {
    /// Create a closed session.
    pub fn new(negotiator: FormatNegotiator) -> Self {
        Self {
            negotiator,
            state: None,
        }
    }

    /// Whether the session is open for Process calls.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Open the session.
    ///
    /// Validates the format pair in the decode direction, records the output
    /// orientation and plane order, detects the bitstream framing from the
    /// input descriptor's side-band payload, and opens the external decoder.
    pub fn begin(
        &mut self,
        input: &PixelFormatDescriptor,
        output: &PixelFormatDescriptor,
        backend: Box<dyn DecoderBackend>,
    ) -> Result<()> {
        self.end();

        self.negotiator.query_decode(input, Some(output))?;

        let resolved =
            resolve(output).ok_or_else(|| Error::format_rejected("unrecognized output format"))?;
        let width = input.width as u32;
        let height = input.abs_height() as u32;
        let output_layout = FrameBufferLayout::compute(resolved.color_space, width, height)?;

        let length_prefixed = detect_length_prefixed(input.extra_data.as_deref());

        let params = DecoderParameters {
            coded_width: width,
            coded_height: height,
            extra_data: input.extra_data.clone(),
        };
        let engine = backend
            .open_decoder(&params)
            .map_err(|e| Error::EngineOpenFailed(e.to_string()))?;

        debug!(
            width,
            height,
            output = %resolved.color_space,
            length_prefixed,
            "decoder opened"
        );

        self.state = Some(OpenDecoder {
            engine,
            backend,
            scaler: None,
            scratch: Vec::new(),
            length_prefixed,
            output_color_space: resolved.color_space,
            output_layout,
            swap_chroma: resolved.color_space.swapped_chroma(),
            vflip: resolved.orientation.contains(OrientationFlags::VFLIP),
            width,
            height,
        });
        Ok(())
    }

    /// Decode one compressed payload into the caller's output buffer.
    ///
    /// While the decoder pipeline has not produced a picture the output is
    /// filled with the black pattern for the negotiated format and
    /// [`DecodeOutcome::Placeholder`] is returned. Malformed length-prefixed
    /// payloads are passed through unmodified rather than failing the
    /// session.
    pub fn process(&mut self, payload: &[u8], out: &mut [u8]) -> Result<DecodeOutcome> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::InvalidState("process before begin".into()))?;

        if out.len() < state.output_layout.total_size() {
            return Err(Error::BufferTooSmall {
                needed: state.output_layout.total_size(),
                available: out.len(),
            });
        }

        // Grow-only scratch copy with a zeroed look-ahead tail.
        let needed = payload.len() + INPUT_PADDING;
        if state.scratch.len() < needed {
            state.scratch.resize(needed, 0);
        }
        state.scratch[..payload.len()].copy_from_slice(payload);
        state.scratch[payload.len()..needed].fill(0);

        if state.length_prefixed {
            match to_start_code(&mut state.scratch[..payload.len()]) {
                ReframeOutcome::Converted | ReframeOutcome::AlreadyStartCode => {}
                ReframeOutcome::Unchanged => {
                    // Best effort: hand malformed framing to the decoder
                    // as-is.
                    debug!(len = payload.len(), "payload failed length-prefix validation");
                }
            }
        }

        let frame = state
            .engine
            .decode(&state.scratch[..payload.len()])
            .map_err(|e| Error::Engine(e.to_string()))?;

        let Some(native) = frame else {
            fill_black(out, state.output_color_space, &state.output_layout);
            return Ok(DecodeOutcome::Placeholder);
        };

        let mut dest = DestPicture::from_layout(&state.output_layout, out)?;
        if state.swap_chroma {
            dest.swap_chroma()?;
        }
        if state.vflip {
            dest.vflip(state.height)?;
        }

        if state.scaler.is_none() {
            let spec = ScalerSpec {
                src_width: native.width,
                src_height: native.height,
                dst_width: state.width,
                dst_height: state.height,
                dst_color_space: state.output_color_space,
            };
            state.scaler = Some(state.backend.open_scaler(&spec)?);
        }
        if let Some(scaler) = state.scaler.as_mut() {
            scaler
                .scale(&native, &mut dest)
                .map_err(|e| Error::ConversionFailed(e.to_string()))?;
        }

        Ok(DecodeOutcome::Decoded)
    }

    /// Close the session, releasing the decoder, the scratch buffer, and
    /// any scaling context. Safe to call from any state, including before a
    /// successful Begin.
    pub fn end(&mut self) {
        if self.state.take().is_some() {
            debug!("decode session closed");
        }
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.end();
    }
}
