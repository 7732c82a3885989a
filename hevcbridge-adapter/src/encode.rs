//! Encode session lifecycle.
//!
//! One [`EncodeSession`] owns one pass through the external encoder:
//! Begin derives engine parameters and opens the encoder, Process feeds
//! frames and collects emitted bitstream units, End drains pipelined output
//! and releases everything. The session moves Begin -> Process* -> End
//! exactly once; a fatal mid-session error poisons it until a fresh Begin.

use tracing::{debug, warn};

use hevcbridge_core::{
    resolve, Error, FrameBufferLayout, PictureBuf, PictureView, PixelFormatDescriptor, Result,
};

use crate::config::{EncoderConfig, EncoderParameters};
use crate::engine::{BitstreamSink, BitstreamUnit, EncoderBackend, EncoderEngine, PixelConverter};
use crate::negotiate::FormatNegotiator;

/// Result of one Process call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Bytes written to the caller's output buffer; zero while the pipeline
    /// is still filling.
    pub bytes_written: usize,
    /// Whether the produced frame is a keyframe.
    pub keyframe: bool,
}

struct OpenEncoder {
    engine: Box<dyn EncoderEngine>,
    converter: Box<dyn PixelConverter>,
    /// Conversion target in the engine's internal color space.
    conv: PictureBuf,
    /// Frames still accepted: -1 unbounded, 0 stop, N counts down.
    frames_remaining: i64,
}

/// An encoding session.
pub struct EncodeSession {
    negotiator: FormatNegotiator,
    config: EncoderConfig,
    state: Option<OpenEncoder>,
    errored: bool,
    sink: Option<Box<dyn BitstreamSink>>,
    // Host hints for the pending session; zero means unknown.
    frame_total: u32,
    fps_num: u32,
    fps_den: u32,
}

impl EncodeSession {
    /// Create a closed session.
    pub fn new(negotiator: FormatNegotiator, config: EncoderConfig) -> Self {
        Self {
            negotiator,
            config,
            state: None,
            errored: false,
            sink: None,
            frame_total: 0,
            fps_num: 0,
            fps_den: 0,
        }
    }

    /// Hint the total frame count and frame rate of the pending session.
    ///
    /// A zero total means unbounded. Takes effect at the next Begin.
    pub fn frames_info(&mut self, total: u32, fps_num: u32, fps_den: u32) {
        self.frame_total = total;
        self.fps_num = fps_num;
        self.fps_den = fps_den;
    }

    /// Attach a sink that receives every emitted frame, including frames
    /// drained at End.
    pub fn set_sink(&mut self, sink: Box<dyn BitstreamSink>) {
        self.sink = Some(sink);
    }

    /// The negotiation surface this session validates against.
    pub fn negotiator(&self) -> &FormatNegotiator {
        &self.negotiator
    }

    /// Whether the session is open for Process calls.
    pub fn is_open(&self) -> bool {
        self.state.is_some() && !self.errored
    }

    /// Open the session.
    ///
    /// Validates the format pair, derives engine parameters, opens the
    /// external encoder and allocates the conversion buffer. On any failure
    /// the session ends up Closed and the error is reported; Begin succeeds
    /// only if the engine accepted the derived parameters.
    pub fn begin(
        &mut self,
        input: &PixelFormatDescriptor,
        output: &PixelFormatDescriptor,
        backend: &dyn EncoderBackend,
    ) -> Result<()> {
        // A still-open previous pass is drained and released first.
        self.end();

        match self.open_internal(input, output, backend) {
            Ok(state) => {
                self.state = Some(state);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "encode session begin failed");
                self.errored = true;
                Err(err)
            }
        }
    }

    fn open_internal(
        &mut self,
        input: &PixelFormatDescriptor,
        output: &PixelFormatDescriptor,
        backend: &dyn EncoderBackend,
    ) -> Result<OpenEncoder> {
        self.negotiator.query_compatibility(input, Some(output))?;

        let resolved =
            resolve(input).ok_or_else(|| Error::format_rejected("unrecognized pixel format"))?;
        let width = input.width as u32;
        let height = input.abs_height() as u32;

        let fps = (self.fps_num > 0 && self.fps_den > 0).then_some((self.fps_num, self.fps_den));
        let params = EncoderParameters::derive(
            &self.config,
            resolved.color_space,
            self.negotiator.policy.keeps_input(),
            width,
            height,
            self.frame_total,
            fps,
        )?;

        let engine = backend
            .open_encoder(&params)
            .map_err(|e| Error::EngineOpenFailed(e.to_string()))?;
        let converter = backend.open_converter(&params)?;
        let conv = PictureBuf::new(params.color_space, width, height)?;

        debug!(
            width,
            height,
            color_space = %params.color_space,
            preset = params.preset,
            "encoder opened"
        );

        Ok(OpenEncoder {
            engine,
            converter,
            conv,
            frames_remaining: if self.frame_total > 0 {
                self.frame_total as i64
            } else {
                -1
            },
        })
    }

    /// Feed one raw frame and collect any produced bitstream.
    ///
    /// Once the remaining-frame counter hits zero the call turns into a
    /// drain step: the engine is given no new input but may still emit
    /// buffered output. The presentation timestamp advances once per
    /// accepted input frame, whether or not output was produced.
    pub fn process(
        &mut self,
        input: &PixelFormatDescriptor,
        frame: &[u8],
        out: &mut [u8],
    ) -> Result<ProcessOutcome> {
        if self.errored {
            return Err(Error::InvalidState(
                "session errored; a fresh Begin is required".into(),
            ));
        }
        if self.state.is_none() {
            return Err(Error::InvalidState("process before begin".into()));
        }

        let result = self.process_inner(input, frame, out);
        if result.is_err() {
            // Encoder state cannot be rolled back frame-by-frame, so every
            // Process failure poisons the session, undersized buffers
            // included.
            self.errored = true;
        }
        result
    }

    fn process_inner(
        &mut self,
        input: &PixelFormatDescriptor,
        frame: &[u8],
        out: &mut [u8],
    ) -> Result<ProcessOutcome> {
        let Some(state) = self.state.as_mut() else {
            return Err(Error::InvalidState("process before begin".into()));
        };

        if state.frames_remaining == 0 {
            // No more input expected: signal end-of-stream, which may still
            // yield buffered output.
            let units = state.engine.encode(None).map_err(engine_error)?;
            return deliver(&units, out, &mut self.sink);
        }
        if state.frames_remaining > 0 {
            state.frames_remaining -= 1;
        }

        let resolved =
            resolve(input).ok_or_else(|| Error::format_rejected("unrecognized pixel format"))?;
        let layout = FrameBufferLayout::compute(
            resolved.color_space,
            input.width as u32,
            input.abs_height() as u32,
        )?;
        let view = PictureView::new(resolved.color_space, &layout, frame)?;

        state
            .converter
            .convert(&view, &mut state.conv)
            .map_err(|e| Error::ConversionFailed(e.to_string()))?;

        let units = state.engine.encode(Some(&state.conv.view()));
        state.conv.pts += 1;
        let units = units.map_err(engine_error)?;
        deliver(&units, out, &mut self.sink)
    }

    /// Retrieve the stream headers (VPS/SPS/PPS) from the open engine.
    pub fn stream_headers(&mut self) -> Result<Vec<BitstreamUnit>> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::InvalidState("headers before begin".into()))?;
        state.engine.headers()
    }

    /// Close the session.
    ///
    /// Pipelined output is drained first — the engine is asked for output
    /// with no new input until it emits nothing — unless the session errored
    /// or never left Closed. The engine handle and conversion buffer are
    /// always released. Idempotent.
    pub fn end(&mut self) {
        let Some(mut state) = self.state.take() else {
            self.errored = false;
            return;
        };

        if !self.errored {
            // Terminates when the engine signals an empty emission.
            loop {
                match state.engine.encode(None) {
                    Ok(units) if units.is_empty() => break,
                    Ok(units) => {
                        debug!(units = units.len(), "drained delayed frame");
                        forward_to_sink(&units, &mut self.sink);
                    }
                    Err(err) => {
                        warn!(error = %err, "drain failed; closing anyway");
                        break;
                    }
                }
            }
        }

        self.errored = false;
        // Dropping the state releases the engine handle and buffers.
    }
}

impl Drop for EncodeSession {
    fn drop(&mut self) {
        self.end();
    }
}

fn engine_error(err: Error) -> Error {
    match err {
        e @ Error::Engine(_) => e,
        other => Error::Engine(other.to_string()),
    }
}

/// Concatenate emitted units into the caller's buffer and classify the
/// frame.
///
/// A frame is a keyframe as soon as any unit carries a keyframe-bearing
/// type; this upgrade overrides whatever the engine reported for the frame.
/// That is a host-compatibility policy inherited from the protocol this
/// adapter serves, not a property of the bitstream.
fn deliver(
    units: &[BitstreamUnit],
    out: &mut [u8],
    sink: &mut Option<Box<dyn BitstreamSink>>,
) -> Result<ProcessOutcome> {
    if units.is_empty() {
        return Ok(ProcessOutcome {
            bytes_written: 0,
            keyframe: false,
        });
    }

    let total: usize = units.iter().map(|u| u.size()).sum();
    let keyframe = units.iter().any(|u| u.unit_type.is_keyframe());

    if total > out.len() {
        // No partial writes.
        return Err(Error::BufferTooSmall {
            needed: total,
            available: out.len(),
        });
    }

    let mut pos = 0;
    for unit in units {
        out[pos..pos + unit.size()].copy_from_slice(&unit.payload);
        pos += unit.size();
    }

    if let Some(sink) = sink.as_mut() {
        sink.write_frame(&out[..total], keyframe)?;
    }

    Ok(ProcessOutcome {
        bytes_written: total,
        keyframe,
    })
}

/// Forward drained units to the sink, concatenated as one frame.
fn forward_to_sink(units: &[BitstreamUnit], sink: &mut Option<Box<dyn BitstreamSink>>) {
    let Some(sink) = sink.as_mut() else { return };
    let mut payload = Vec::with_capacity(units.iter().map(|u| u.size()).sum());
    for unit in units {
        payload.extend_from_slice(&unit.payload);
    }
    let keyframe = units.iter().any(|u| u.unit_type.is_keyframe());
    if let Err(err) = sink.write_frame(&payload, keyframe) {
        warn!(error = %err, "sink rejected drained frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::UnitType;
    use crate::negotiate::CspPolicy;
    use hevcbridge_core::fourcc::{bitstream, pixel};

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Engine that buffers `latency` frames before emitting one unit per
    // submitted picture.
    struct PipelinedEngine {
        latency: usize,
        queued: VecDeque<i64>,
        emitted: usize,
    }

    impl PipelinedEngine {
        fn new(latency: usize) -> Self {
            Self {
                latency,
                queued: VecDeque::new(),
                emitted: 0,
            }
        }

        fn emit(&mut self) -> Vec<BitstreamUnit> {
            self.queued.pop_front();
            let unit_type = if self.emitted == 0 {
                UnitType::IdrWRadl
            } else {
                UnitType::Other(1)
            };
            self.emitted += 1;
            vec![BitstreamUnit::new(unit_type, vec![0xab; 16])]
        }
    }

    impl EncoderEngine for PipelinedEngine {
        fn encode(&mut self, picture: Option<&PictureView<'_>>) -> Result<Vec<BitstreamUnit>> {
            match picture {
                Some(pic) => {
                    self.queued.push_back(pic.pts);
                    if self.queued.len() > self.latency {
                        Ok(self.emit())
                    } else {
                        Ok(Vec::new())
                    }
                }
                None => {
                    if self.queued.is_empty() {
                        Ok(Vec::new())
                    } else {
                        Ok(self.emit())
                    }
                }
            }
        }

        fn headers(&mut self) -> Result<Vec<BitstreamUnit>> {
            Ok(vec![
                BitstreamUnit::new(UnitType::Vps, vec![0x40, 0x01]),
                BitstreamUnit::new(UnitType::Sps, vec![0x42, 0x01]),
                BitstreamUnit::new(UnitType::Pps, vec![0x44, 0x01]),
            ])
        }
    }

    struct NullConverter;

    impl PixelConverter for NullConverter {
        fn convert(&mut self, _src: &PictureView<'_>, _dst: &mut PictureBuf) -> Result<()> {
            Ok(())
        }
    }

    struct TestBackend {
        latency: usize,
        fail_open: bool,
    }

    impl EncoderBackend for TestBackend {
        fn open_encoder(&self, _params: &EncoderParameters) -> Result<Box<dyn EncoderEngine>> {
            if self.fail_open {
                return Err(Error::EngineOpenFailed("refused".into()));
            }
            Ok(Box::new(PipelinedEngine::new(self.latency)))
        }

        fn open_converter(&self, _params: &EncoderParameters) -> Result<Box<dyn PixelConverter>> {
            Ok(Box::new(NullConverter))
        }
    }

    #[derive(Clone, Default)]
    struct CountingSink {
        frames: Arc<AtomicUsize>,
    }

    impl BitstreamSink for CountingSink {
        fn write_frame(&mut self, _payload: &[u8], _keyframe: bool) -> Result<()> {
            self.frames.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn session() -> EncodeSession {
        EncodeSession::new(
            FormatNegotiator::new(CspPolicy::ConvertToI420, bitstream::HEVC),
            EncoderConfig::default(),
        )
    }

    fn descriptors() -> (PixelFormatDescriptor, PixelFormatDescriptor) {
        let input = PixelFormatDescriptor::with_four_cc(pixel::I420, 64, 48);
        let output = PixelFormatDescriptor::with_four_cc(bitstream::HEVC, 64, 48);
        (input, output)
    }

    fn frame_bytes() -> Vec<u8> {
        vec![0u8; 64 * 48 * 3 / 2]
    }

    #[test]
    fn test_process_before_begin_fails() {
        let mut sess = session();
        let (input, _) = descriptors();
        let mut out = vec![0u8; 1024];
        assert!(matches!(
            sess.process(&input, &frame_bytes(), &mut out),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_begin_rejects_incompatible_format() {
        let mut sess = session();
        let input = PixelFormatDescriptor::with_four_cc(pixel::I420, 63, 48);
        let output = PixelFormatDescriptor::with_four_cc(bitstream::HEVC, 63, 48);
        let backend = TestBackend { latency: 0, fail_open: false };
        assert!(sess.begin(&input, &output, &backend).is_err());
        assert!(!sess.is_open());
    }

    #[test]
    fn test_begin_engine_open_failure_leaves_closed() {
        let mut sess = session();
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 0, fail_open: true };
        assert!(matches!(
            sess.begin(&input, &output, &backend),
            Err(Error::EngineOpenFailed(_))
        ));
        assert!(!sess.is_open());

        // A fresh Begin against a working backend recovers.
        let backend = TestBackend { latency: 0, fail_open: false };
        assert!(sess.begin(&input, &output, &backend).is_ok());
        assert!(sess.is_open());
    }

    #[test]
    fn test_zero_latency_emits_per_frame() {
        let mut sess = session();
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 0, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let mut out = vec![0u8; 1024];
        let first = sess.process(&input, &frame_bytes(), &mut out).unwrap();
        assert_eq!(first.bytes_written, 16);
        assert!(first.keyframe);

        let second = sess.process(&input, &frame_bytes(), &mut out).unwrap();
        assert_eq!(second.bytes_written, 16);
        assert!(!second.keyframe);
    }

    #[test]
    fn test_pipeline_latency_defers_output() {
        let mut sess = session();
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 2, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let mut out = vec![0u8; 1024];
        for _ in 0..2 {
            let outcome = sess.process(&input, &frame_bytes(), &mut out).unwrap();
            assert_eq!(outcome.bytes_written, 0);
            assert!(!outcome.keyframe);
        }
        let outcome = sess.process(&input, &frame_bytes(), &mut out).unwrap();
        assert_eq!(outcome.bytes_written, 16);
    }

    #[test]
    fn test_end_drains_all_delayed_frames() {
        let counting = CountingSink::default();
        let frames = counting.frames.clone();

        let mut sess = session();
        sess.set_sink(Box::new(counting));
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 3, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let mut out = vec![0u8; 1024];
        for _ in 0..5 {
            sess.process(&input, &frame_bytes(), &mut out).unwrap();
        }
        sess.end();

        // All 5 submitted frames surfaced: 2 at Process time, 3 at End.
        assert_eq!(frames.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_end_is_idempotent_and_safe_before_begin() {
        let mut sess = session();
        sess.end();
        sess.end();

        let (input, output) = descriptors();
        let backend = TestBackend { latency: 1, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();
        sess.end();
        sess.end();
        assert!(!sess.is_open());
    }

    #[test]
    fn test_frame_counter_reaches_zero() {
        let mut sess = session();
        sess.frames_info(2, 30, 1);
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 0, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let mut out = vec![0u8; 1024];
        sess.process(&input, &frame_bytes(), &mut out).unwrap();
        sess.process(&input, &frame_bytes(), &mut out).unwrap();
        // Counter exhausted: further calls drain instead of encoding.
        let outcome = sess.process(&input, &frame_bytes(), &mut out).unwrap();
        assert_eq!(outcome.bytes_written, 0);
    }

    #[test]
    fn test_buffer_too_small_is_fatal() {
        let mut sess = session();
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 0, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let mut out = vec![0u8; 4];
        assert!(matches!(
            sess.process(&input, &frame_bytes(), &mut out),
            Err(Error::BufferTooSmall { needed: 16, .. })
        ));
        // Session is poisoned until a fresh Begin.
        let mut out = vec![0u8; 1024];
        assert!(matches!(
            sess.process(&input, &frame_bytes(), &mut out),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_stream_headers_passthrough() {
        let mut sess = session();
        let (input, output) = descriptors();
        let backend = TestBackend { latency: 0, fail_open: false };
        sess.begin(&input, &output, &backend).unwrap();

        let headers = sess.stream_headers().unwrap();
        assert_eq!(headers.len(), 3);
        assert!(headers.iter().all(|u| u.unit_type.is_parameter_set()));
    }
}
