//! Format negotiation.
//!
//! Hosts probe a codec in three phases before starting a session: describe
//! the output format, query input/output compatibility, and ask for the
//! output buffer size. [`FormatNegotiator`] answers all three for both the
//! encode and the decode direction, composing the pixel format catalog and
//! the layout calculator.

use serde::{Deserialize, Serialize};

use hevcbridge_core::fourcc::bitstream;
use hevcbridge_core::{
    is_bitstream_code, resolve, ColorSpace, Error, FormatTag, FourCc, FrameBufferLayout,
    PixelFormatDescriptor, ResolvedFormat, Result,
};

/// Keep/convert policy for the encode-side input color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CspPolicy {
    /// Accept any recognized input and convert it to planar 4:2:0.
    #[default]
    ConvertToI420,
    /// Accept only 4:2:0-family input, kept as-is.
    KeepI420,
    /// Accept only 4:2:2-family input, kept as-is.
    KeepI422,
    /// Accept only 4:4:4-family input, kept as-is.
    KeepI444,
    /// Accept only RGB input, kept as-is.
    KeepRgb,
    /// Accept any recognized input, kept as-is.
    KeepAll,
}

impl CspPolicy {
    /// Check whether the policy admits a resolved input color space.
    pub fn allows(&self, color_space: ColorSpace) -> bool {
        match self {
            Self::ConvertToI420 | Self::KeepAll => true,
            Self::KeepI420 => matches!(
                color_space,
                ColorSpace::I420 | ColorSpace::Yv12 | ColorSpace::Nv12
            ),
            Self::KeepI422 => matches!(
                color_space,
                ColorSpace::I422 | ColorSpace::Yv16 | ColorSpace::Yuyv | ColorSpace::Uyvy
            ),
            Self::KeepI444 => matches!(color_space, ColorSpace::I444 | ColorSpace::Yv24),
            Self::KeepRgb => color_space.is_rgb(),
        }
    }

    /// Whether this policy keeps the input color space rather than
    /// converting to 4:2:0.
    pub fn keeps_input(&self) -> bool {
        !matches!(self, Self::ConvertToI420)
    }
}

/// Validated frame geometry: positive, even dimensions.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: u32,
    height: u32,
}

fn check_geometry(desc: &PixelFormatDescriptor) -> Result<Geometry> {
    let width = desc.width;
    let height = desc.abs_height();
    if width <= 0 || height <= 0 {
        return Err(Error::format_rejected(format!(
            "non-positive dimensions {}x{}",
            width, height
        )));
    }
    // 2x-aligned geometry is required in both dimensions.
    if width % 2 != 0 || height % 2 != 0 {
        return Err(Error::format_rejected(format!(
            "odd dimensions {}x{}",
            width, height
        )));
    }
    Ok(Geometry {
        width: width as u32,
        height: height as u32,
    })
}

fn resolve_or_reject(desc: &PixelFormatDescriptor) -> Result<ResolvedFormat> {
    resolve(desc).ok_or_else(|| Error::format_rejected("unrecognized pixel format"))
}

/// Round up to a multiple of `align` (a power of two).
fn round_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// The capability-negotiation surface for one codec configuration.
#[derive(Debug, Clone)]
pub struct FormatNegotiator {
    /// Encode-side keep/convert policy.
    pub policy: CspPolicy,
    /// Four-character code advertised for compressed output.
    pub bitstream_code: FourCc,
}

impl Default for FormatNegotiator {
    fn default() -> Self {
        Self {
            policy: CspPolicy::default(),
            bitstream_code: bitstream::HEVC,
        }
    }
}

impl FormatNegotiator {
    /// Create a negotiator with an explicit policy.
    pub fn new(policy: CspPolicy, bitstream_code: FourCc) -> Self {
        Self {
            policy,
            bitstream_code,
        }
    }

    /// Conservative upper bound on one compressed frame, safe for worst-case
    /// incompressible content. Exact compressed sizes are unknowable before
    /// encoding.
    pub fn max_compressed_size(width: u32, height: u32) -> usize {
        (round_up(width, 16) as usize) * (round_up(height, 32) as usize) * 3 * 10 + 4096
    }

    /// Describe the compressed output format for an input format.
    ///
    /// The input must be a recognized pixel format with positive, even
    /// dimensions. The advertised size is [`Self::max_compressed_size`], not
    /// an exact figure.
    pub fn describe_output(&self, input: &PixelFormatDescriptor) -> Result<PixelFormatDescriptor> {
        resolve_or_reject(input)?;
        let geo = check_geometry(input)?;

        let mut out = PixelFormatDescriptor::with_four_cc(
            self.bitstream_code,
            geo.width as i32,
            geo.height as i32,
        );
        out.image_size = Self::max_compressed_size(geo.width, geo.height) as u32;
        Ok(out)
    }

    /// Test whether an input format (and optionally a specific output
    /// format) can start an encode session.
    ///
    /// With no output descriptor this reports input capability only.
    pub fn query_compatibility(
        &self,
        input: &PixelFormatDescriptor,
        output: Option<&PixelFormatDescriptor>,
    ) -> Result<()> {
        let resolved = resolve_or_reject(input)?;
        if !self.policy.allows(resolved.color_space) {
            return Err(Error::format_rejected(format!(
                "{} not admitted by colorspace policy",
                resolved.color_space
            )));
        }
        let geo = check_geometry(input)?;

        let Some(output) = output else {
            return Ok(());
        };

        if output.width != geo.width as i32 || output.height != geo.height as i32 {
            return Err(Error::format_rejected(format!(
                "output dimensions {}x{} do not match input {}x{}",
                output.width, output.height, geo.width, geo.height
            )));
        }
        match output.tag {
            FormatTag::FourCc(code) if is_bitstream_code(code) => Ok(()),
            _ => Err(Error::format_rejected("unrecognized output bitstream code")),
        }
    }

    /// Size in bytes of an uncompressed frame buffer for the descriptor,
    /// used for decode-direction sizing.
    pub fn get_output_size(&self, desc: &PixelFormatDescriptor) -> Result<usize> {
        let resolved = resolve_or_reject(desc)?;
        let geo = check_geometry(desc)?;
        let layout = FrameBufferLayout::compute(resolved.color_space, geo.width, geo.height)?;
        Ok(layout.total_size())
    }

    /// Describe the default decoded output format for a compressed input:
    /// packed 32-bit RGB at the coded dimensions.
    pub fn describe_decode_output(
        &self,
        input: &PixelFormatDescriptor,
    ) -> Result<PixelFormatDescriptor> {
        self.check_bitstream_input(input)?;
        let geo = check_geometry(input)?;

        let layout = FrameBufferLayout::compute(ColorSpace::Bgra32, geo.width, geo.height)?;
        let mut out =
            PixelFormatDescriptor::with_rgb(32, geo.width as i32, geo.height as i32);
        out.image_size = layout.total_size() as u32;
        Ok(out)
    }

    /// Test whether a compressed input (and optionally a specific
    /// uncompressed output) can start a decode session.
    pub fn query_decode(
        &self,
        input: &PixelFormatDescriptor,
        output: Option<&PixelFormatDescriptor>,
    ) -> Result<()> {
        self.check_bitstream_input(input)?;
        let geo = check_geometry(input)?;

        let Some(output) = output else {
            return Ok(());
        };

        if output.width != geo.width as i32 || output.abs_height() != geo.height as i32 {
            return Err(Error::format_rejected(format!(
                "output dimensions {}x{} do not match input {}x{}",
                output.width,
                output.abs_height(),
                geo.width,
                geo.height
            )));
        }
        let resolved = resolve_or_reject(output)?;
        let layout = FrameBufferLayout::compute(resolved.color_space, geo.width, geo.height)?;
        // A zero declared size means unspecified; anything else must hold a
        // full frame.
        if output.image_size != 0 && (output.image_size as usize) < layout.total_size() {
            return Err(Error::format_rejected(format!(
                "declared output size {} below frame size {}",
                output.image_size,
                layout.total_size()
            )));
        }
        Ok(())
    }

    fn check_bitstream_input(&self, input: &PixelFormatDescriptor) -> Result<()> {
        match input.tag {
            FormatTag::FourCc(code) if is_bitstream_code(code) => Ok(()),
            _ => Err(Error::format_rejected("unrecognized bitstream code")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hevcbridge_core::fourcc::pixel;

    fn i420(width: i32, height: i32) -> PixelFormatDescriptor {
        PixelFormatDescriptor::with_four_cc(pixel::I420, width, height)
    }

    #[test]
    fn test_describe_output_advertises_bound() {
        let neg = FormatNegotiator::default();
        let out = neg.describe_output(&i420(1920, 1080)).unwrap();
        assert_eq!(out.tag, FormatTag::FourCc(bitstream::HEVC));
        assert_eq!(out.width, 1920);
        assert_eq!(out.height, 1080);
        // Width already 16-aligned; height rounds 1080 -> 1088.
        assert_eq!(out.image_size, 1920 * 1088 * 30 + 4096);
    }

    #[test]
    fn test_describe_output_rejects_odd_and_nonpositive() {
        let neg = FormatNegotiator::default();
        assert!(neg.describe_output(&i420(1919, 1080)).is_err());
        assert!(neg.describe_output(&i420(1920, 1079)).is_err());
        assert!(neg.describe_output(&i420(0, 1080)).is_err());
        assert!(neg.describe_output(&i420(-640, 480)).is_err());
    }

    #[test]
    fn test_describe_output_rejects_unknown_format() {
        let neg = FormatNegotiator::default();
        let desc = PixelFormatDescriptor::with_four_cc(FourCc::new(b"ZZZZ"), 640, 480);
        assert!(matches!(
            neg.describe_output(&desc),
            Err(Error::FormatRejected(_))
        ));
    }

    #[test]
    fn test_query_policy_filtering() {
        let yv16 = PixelFormatDescriptor::with_four_cc(pixel::YV16, 640, 480);

        let neg = FormatNegotiator::new(CspPolicy::KeepI422, bitstream::HEVC);
        assert!(neg.query_compatibility(&yv16, None).is_ok());

        let neg = FormatNegotiator::new(CspPolicy::KeepI420, bitstream::HEVC);
        assert!(neg.query_compatibility(&yv16, None).is_err());
        assert!(neg.query_compatibility(&i420(640, 480), None).is_ok());

        let neg = FormatNegotiator::new(CspPolicy::KeepRgb, bitstream::HEVC);
        let rgb = PixelFormatDescriptor::with_rgb(24, 640, 480);
        assert!(neg.query_compatibility(&rgb, None).is_ok());
        assert!(neg.query_compatibility(&i420(640, 480), None).is_err());
    }

    #[test]
    fn test_query_with_output_descriptor() {
        let neg = FormatNegotiator::default();
        let input = i420(640, 480);

        let good = PixelFormatDescriptor::with_four_cc(bitstream::X265_LOWER, 640, 480);
        assert!(neg.query_compatibility(&input, Some(&good)).is_ok());

        let wrong_dims = PixelFormatDescriptor::with_four_cc(bitstream::HEVC, 640, 360);
        assert!(neg.query_compatibility(&input, Some(&wrong_dims)).is_err());

        let wrong_code = PixelFormatDescriptor::with_four_cc(pixel::I420, 640, 480);
        assert!(neg.query_compatibility(&input, Some(&wrong_code)).is_err());
    }

    #[test]
    fn test_rgb_odd_width_rejected_under_any_policy() {
        let rgb = PixelFormatDescriptor::with_rgb(24, 17, 10);
        for policy in [
            CspPolicy::ConvertToI420,
            CspPolicy::KeepRgb,
            CspPolicy::KeepAll,
        ] {
            let neg = FormatNegotiator::new(policy, bitstream::HEVC);
            assert!(neg.query_compatibility(&rgb, None).is_err(), "{:?}", policy);
        }
    }

    #[test]
    fn test_get_output_size() {
        let neg = FormatNegotiator::default();
        assert_eq!(neg.get_output_size(&i420(640, 480)).unwrap(), 640 * 480 * 3 / 2);

        let rgb = PixelFormatDescriptor::with_rgb(32, 640, 480);
        assert_eq!(neg.get_output_size(&rgb).unwrap(), 640 * 480 * 4);
    }

    #[test]
    fn test_describe_decode_output() {
        let neg = FormatNegotiator::default();
        let input = PixelFormatDescriptor::with_four_cc(bitstream::HEVC, 640, 480);
        let out = neg.describe_decode_output(&input).unwrap();
        assert_eq!(out.tag, FormatTag::Rgb { bit_count: 32 });
        assert_eq!(out.image_size, 640 * 480 * 4);

        let bogus = i420(640, 480);
        assert!(neg.describe_decode_output(&bogus).is_err());
    }

    #[test]
    fn test_query_decode_declared_size() {
        let neg = FormatNegotiator::default();
        let input = PixelFormatDescriptor::with_four_cc(bitstream::HEVC, 640, 480);

        let mut out = PixelFormatDescriptor::with_four_cc(pixel::I420, 640, 480);
        assert!(neg.query_decode(&input, Some(&out)).is_ok());

        out.image_size = 100;
        assert!(neg.query_decode(&input, Some(&out)).is_err());

        out.image_size = (640 * 480 * 3 / 2) as u32;
        assert!(neg.query_decode(&input, Some(&out)).is_ok());
    }

    #[test]
    fn test_query_decode_bottom_up_output() {
        let neg = FormatNegotiator::default();
        let input = PixelFormatDescriptor::with_four_cc(bitstream::H265_UPPER, 640, 480);
        // Bottom-up RGB output declares a positive height.
        let out = PixelFormatDescriptor::with_rgb(32, 640, 480);
        assert!(neg.query_decode(&input, Some(&out)).is_ok());
        // Top-down declares negative; |height| must still match.
        let out = PixelFormatDescriptor::with_rgb(32, 640, -480);
        assert!(neg.query_decode(&input, Some(&out)).is_ok());
    }
}
