//! Encoder configuration and parameter derivation.
//!
//! [`EncoderConfig`] is what a host stores between sessions;
//! [`EncoderParameters`] is what Begin derives from it and hands to the
//! external encoder engine.

use serde::{Deserialize, Serialize};

use hevcbridge_core::{ColorSpace, Error, Result};

/// Encoding speed/quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
    Placebo,
}

impl Preset {
    /// Engine-facing preset name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
            Self::Placebo => "placebo",
        }
    }
}

/// Content tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tune {
    Psnr,
    Ssim,
    Grain,
    Animation,
}

impl Tune {
    /// Engine-facing tune name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Psnr => "psnr",
            Self::Ssim => "ssim",
            Self::Grain => "grain",
            Self::Animation => "animation",
        }
    }
}

/// Profile restriction applied after all other options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Main,
    Main10,
    MainStillPicture,
}

impl Profile {
    /// Engine-facing profile name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Main10 => "main10",
            Self::MainStillPicture => "mainstillpicture",
        }
    }
}

/// Rate control mode and its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateControl {
    /// Mathematically lossless coding.
    Lossless,
    /// Constant quantizer.
    ConstantQp { qp: u8 },
    /// Constant rate factor.
    ConstantQuality { crf: f32 },
    /// Average bitrate in kbit/s.
    AverageBitrate { kbps: u32 },
}

impl Default for RateControl {
    fn default() -> Self {
        Self::ConstantQuality { crf: 28.0 }
    }
}

/// Matrix coefficients signaled in the stream's VUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixCoefficients {
    /// Identity (GBR) — RGB content carried without a YCbCr transform.
    Identity,
    Bt709,
    Unspecified,
    Fcc,
    Bt470bg,
    Smpte170m,
    Smpte240m,
}

impl MatrixCoefficients {
    /// Value as signaled in the bitstream.
    pub fn to_index(&self) -> u8 {
        match self {
            Self::Identity => 0,
            Self::Bt709 => 1,
            Self::Unspecified => 2,
            Self::Fcc => 4,
            Self::Bt470bg => 5,
            Self::Smpte170m => 6,
            Self::Smpte240m => 7,
        }
    }
}

/// Host-persistable encoder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Speed/quality preset.
    pub preset: Preset,
    /// Content tuning, if any.
    pub tune: Option<Tune>,
    /// Append the fast-decode tune.
    pub fast_decode: bool,
    /// Append the zero-latency tune (disables frame delay).
    pub zero_latency: bool,
    /// Profile restriction, if any.
    pub profile: Option<Profile>,
    /// Level IDC (e.g. 123 for 4.1), engine default when unset.
    pub level_idc: Option<u8>,
    /// Rate control mode.
    pub rate_control: RateControl,
    /// Sample aspect ratio, unset means square.
    pub sar: Option<(u32, u32)>,
    /// Full-range samples; per-family default when unset.
    pub full_range: Option<bool>,
    /// Matrix coefficients; per-family default when unset.
    pub matrix: Option<MatrixCoefficients>,
}

impl EncoderConfig {
    /// Compose the tune string the engine expects: the base tune plus the
    /// fast-decode and zero-latency switches, comma separated.
    pub fn tune_string(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(tune) = self.tune {
            parts.push(tune.name());
        }
        if self.fast_decode {
            parts.push("fast-decode");
        }
        if self.zero_latency {
            parts.push("zero-latency");
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }
}

/// Choose the internal color space the encoder runs in.
///
/// With conversion enabled everything lands in planar 4:2:0; otherwise the
/// nearest engine-native arrangement of the input family is kept.
pub fn choose_internal_color_space(input: ColorSpace, keep_input: bool) -> ColorSpace {
    match input {
        ColorSpace::I420 | ColorSpace::Yv12 => ColorSpace::I420,
        ColorSpace::Nv12 => ColorSpace::Nv12,
        ColorSpace::I422 | ColorSpace::Yv16 | ColorSpace::Yuyv | ColorSpace::Uyvy => {
            if keep_input {
                ColorSpace::I422
            } else {
                ColorSpace::I420
            }
        }
        ColorSpace::I444 | ColorSpace::Yv24 => {
            if keep_input {
                ColorSpace::I444
            } else {
                ColorSpace::I420
            }
        }
        ColorSpace::Bgr24 => {
            if keep_input {
                ColorSpace::Bgr24
            } else {
                ColorSpace::I420
            }
        }
        ColorSpace::Bgra32 => {
            if keep_input {
                ColorSpace::Bgra32
            } else {
                ColorSpace::I420
            }
        }
    }
}

/// Parameters derived from configuration and negotiated format, as handed to
/// the external encoder engine.
#[derive(Debug, Clone)]
pub struct EncoderParameters {
    pub width: u32,
    pub height: u32,
    /// Internal color space the engine codes in.
    pub color_space: ColorSpace,
    pub preset: &'static str,
    pub tune: Option<String>,
    pub profile: Option<&'static str>,
    pub level_idc: Option<u8>,
    pub rate_control: RateControl,
    /// Frame rate as (numerator, denominator), when the host hinted one.
    pub fps: Option<(u32, u32)>,
    /// Total frame count, zero when unknown.
    pub total_frames: u32,
    pub sar: Option<(u32, u32)>,
    pub full_range: bool,
    pub matrix: MatrixCoefficients,
    /// Emit start-code delimited units.
    pub annex_b: bool,
    /// Repeat parameter sets before each keyframe; the host protocol has no
    /// other channel for them.
    pub repeat_headers: bool,
}

impl EncoderParameters {
    /// Derive engine parameters for a session.
    ///
    /// `input_color_space` is the already-resolved input arrangement; width
    /// and height are the negotiated frame dimensions; `keep_input` comes
    /// from the negotiator's keep/convert policy. Matrix coefficients
    /// default to identity for RGB-family internal spaces and unspecified
    /// otherwise; the range flag defaults to full for RGB and limited
    /// otherwise.
    pub fn derive(
        config: &EncoderConfig,
        input_color_space: ColorSpace,
        keep_input: bool,
        width: u32,
        height: u32,
        total_frames: u32,
        fps: Option<(u32, u32)>,
    ) -> Result<Self> {
        if let Some((num, den)) = config.sar {
            if num == 0 || den == 0 {
                return Err(Error::invalid_param("sar", format!("{}:{}", num, den)));
            }
        }
        if let Some((num, den)) = fps {
            if num == 0 || den == 0 {
                return Err(Error::invalid_param("fps", format!("{}/{}", num, den)));
            }
        }
        if let RateControl::ConstantQuality { crf } = config.rate_control {
            if !(0.0..=51.0).contains(&crf) {
                return Err(Error::invalid_param("crf", crf.to_string()));
            }
        }
        if let RateControl::ConstantQp { qp } = config.rate_control {
            if qp > 51 {
                return Err(Error::invalid_param("qp", qp.to_string()));
            }
        }

        let color_space = choose_internal_color_space(input_color_space, keep_input);

        let full_range = config.full_range.unwrap_or(color_space.is_rgb());
        let matrix = config.matrix.unwrap_or(if color_space.is_rgb() {
            MatrixCoefficients::Identity
        } else {
            MatrixCoefficients::Unspecified
        });

        Ok(Self {
            width,
            height,
            color_space,
            preset: config.preset.name(),
            tune: config.tune_string(),
            profile: config.profile.map(|p| p.name()),
            level_idc: config.level_idc,
            rate_control: config.rate_control,
            fps,
            total_frames,
            sar: config.sar,
            full_range,
            matrix,
            annex_b: true,
            repeat_headers: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tune_string_composition() {
        let mut config = EncoderConfig::default();
        assert_eq!(config.tune_string(), None);

        config.tune = Some(Tune::Grain);
        assert_eq!(config.tune_string().as_deref(), Some("grain"));

        config.fast_decode = true;
        config.zero_latency = true;
        assert_eq!(
            config.tune_string().as_deref(),
            Some("grain,fast-decode,zero-latency")
        );

        config.tune = None;
        assert_eq!(
            config.tune_string().as_deref(),
            Some("fast-decode,zero-latency")
        );
    }

    #[test]
    fn test_internal_color_space_convert_policy() {
        for cs in [
            ColorSpace::I420,
            ColorSpace::Yv12,
            ColorSpace::Yv16,
            ColorSpace::Yv24,
            ColorSpace::Yuyv,
            ColorSpace::Uyvy,
            ColorSpace::Bgr24,
            ColorSpace::Bgra32,
        ] {
            assert_eq!(choose_internal_color_space(cs, false), ColorSpace::I420);
        }
        // The semi-planar arrangement is engine-native either way.
        assert_eq!(choose_internal_color_space(ColorSpace::Nv12, false), ColorSpace::Nv12);
    }

    #[test]
    fn test_internal_color_space_keep_policy() {
        assert_eq!(choose_internal_color_space(ColorSpace::Yv16, true), ColorSpace::I422);
        assert_eq!(choose_internal_color_space(ColorSpace::Yuyv, true), ColorSpace::I422);
        assert_eq!(choose_internal_color_space(ColorSpace::Yv24, true), ColorSpace::I444);
        assert_eq!(choose_internal_color_space(ColorSpace::Bgr24, true), ColorSpace::Bgr24);
        assert_eq!(choose_internal_color_space(ColorSpace::Yv12, true), ColorSpace::I420);
    }

    #[test]
    fn test_derive_defaults_yuv() {
        let params = EncoderParameters::derive(
            &EncoderConfig::default(),
            ColorSpace::I420,
            false,
            1280,
            720,
            0,
            None,
        )
        .unwrap();
        assert_eq!(params.color_space, ColorSpace::I420);
        assert!(!params.full_range);
        assert_eq!(params.matrix, MatrixCoefficients::Unspecified);
        assert!(params.annex_b);
        assert!(params.repeat_headers);
    }

    #[test]
    fn test_derive_defaults_rgb() {
        let config = EncoderConfig::default();
        let params = EncoderParameters::derive(&config, ColorSpace::Bgra32, true, 640, 480, 0, None)
            .unwrap();
        assert_eq!(params.color_space, ColorSpace::Bgra32);
        assert!(params.full_range);
        assert_eq!(params.matrix, MatrixCoefficients::Identity);
    }

    #[test]
    fn test_derive_explicit_overrides_win() {
        let config = EncoderConfig {
            full_range: Some(false),
            matrix: Some(MatrixCoefficients::Bt709),
            ..EncoderConfig::default()
        };
        let params = EncoderParameters::derive(&config, ColorSpace::Bgr24, true, 640, 480, 0, None)
            .unwrap();
        assert!(!params.full_range);
        assert_eq!(params.matrix, MatrixCoefficients::Bt709);
    }

    #[test]
    fn test_derive_rejects_bad_options() {
        let config = EncoderConfig {
            sar: Some((0, 1)),
            ..EncoderConfig::default()
        };
        let err = EncoderParameters::derive(&config, ColorSpace::I420, false, 16, 16, 0, None)
            .unwrap_err();
        assert!(matches!(err, Error::ParameterInvalid { .. }));

        let config = EncoderConfig {
            rate_control: RateControl::ConstantQp { qp: 90 },
            ..EncoderConfig::default()
        };
        assert!(
            EncoderParameters::derive(&config, ColorSpace::I420, false, 16, 16, 0, None).is_err()
        );

        let config = EncoderConfig::default();
        assert!(
            EncoderParameters::derive(&config, ColorSpace::I420, false, 16, 16, 0, Some((0, 1)))
                .is_err()
        );
    }
}
