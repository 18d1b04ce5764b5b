//! Fixed output lookup tables: named resolutions, quality tiers and output
//! formats. These are data, not logic; downstream encoders depend on the
//! exact values for output compatibility.

/// Named output resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum Resolution {
    #[value(name = "480p")]
    R480p,
    #[value(name = "720p")]
    R720p,
    #[value(name = "1080p")]
    R1080p,
    #[value(name = "1440p")]
    R1440p,
    #[value(name = "4k")]
    R4k,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::R480p => (854, 480),
            Self::R720p => (1280, 720),
            Self::R1080p => (1920, 1080),
            Self::R1440p => (2560, 1440),
            Self::R4k => (3840, 2160),
        }
    }

    pub fn all() -> &'static [Resolution] {
        &[
            Self::R480p,
            Self::R720p,
            Self::R1080p,
            Self::R1440p,
            Self::R4k,
        ]
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::R480p => write!(f, "480p"),
            Self::R720p => write!(f, "720p"),
            Self::R1080p => write!(f, "1080p"),
            Self::R1440p => write!(f, "1440p"),
            Self::R4k => write!(f, "4k"),
        }
    }
}

/// Encoder inputs derived from a [`QualityTier`]. Serialized for job
/// manifests, never parsed back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct EncodeParams {
    pub bitrate_kbps: u32,
    pub crf: u8,
    /// Encoder effort/preset name as understood by the external encoder.
    pub effort: &'static str,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum QualityTier {
    Draft,
    #[default]
    Standard,
    High,
    Ultra,
}

impl QualityTier {
    pub fn encode_params(self) -> EncodeParams {
        match self {
            Self::Draft => EncodeParams {
                bitrate_kbps: 1_000,
                crf: 32,
                effort: "ultrafast",
            },
            Self::Standard => EncodeParams {
                bitrate_kbps: 4_000,
                crf: 26,
                effort: "medium",
            },
            Self::High => EncodeParams {
                bitrate_kbps: 8_000,
                crf: 20,
                effort: "slow",
            },
            Self::Ultra => EncodeParams {
                bitrate_kbps: 16_000,
                crf: 16,
                effort: "veryslow",
            },
        }
    }

    pub fn all() -> &'static [QualityTier] {
        &[Self::Draft, Self::Standard, Self::High, Self::Ultra]
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Standard => write!(f, "standard"),
            Self::High => write!(f, "high"),
            Self::Ultra => write!(f, "ultra"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Mp4,
    Webm,
    Gif,
    Lottie,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Gif => "gif",
            Self::Lottie => "json",
        }
    }

    /// GIF needs palette optimization, Lottie a vector-animation export;
    /// both run as a dedicated post-processing stage.
    pub fn needs_post_process(self) -> bool {
        matches!(self, Self::Gif | Self::Lottie)
    }

    pub fn all() -> &'static [OutputFormat] {
        &[Self::Mp4, Self::Webm, Self::Gif, Self::Lottie]
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mp4 => write!(f, "mp4"),
            Self::Webm => write!(f, "webm"),
            Self::Gif => write!(f, "gif"),
            Self::Lottie => write!(f, "lottie"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_table_is_stable() {
        assert_eq!(Resolution::R480p.dimensions(), (854, 480));
        assert_eq!(Resolution::R720p.dimensions(), (1280, 720));
        assert_eq!(Resolution::R1080p.dimensions(), (1920, 1080));
        assert_eq!(Resolution::R1440p.dimensions(), (2560, 1440));
        assert_eq!(Resolution::R4k.dimensions(), (3840, 2160));
    }

    #[test]
    fn quality_tiers_order_bitrate_monotonically() {
        let rates: Vec<u32> = QualityTier::all()
            .iter()
            .map(|q| q.encode_params().bitrate_kbps)
            .collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn post_processing_formats() {
        assert!(!OutputFormat::Mp4.needs_post_process());
        assert!(!OutputFormat::Webm.needs_post_process());
        assert!(OutputFormat::Gif.needs_post_process());
        assert!(OutputFormat::Lottie.needs_post_process());
    }
}
