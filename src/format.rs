// format.rs - Output formats and the static description table shown next to the selector

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    Avif,
    #[default]
    WebP,
    Jpeg,
    Png,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Accent,
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub text: &'static str,
    pub tone: Tone,
    pub icon: &'static str,
    /// Whether the quality slider changes anything for this format.
    pub quality_applies: bool,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Avif, Self::WebP, Self::Jpeg, Self::Png];

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.mime_type() == mime)
    }

    /// Extension used for output names: the subtype of the MIME tag.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Png)
    }

    pub fn supports_transparency(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    pub fn info(&self) -> FormatInfo {
        match self {
            Self::Avif => FormatInfo {
                text: "AVIF (New): the best compression available today. Smaller than WebP at great quality, but slow to encode.",
                tone: Tone::Accent,
                icon: "💎",
                quality_applies: true,
            },
            Self::WebP => FormatInfo {
                text: "WebP: the modern standard. Keeps transparency and saves a lot of weight.",
                tone: Tone::Success,
                icon: "✨",
                quality_applies: true,
            },
            Self::Jpeg => FormatInfo {
                text: "JPEG: the classic for photos. Transparent backgrounds will turn WHITE.",
                tone: Tone::Info,
                icon: "📸",
                quality_applies: true,
            },
            Self::Png => FormatInfo {
                text: "PNG: a lossless format. The quality selector will NOT affect the size.",
                tone: Tone::Warning,
                icon: "⚠️",
                quality_applies: false,
            },
        }
    }

    pub fn quality_label(&self, quality: f32) -> String {
        if self.info().quality_applies {
            format!("{}%", (quality * 100.0).round() as i32)
        } else {
            String::from("Maximum")
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avif => write!(f, "AVIF"),
            Self::WebP => write!(f, "WebP"),
            Self::Jpeg => write!(f, "JPEG"),
            Self::Png => write!(f, "PNG"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_png_disables_quality() {
        for format in OutputFormat::ALL {
            assert_eq!(format.info().quality_applies, !format.is_lossless());
        }
        assert!(!OutputFormat::Png.info().quality_applies);
    }

    #[test]
    fn quality_label_rounds_or_pins() {
        assert_eq!(OutputFormat::WebP.quality_label(0.856), "86%");
        assert_eq!(OutputFormat::Jpeg.quality_label(0.0), "0%");
        assert_eq!(OutputFormat::Png.quality_label(0.1), "Maximum");
    }

    #[test]
    fn mime_round_trip_and_extension() {
        assert_eq!(OutputFormat::from_mime_type("image/jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_mime_type("image/gif"), None);
        assert_eq!(OutputFormat::Jpeg.file_extension(), "jpeg");
        assert!(!OutputFormat::Jpeg.supports_transparency());
    }
}
