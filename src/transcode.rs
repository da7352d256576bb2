// transcode.rs - Decode, rasterize and re-encode a single image

use std::io::Cursor;
use std::ops::Deref;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder, Rgb, RgbImage, RgbaImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::intake::SelectedFile;

#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub file: SelectedFile,
    pub format: OutputFormat,
    pub quality: f32,
}

impl ProcessingJob {
    pub fn new(file: SelectedFile, format: OutputFormat, quality: f32) -> Self {
        Self {
            file,
            format,
            quality: clamp_quality(quality),
        }
    }

    pub fn output_filename(&self) -> String {
        output_filename(&self.file.name, self.format)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResult {
    pub data: Vec<u8>,
    pub filename: String,
}

impl EncodedResult {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// `<stem>-opt.<ext>`, where the stem is everything before the first dot.
pub fn output_filename(name: &str, format: OutputFormat) -> String {
    let stem = name.split('.').next().unwrap_or_default();
    format!("{}-opt.{}", stem, format.file_extension())
}

pub fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        1.0
    } else {
        quality.clamp(0.0, 1.0)
    }
}

fn percent(quality: f32) -> u8 {
    (clamp_quality(quality) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// The raster surface a decoded image is drawn onto before encoding.
#[derive(Debug)]
pub enum Surface {
    /// Opaque, pre-filled with white.
    Opaque(RgbImage),
    /// Starts fully transparent, so the source alpha survives as-is.
    Transparent(RgbaImage),
}

impl Surface {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Opaque(img) => img.dimensions(),
            Self::Transparent(img) => img.dimensions(),
        }
    }
}

/// Draws `image` 1:1 at the origin of a surface of the same size.
pub fn rasterize(image: &DynamicImage, format: OutputFormat) -> Surface {
    let rgba = image.to_rgba8();
    if format.supports_transparency() {
        return Surface::Transparent(rgba);
    }

    let (width, height) = rgba.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (dst, src) in canvas.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        for channel in 0..3 {
            let over = src[channel] as u32 * alpha + 255 * (255 - alpha);
            dst[channel] = ((over + 127) / 255) as u8;
        }
    }
    Surface::Opaque(canvas)
}

pub struct Transcoder {
    avif_speed: u8,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self { avif_speed: 6 }
    }
}

impl Transcoder {
    pub fn new(avif_speed: u8) -> Self {
        Self {
            avif_speed: avif_speed.clamp(1, 10),
        }
    }

    pub fn transcode(&self, job: &ProcessingJob) -> Result<EncodedResult> {
        let bytes = job.file.read()?;
        let data = self.transcode_bytes(&bytes, &job.file.name, job.format, job.quality)?;
        Ok(EncodedResult {
            data,
            filename: job.output_filename(),
        })
    }

    pub fn transcode_bytes(
        &self,
        bytes: &[u8],
        name: &str,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>> {
        let image = image::load_from_memory(bytes).map_err(|source| Error::Decode {
            name: name.to_string(),
            source,
        })?;

        let surface = rasterize(&image, format);
        let (width, height) = surface.dimensions();
        let data = self
            .encode(&surface, format, quality)
            .map_err(|reason| Error::Encode {
                name: name.to_string(),
                format,
                reason,
            })?;

        if data.is_empty() {
            return Err(Error::EmptyOutput {
                name: name.to_string(),
                format,
            });
        }

        debug!(name, %format, width, height, input = bytes.len(), output = data.len(), "transcoded");
        Ok(data)
    }

    fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: f32,
    ) -> std::result::Result<Vec<u8>, String> {
        match (format, surface) {
            (OutputFormat::Jpeg, Surface::Opaque(rgb)) => self.encode_jpeg(rgb, quality),
            (OutputFormat::Png, Surface::Transparent(rgba)) => self.encode_png(rgba),
            (OutputFormat::WebP, Surface::Transparent(rgba)) => self.encode_webp(rgba, quality),
            (OutputFormat::Avif, Surface::Transparent(rgba)) => self.encode_avif(rgba, quality),
            (format, _) => Err(format!("surface does not match {format}")),
        }
    }

    fn encode_jpeg(&self, rgb: &RgbImage, quality: f32) -> std::result::Result<Vec<u8>, String> {
        let (width, height) = rgb.dimensions();
        let mut cursor = Cursor::new(Vec::new());

        {
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, percent(quality));
            encoder
                .encode(rgb, width, height, ColorType::Rgb8)
                .map_err(|e| e.to_string())?;
        }

        Ok(cursor.into_inner())
    }

    // Lossless: quality never reaches the encoder.
    fn encode_png(&self, rgba: &RgbaImage) -> std::result::Result<Vec<u8>, String> {
        let (width, height) = rgba.dimensions();
        let mut cursor = Cursor::new(Vec::new());

        let encoder = PngEncoder::new_with_quality(
            &mut cursor,
            CompressionType::Best,
            FilterType::Adaptive,
        );
        encoder
            .write_image(rgba, width, height, ColorType::Rgba8)
            .map_err(|e| e.to_string())?;

        Ok(cursor.into_inner())
    }

    fn encode_webp(&self, rgba: &RgbaImage, quality: f32) -> std::result::Result<Vec<u8>, String> {
        let (width, height) = rgba.dimensions();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);

        // WebPMemory is !Send; copy it out right away.
        let memory = encoder
            .encode_simple(false, clamp_quality(quality) * 100.0)
            .map_err(|e| format!("libwebp rejected the image: {e:?}"))?;
        Ok(memory.deref().to_vec())
    }

    fn encode_avif(&self, rgba: &RgbaImage, quality: f32) -> std::result::Result<Vec<u8>, String> {
        let (width, height) = rgba.dimensions();
        let mut cursor = Cursor::new(Vec::new());

        let encoder =
            AvifEncoder::new_with_speed_quality(&mut cursor, self.avif_speed, percent(quality));
        encoder
            .write_image(rgba, width, height, ColorType::Rgba8)
            .map_err(|e| e.to_string())?;

        Ok(cursor.into_inner())
    }
}
